//! Render request model.
//!
//! A [`RenderRequest`] is validated once, when it is built, and is immutable
//! afterwards. In particular the readiness marker ([`WaitFor`]) is either fully
//! specified or absent by the time a request reaches the render pipeline.

use std::{fmt::Write as _, time::Duration};

use super::error::DomainError;

pub const ARG_TITLE: &str = "title";
pub const ARG_HTML: &str = "html";
pub const ARG_HEADER_TEMPLATE: &str = "header-template";
pub const ARG_FOOTER_TEMPLATE: &str = "footer-template";
pub const ARG_WAIT_FOR_CLASS: &str = "wait-for-class";
pub const ARG_WAIT_FOR_DURATION: &str = "wait-for-duration-secs";

/// Readiness marker: an element carrying `class_name` must appear in the page
/// before it is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitFor {
    class_name: String,
    timeout: Duration,
}

impl WaitFor {
    pub fn new(class_name: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let class_name = class_name.into();
        if class_name.is_empty() {
            return Err(DomainError::invalid(
                ARG_WAIT_FOR_CLASS,
                "class name must not be empty",
            ));
        }
        if class_name.chars().any(char::is_whitespace) {
            return Err(DomainError::invalid(
                ARG_WAIT_FOR_CLASS,
                "compound class names are not supported",
            ));
        }

        Ok(Self {
            class_name,
            timeout,
        })
    }

    /// Build the marker from the two raw wire arguments. Supplying exactly one
    /// of them is rejected.
    pub fn from_parts(
        class_name: Option<&str>,
        duration_secs: Option<&str>,
    ) -> Result<Option<Self>, DomainError> {
        match (class_name, duration_secs) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(DomainError::unpaired(
                ARG_WAIT_FOR_CLASS,
                ARG_WAIT_FOR_DURATION,
            )),
            (None, Some(_)) => Err(DomainError::unpaired(
                ARG_WAIT_FOR_DURATION,
                ARG_WAIT_FOR_CLASS,
            )),
            (Some(class_name), Some(raw)) => {
                let seconds: u64 = raw.trim().parse().map_err(|_| {
                    DomainError::invalid(
                        ARG_WAIT_FOR_DURATION,
                        format!("expected a whole number of seconds, got `{raw}`"),
                    )
                })?;
                Self::new(class_name, Duration::from_secs(seconds)).map(Some)
            }
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// CSS selector matching any element that carries the class.
    pub fn selector(&self) -> String {
        format!(".{}", escape_css_identifier(&self.class_name))
    }
}

/// A single HTML to PDF conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub title: String,
    pub html: String,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub wait_for: Option<WaitFor>,
}

impl RenderRequest {
    pub fn new(title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            html: html.into(),
            header_template: None,
            footer_template: None,
            wait_for: None,
        }
    }

    pub fn with_header_template(mut self, template: impl Into<String>) -> Self {
        self.header_template = Some(template.into());
        self
    }

    pub fn with_footer_template(mut self, template: impl Into<String>) -> Self {
        self.footer_template = Some(template.into());
        self
    }

    pub fn with_wait_for(mut self, wait_for: WaitFor) -> Self {
        self.wait_for = Some(wait_for);
        self
    }
}

/// Serialize `ident` so it can be embedded in a CSS selector, following the
/// CSSOM identifier serialization rules.
fn escape_css_identifier(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let chars: Vec<char> = ident.chars().collect();

    for (index, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit() && (index == 0 || (index == 1 && chars[0] == '-'));
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            _ if leading_digit => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            '-' if index == 0 && chars.len() == 1 => out.push_str("\\-"),
            c if c >= '\u{80}' || c == '-' || c == '_' || c.is_ascii_alphanumeric() => out.push(c),
            c => {
                out.push('\\');
                out.push(c);
            }
        }
    }

    out
}
