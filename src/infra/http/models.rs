use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::DomainError,
    request::{ARG_HTML, ARG_TITLE, RenderRequest, WaitFor},
};

/// Raw `POST /` form. Every field is optional at this layer so a missing one
/// is reported in the JSON envelope instead of as an extractor rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderForm {
    pub title: Option<String>,
    pub html: Option<String>,
    #[serde(rename = "header-template")]
    pub header_template: Option<String>,
    #[serde(rename = "footer-template")]
    pub footer_template: Option<String>,
    #[serde(rename = "wait-for-class")]
    pub wait_for_class: Option<String>,
    #[serde(rename = "wait-for-duration-secs")]
    pub wait_for_duration_secs: Option<String>,
}

impl RenderForm {
    /// Validate the form into a request. Clients percent-quote values before
    /// posting them, so each value is decoded once more after form decoding.
    pub fn into_request(self) -> Result<RenderRequest, DomainError> {
        let title = self
            .title
            .map(|value| unquote(&value))
            .ok_or(DomainError::missing(ARG_TITLE))?;
        let html = self
            .html
            .map(|value| unquote(&value))
            .ok_or(DomainError::missing(ARG_HTML))?;

        let header_template = optional(self.header_template);
        let footer_template = optional(self.footer_template);
        let wait_for_class = optional(self.wait_for_class);
        let wait_for_duration = optional(self.wait_for_duration_secs);
        let wait_for = WaitFor::from_parts(wait_for_class.as_deref(), wait_for_duration.as_deref())?;

        let mut request = RenderRequest::new(title, html);
        if let Some(template) = header_template {
            request = request.with_header_template(template);
        }
        if let Some(template) = footer_template {
            request = request.with_footer_template(template);
        }
        if let Some(wait_for) = wait_for {
            request = request.with_wait_for(wait_for);
        }
        Ok(request)
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .filter(|value| !value.is_empty())
        .map(|value| unquote(&value))
}

/// Percent-decode `%XX` sequences. `+` is left alone and invalid UTF-8 is
/// replaced.
fn unquote(value: &str) -> String {
    match urlencoding::decode_binary(value.as_bytes()) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// JSON body of every `POST /` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderEnvelope {
    pub fn success(pdf: &[u8]) -> Self {
        Self {
            success: true,
            pdf: Some(STANDARD.encode(pdf)),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pdf: None,
            error: Some(message.into()),
        }
    }
}
