use std::{io, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::domain::{error::DomainError, request::RenderRequest};

use super::surface::SurfaceError;

/// Footer placeholder replaced with the current page number.
pub const PAGE_NUMBER_PLACEHOLDER: &str = "{page_number}";
/// Footer placeholder replaced with the total page count.
pub const TOTAL_PAGES_PLACEHOLDER: &str = "{total_pages}";

const PAGE_NUMBER_MARKUP: &str = r#"<span class="pageNumber"></span>"#;
const TOTAL_PAGES_MARKUP: &str = r#"<span class="totalPages"></span>"#;
/// Chrome substitutes its own date/title header for an empty string, so an
/// intentionally blank header or footer must still carry an element.
const EMPTY_TEMPLATE: &str = "<div></div>";

/// The rendered document handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub pdf: Vec<u8>,
}

/// Options passed to the page-print command, serialised in its camelCase form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintConfiguration {
    pub print_background: bool,
    pub display_header_footer: bool,
    pub header_template: String,
    pub footer_template: String,
}

impl PrintConfiguration {
    pub fn for_request(request: &RenderRequest) -> Self {
        let header_template = request
            .header_template
            .clone()
            .unwrap_or_else(|| EMPTY_TEMPLATE.to_string());
        let footer_template = request
            .footer_template
            .as_deref()
            .map(substitute_pagination)
            .unwrap_or_else(|| EMPTY_TEMPLATE.to_string());

        Self {
            print_background: true,
            display_header_footer: true,
            header_template,
            footer_template,
        }
    }
}

fn substitute_pagination(template: &str) -> String {
    template
        .replace(PAGE_NUMBER_PLACEHOLDER, PAGE_NUMBER_MARKUP)
        .replace(TOTAL_PAGES_PLACEHOLDER, TOTAL_PAGES_MARKUP)
}

/// Failures of a single render attempt. None of them are retried.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(
        "PDF rendering timed out after {}s waiting for an element with class `{class_name}`:\n{log}",
        .timeout.as_secs()
    )]
    Timeout {
        class_name: String,
        timeout: Duration,
        log: String,
    },
    #[error("no response from PDF printer:\n{log}")]
    Print { log: String },
    #[error("PDF printer returned an undecodable document: {0}")]
    PrintPayload(#[source] base64::DecodeError),
    #[error("failed to set document title:\n{output}")]
    Metadata { output: String },
    #[error("{context}: {source}")]
    Resource {
        context: &'static str,
        source: io::Error,
    },
    #[error("all render slots are busy; gave up after waiting {}s", .waited.as_secs())]
    Busy { waited: Duration },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl RenderError {
    pub fn resource(context: &'static str, source: io::Error) -> Self {
        Self::Resource { context, source }
    }

    pub fn metadata(output: impl Into<String>) -> Self {
        Self::Metadata {
            output: output.into(),
        }
    }

    /// Short, stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Validation(_) => "validation",
            RenderError::Timeout { .. } => "timeout",
            RenderError::Print { .. } | RenderError::PrintPayload(_) => "print",
            RenderError::Metadata { .. } => "metadata",
            RenderError::Resource { .. } | RenderError::Busy { .. } => "resource",
            RenderError::Surface(_) => "surface",
        }
    }
}
