use std::error::Error as StdError;

use axum::response::Response;
use thiserror::Error;

use crate::{
    application::render::{RenderConfigError, RenderError},
    config::LoadError,
    infra::error::InfraError,
};

/// An error together with its `source()` chain, attached to responses so the
/// request middleware can log what went wrong without the handler doing it.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub kind: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, kind: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            kind,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        kind: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Process-level failures. Any of these ends the process with exit code 1.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("render backend could not start: {0}")]
    RenderConfig(#[from] RenderConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
