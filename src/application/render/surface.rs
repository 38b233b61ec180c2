//! Capability boundary for the headless rendering surface.
//!
//! The render pipeline never talks to a browser directly. It asks a
//! [`SurfaceLauncher`] for a fresh [`RenderingSurface`] per request and drives
//! it through load, readiness and print. Production uses the WebDriver-backed
//! implementation in `infra::webdriver`; tests substitute in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::domain::request::WaitFor;

use super::types::PrintConfiguration;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to launch rendering surface: {0}")]
    Launch(String),
    #[error("rendering surface rejected command ({code}): {message}")]
    Protocol { code: String, message: String },
    #[error("rendering surface transport error: {0}")]
    Transport(String),
}

/// Outcome of waiting for a readiness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

/// One live, exclusively owned instance of the rendering capability.
#[async_trait]
pub trait RenderingSurface: Send {
    /// Navigate to the document at `url` and wait for it to load.
    async fn load(&mut self, url: &Url) -> Result<(), SurfaceError>;

    /// Block until an element carrying the marker class exists, or the
    /// marker's timeout elapses.
    async fn await_ready(&mut self, wait_for: &WaitFor) -> Result<Readiness, SurfaceError>;

    /// Issue the page-print command. Returns the base64 transport payload, or
    /// `None` when the command produced no document data.
    async fn print_to_document(
        &mut self,
        config: &PrintConfiguration,
    ) -> Result<Option<String>, SurfaceError>;

    /// Driver-level entries followed by in-page entries, one line each.
    /// Collection failures are reported inline instead of failing.
    async fn diagnostic_log(&mut self) -> Vec<String>;

    /// Terminate the instance. Safe to call more than once.
    async fn shutdown(&mut self);
}

#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderingSurface>, SurfaceError>;
}
