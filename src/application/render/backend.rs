use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::RenderSettings;
use crate::domain::request::RenderRequest;
use crate::infra::{
    exiftool::ExifTool,
    executable::resolve_executable,
    webdriver::{WebDriverConfig, WebDriverLauncher},
};

use super::{
    metadata::MetadataTool,
    surface::SurfaceLauncher,
    types::{RenderError, RenderResult},
    worker::RenderWorker,
};

pub const METRIC_RENDER_TOTAL: &str = "pdfoid_render_total";
pub const METRIC_RENDER_DURATION_MS: &str = "pdfoid_render_duration_ms";
pub const METRIC_RENDER_IN_FLIGHT: &str = "pdfoid_render_in_flight";

#[derive(Debug, Error)]
pub enum RenderConfigError {
    #[error("{name} `{}` could not be resolved: {reason}", .path.display())]
    MissingExecutable {
        name: &'static str,
        path: PathBuf,
        reason: String,
    },
    #[error("render.workspace_root `{}` is not a directory", .0.display())]
    WorkspaceRoot(PathBuf),
}

/// Per-backend knobs that are independent of the capability implementations.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub workspace_root: Option<PathBuf>,
    pub max_concurrent_renders: usize,
    pub queue_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            workspace_root: None,
            max_concurrent_renders: 4,
            queue_timeout: Duration::from_secs(30),
        }
    }
}

/// Entry point of the render pipeline. Shared across requests behind an `Arc`;
/// every call gets its own worker, workspace and surface.
pub struct RenderBackend {
    launcher: Arc<dyn SurfaceLauncher>,
    metadata: Arc<dyn MetadataTool>,
    options: RenderOptions,
    permits: Semaphore,
}

impl RenderBackend {
    pub fn new(
        launcher: Arc<dyn SurfaceLauncher>,
        metadata: Arc<dyn MetadataTool>,
        options: RenderOptions,
    ) -> Self {
        let permits = Semaphore::new(options.max_concurrent_renders.max(1));
        Self {
            launcher,
            metadata,
            options,
            permits,
        }
    }

    /// Build the production backend: chromedriver-driven surfaces and ExifTool
    /// annotation. Fails when either external tool cannot be found.
    pub fn from_settings(settings: &RenderSettings) -> Result<Self, RenderConfigError> {
        let chromedriver = resolve("render.chromedriver_path", &settings.chromedriver_path)?;
        let exiftool = resolve("render.exiftool_path", &settings.exiftool_path)?;
        let chrome = settings
            .chrome_path
            .as_deref()
            .map(|path| resolve("render.chrome_path", path))
            .transpose()?;

        if let Some(root) = settings.workspace_root.as_ref()
            && !root.is_dir()
        {
            return Err(RenderConfigError::WorkspaceRoot(root.clone()));
        }

        info!(
            target = "application::render::backend",
            op = "backend::from_settings",
            chromedriver = %chromedriver.display(),
            chrome = chrome.as_ref().map(|path| path.display().to_string()).unwrap_or_default(),
            exiftool = %exiftool.display(),
            max_concurrent_renders = settings.max_concurrent_renders,
            "Render backend configured"
        );

        let launcher = WebDriverLauncher::new(WebDriverConfig {
            chromedriver_path: chromedriver,
            chrome_path: chrome,
            startup_timeout: settings.driver_startup_timeout,
            page_load_timeout: settings.page_load_timeout,
        });
        let metadata = ExifTool::new(exiftool, settings.annotation_timeout);
        let options = RenderOptions {
            workspace_root: settings.workspace_root.clone(),
            max_concurrent_renders: settings.max_concurrent_renders,
            queue_timeout: settings.queue_timeout,
        };

        Ok(Self::new(Arc::new(launcher), Arc::new(metadata), options))
    }

    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let started_at = Instant::now();
        let outcome = self.admit_and_render(request).await;
        let elapsed = started_at.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        let result = match &outcome {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        counter!(METRIC_RENDER_TOTAL, "result" => result).increment(1);
        histogram!(METRIC_RENDER_DURATION_MS).record(elapsed.as_secs_f64() * 1000.0);

        match &outcome {
            Ok(rendered) => info!(
                target = "application::render::backend",
                op = "backend::render",
                result = "ok",
                elapsed_ms,
                pdf_bytes = rendered.pdf.len(),
                "Rendered PDF"
            ),
            Err(err) => warn!(
                target = "application::render::backend",
                op = "backend::render",
                result = "error",
                error_code = err.kind(),
                elapsed_ms,
                "Render failed"
            ),
        }

        outcome
    }

    async fn admit_and_render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let waited = self.options.queue_timeout;
        let _permit = match tokio::time::timeout(waited, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => return Err(RenderError::Busy { waited }),
        };
        let _in_flight = InFlightGuard::enter();

        let worker = RenderWorker::acquire(
            self.launcher.as_ref(),
            self.metadata.as_ref(),
            self.options.workspace_root.as_deref(),
        )?;
        worker.render(request).await
    }
}

fn resolve(name: &'static str, path: &Path) -> Result<PathBuf, RenderConfigError> {
    resolve_executable(path).map_err(|err| RenderConfigError::MissingExecutable {
        name,
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

struct InFlightGuard;

impl InFlightGuard {
    fn enter() -> Self {
        gauge!(METRIC_RENDER_IN_FLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(METRIC_RENDER_IN_FLIGHT).decrement(1.0);
    }
}
