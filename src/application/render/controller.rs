use std::{
    io::{self, ErrorKind},
    path::Path,
    time::{Duration, Instant},
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};
use url::Url;

use crate::domain::request::RenderRequest;

use super::{
    surface::{Readiness, RenderingSurface, SurfaceLauncher},
    types::{PrintConfiguration, RenderError},
};

/// Extra time granted to a surface beyond the requested readiness timeout
/// before the controller stops waiting on it.
const READINESS_GRACE: Duration = Duration::from_secs(2);

/// Drives one rendering surface from a blank state to a PDF on disk.
pub(crate) struct SurfaceController<'a> {
    launcher: &'a dyn SurfaceLauncher,
}

impl<'a> SurfaceController<'a> {
    pub(crate) fn new(launcher: &'a dyn SurfaceLauncher) -> Self {
        Self { launcher }
    }

    /// Print `input` to `output`. The surface is shut down before this returns,
    /// whatever the outcome.
    pub(crate) async fn produce(
        &self,
        request: &RenderRequest,
        input: &Path,
        output: &Path,
    ) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let mut surface = self.launcher.launch().await.map_err(|err| {
            warn!(
                target = "application::render::controller",
                op = "controller::launch",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error = %err,
                "Failed to launch rendering surface"
            );
            RenderError::from(err)
        })?;

        let outcome = drive(surface.as_mut(), request, input, output).await;
        surface.shutdown().await;

        match &outcome {
            Ok(()) => debug!(
                target = "application::render::controller",
                op = "controller::produce",
                result = "ok",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                output = %output.display(),
                "Rendering surface printed document"
            ),
            Err(err) => warn!(
                target = "application::render::controller",
                op = "controller::produce",
                result = "error",
                error_code = err.kind(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Rendering surface failed to print document"
            ),
        }

        outcome
    }
}

async fn drive(
    surface: &mut dyn RenderingSurface,
    request: &RenderRequest,
    input: &Path,
    output: &Path,
) -> Result<(), RenderError> {
    let url = Url::from_file_path(input).map_err(|()| {
        RenderError::resource(
            "workspace input path is not absolute",
            io::Error::new(ErrorKind::InvalidInput, input.display().to_string()),
        )
    })?;
    surface.load(&url).await?;

    if let Some(wait_for) = request.wait_for.as_ref() {
        let bound = wait_for.timeout().saturating_add(READINESS_GRACE);
        let readiness = match tokio::time::timeout(bound, surface.await_ready(wait_for)).await {
            Ok(readiness) => readiness?,
            Err(_) => Readiness::TimedOut,
        };
        if readiness == Readiness::TimedOut {
            return Err(RenderError::Timeout {
                class_name: wait_for.class_name().to_string(),
                timeout: wait_for.timeout(),
                log: collect_log(surface).await,
            });
        }
    }

    let config = PrintConfiguration::for_request(request);
    let payload = surface
        .print_to_document(&config)
        .await?
        .filter(|data| !data.is_empty());
    let Some(payload) = payload else {
        return Err(RenderError::Print {
            log: collect_log(surface).await,
        });
    };

    let document = STANDARD
        .decode(payload.as_bytes())
        .map_err(RenderError::PrintPayload)?;
    write_document(output, &document).await
}

async fn collect_log(surface: &mut dyn RenderingSurface) -> String {
    surface.diagnostic_log().await.join("\n")
}

async fn write_document(path: &Path, document: &[u8]) -> Result<(), RenderError> {
    let mut file = File::create(path)
        .await
        .map_err(|err| RenderError::resource("failed to create output document", err))?;
    file.write_all(document)
        .await
        .map_err(|err| RenderError::resource("failed to write output document", err))?;
    file.sync_all()
        .await
        .map_err(|err| RenderError::resource("failed to flush output document", err))?;
    Ok(())
}
