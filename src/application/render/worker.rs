use std::path::Path;

use tracing::debug;

use crate::domain::request::RenderRequest;

use super::{
    controller::SurfaceController,
    metadata::MetadataTool,
    surface::SurfaceLauncher,
    types::{RenderError, RenderResult},
    workspace::Workspace,
};

/// Performs exactly one render inside its own [`Workspace`].
///
/// Consumed by [`RenderWorker::render`]; the workspace goes away with it on
/// every exit path, including cancellation of the render future.
pub(crate) struct RenderWorker<'a> {
    launcher: &'a dyn SurfaceLauncher,
    metadata: &'a dyn MetadataTool,
    workspace: Workspace,
}

impl<'a> RenderWorker<'a> {
    pub(crate) fn acquire(
        launcher: &'a dyn SurfaceLauncher,
        metadata: &'a dyn MetadataTool,
        workspace_root: Option<&Path>,
    ) -> Result<Self, RenderError> {
        let workspace = Workspace::create(workspace_root)?;
        debug!(
            target = "application::render::worker",
            op = "worker::acquire",
            workspace = %workspace.path().display(),
            "Acquired render workspace"
        );
        Ok(Self {
            launcher,
            metadata,
            workspace,
        })
    }

    pub(crate) async fn render(self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let input = self.workspace.input_path();
        let output = self.workspace.output_path();

        tokio::fs::write(input, request.html.as_bytes())
            .await
            .map_err(|err| RenderError::resource("failed to write input document", err))?;

        SurfaceController::new(self.launcher)
            .produce(request, input, output)
            .await?;

        self.metadata.set_title(output, &request.title).await?;

        let pdf = tokio::fs::read(output)
            .await
            .map_err(|err| RenderError::resource("failed to read rendered document", err))?;

        Ok(RenderResult { pdf })
    }
}
