use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::warn;

use super::types::RenderError;

const WORKSPACE_PREFIX: &str = "pdfoid-";
const INPUT_FILE: &str = "input.html";
const OUTPUT_FILE: &str = "output.pdf";

/// Scratch directory owned by exactly one render. Removed with all of its
/// contents when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a fresh, empty directory under `root`, or under the system temp
    /// directory when no root is configured.
    pub fn create(root: Option<&Path>) -> Result<Self, RenderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|err| RenderError::resource("failed to create render workspace", err))?;

        let input_path = dir.path().join(INPUT_FILE);
        let output_path = dir.path().join(OUTPUT_FILE);
        Ok(Self {
            dir: Some(dir),
            input_path,
            output_path,
        })
    }

    pub fn path(&self) -> &Path {
        self.input_path.parent().unwrap_or(&self.input_path)
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        if let Err(err) = dir.close() {
            warn!(
                target = "application::render::workspace",
                op = "workspace::release",
                result = "error",
                path = %path.display(),
                error = %err,
                "Failed to remove render workspace"
            );
        }
    }
}
