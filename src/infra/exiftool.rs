use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::render::{MetadataTool, RenderError, decode_tool_output};

/// Sets the PDF `Title` by running ExifTool against the file in place.
#[derive(Debug, Clone)]
pub struct ExifTool {
    path: PathBuf,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(path: PathBuf, timeout: Duration) -> Self {
        Self { path, timeout }
    }
}

#[async_trait]
impl MetadataTool for ExifTool {
    async fn set_title(&self, document: &Path, title: &str) -> Result<(), RenderError> {
        let started_at = Instant::now();
        let child = Command::new(&self.path)
            .arg("-overwrite_original")
            .arg(format!("-Title={title}"))
            .arg(document)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    target = "infra::exiftool",
                    op = "exiftool::set_title",
                    result = "error",
                    error_code = "spawn",
                    tool = %self.path.display(),
                    error = %err,
                    "Failed to spawn ExifTool"
                );
                RenderError::metadata(format!(
                    "failed to run `{}`: {err}",
                    self.path.display()
                ))
            })?;

        // Dropping the child on expiry kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(RenderError::metadata(format!(
                    "failed to collect ExifTool output: {err}"
                )));
            }
            Err(_) => {
                warn!(
                    target = "infra::exiftool",
                    op = "exiftool::set_title",
                    result = "error",
                    error_code = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "ExifTool did not finish in time"
                );
                return Err(RenderError::metadata(format!(
                    "ExifTool did not finish within {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let mut combined = output.stdout;
            combined.extend_from_slice(&output.stderr);
            let text = decode_tool_output(&combined);
            warn!(
                target = "infra::exiftool",
                op = "exiftool::set_title",
                result = "error",
                error_code = "exit_status",
                exit_code = output.status.code().map(i64::from).unwrap_or(-1),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                output = %text,
                "ExifTool exited unsuccessfully"
            );
            return Err(RenderError::metadata(text));
        }

        info!(
            target = "infra::exiftool",
            op = "exiftool::set_title",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Document title set"
        );
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt};
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[tokio::test]
    async fn passes_title_and_path_to_tool() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = write_script(
            &dir,
            "fake-exiftool",
            &format!(
                "for arg in \"$@\"; do echo \"$arg\" >> \"{}\"; done\n",
                args_path.display()
            ),
        );
        let document = dir.path().join("output.pdf");
        fs::write(&document, b"%PDF-1.4").expect("pdf");

        ExifTool::new(script, Duration::from_secs(5))
            .set_title(&document, "Quarterly Report")
            .await
            .expect("title set");

        let args = fs::read_to_string(&args_path).expect("args");
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(
            args,
            vec![
                "-overwrite_original",
                "-Title=Quarterly Report",
                document.to_str().expect("utf8 path"),
            ]
        );
    }

    #[tokio::test]
    async fn failure_reports_decoded_output() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(
            &dir,
            "failing-exiftool",
            "printf 'Error: bad \\377 file\\n'\necho 'more detail' >&2\nexit 1\n",
        );

        let err = ExifTool::new(script, Duration::from_secs(5))
            .set_title(&dir.path().join("output.pdf"), "t")
            .await
            .expect_err("failure");

        match err {
            RenderError::Metadata { output } => {
                assert!(output.contains("Error: bad \\xff file"), "{output}");
                assert!(output.contains("more detail"), "{output}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hung_tool_is_bounded_by_timeout() {
        let dir = TempDir::new().expect("temp dir");
        let script = write_script(&dir, "slow-exiftool", "exec sleep 30\n");

        let started = Instant::now();
        let err = ExifTool::new(script, Duration::from_millis(200))
            .set_title(&dir.path().join("output.pdf"), "t")
            .await
            .expect_err("timeout");

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(err.to_string().contains("did not finish"));
        assert_eq!(err.kind(), "metadata");
    }

    #[tokio::test]
    async fn missing_tool_is_a_metadata_error() {
        let dir = TempDir::new().expect("temp dir");
        let err = ExifTool::new(dir.path().join("absent"), Duration::from_secs(1))
            .set_title(&dir.path().join("output.pdf"), "t")
            .await
            .expect_err("spawn failure");

        assert_eq!(err.kind(), "metadata");
    }
}
