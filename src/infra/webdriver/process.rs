use std::{
    net::{Ipv4Addr, TcpListener},
    path::Path,
    process::Stdio,
    time::{Duration, Instant},
};

use reqwest::Url;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::application::render::SurfaceError;

use super::client::WebDriverClient;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERMINATE_GRACE: Duration = Duration::from_secs(2);
const START_ATTEMPTS: u32 = 3;

/// A chromedriver child process bound to a private loopback port.
#[derive(Debug)]
pub struct DriverProcess {
    child: Child,
    port: u16,
}

/// Why a single startup attempt failed.
enum StartFailure {
    /// The driver process exited before reporting ready, typically because
    /// the reserved port was taken between reservation and bind.
    Exited(SurfaceError),
    Fatal(SurfaceError),
}

impl DriverProcess {
    /// Start the driver and wait until it answers `/status` as ready.
    ///
    /// The port is reserved by binding and releasing it, so another process
    /// can claim it before chromedriver binds. A driver that exits during
    /// startup is therefore relaunched on a fresh port, at most three times
    /// in total.
    pub async fn start(
        path: &Path,
        startup_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<(Self, WebDriverClient), SurfaceError> {
        let mut attempt = 1;
        loop {
            match Self::start_once(path, startup_timeout, command_timeout).await {
                Ok(started) => return Ok(started),
                Err(StartFailure::Exited(err)) if attempt < START_ATTEMPTS => {
                    debug!(
                        target = "infra::webdriver::process",
                        op = "driver::start",
                        result = "retry",
                        attempt,
                        error = %err,
                        "chromedriver exited during startup, retrying on a new port"
                    );
                    attempt += 1;
                }
                Err(StartFailure::Exited(err) | StartFailure::Fatal(err)) => return Err(err),
            }
        }
    }

    async fn start_once(
        path: &Path,
        startup_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<(Self, WebDriverClient), StartFailure> {
        let port = free_port().map_err(StartFailure::Fatal)?;
        let child = Command::new(path)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                StartFailure::Fatal(SurfaceError::Launch(format!(
                    "failed to spawn `{}`: {err}",
                    path.display()
                )))
            })?;

        let mut process = Self { child, port };
        let base = Url::parse(&format!("http://{}:{port}/", Ipv4Addr::LOCALHOST))
            .map_err(|err| StartFailure::Fatal(SurfaceError::Launch(err.to_string())))?;
        let client = WebDriverClient::new(base, command_timeout).map_err(StartFailure::Fatal)?;

        if let Err(failure) = process.wait_until_ready(&client, startup_timeout).await {
            process.terminate().await;
            return Err(failure);
        }
        Ok((process, client))
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn wait_until_ready(
        &mut self,
        client: &WebDriverClient,
        startup_timeout: Duration,
    ) -> Result<(), StartFailure> {
        let started_at = Instant::now();
        loop {
            if let Some(status) = self
                .child
                .try_wait()
                .map_err(|err| StartFailure::Fatal(SurfaceError::Launch(err.to_string())))?
            {
                return Err(StartFailure::Exited(SurfaceError::Launch(format!(
                    "chromedriver exited during startup with {status}"
                ))));
            }

            match client.status().await {
                Ok(true) => {
                    debug!(
                        target = "infra::webdriver::process",
                        op = "driver::start",
                        result = "ready",
                        port = self.port,
                        elapsed_ms = started_at.elapsed().as_millis() as u64,
                        "chromedriver is ready"
                    );
                    return Ok(());
                }
                Ok(false) | Err(_) => {}
            }

            if started_at.elapsed() >= startup_timeout {
                return Err(StartFailure::Fatal(SurfaceError::Launch(format!(
                    "chromedriver was not ready within {}s",
                    startup_timeout.as_secs()
                ))));
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Kill the driver and reap it, waiting a bounded time for the exit.
    pub async fn terminate(&mut self) {
        if let Err(err) = self.child.start_kill() {
            // Already exited processes report InvalidInput.
            if err.kind() != std::io::ErrorKind::InvalidInput {
                warn!(
                    target = "infra::webdriver::process",
                    op = "driver::terminate",
                    result = "error",
                    port = self.port,
                    error = %err,
                    "Failed to signal chromedriver"
                );
            }
        }
        if tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
            .await
            .is_err()
        {
            warn!(
                target = "infra::webdriver::process",
                op = "driver::terminate",
                result = "timeout",
                port = self.port,
                "chromedriver did not exit after kill"
            );
        }
    }
}

fn free_port() -> Result<u16, SurfaceError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|err| SurfaceError::Launch(format!("failed to reserve a port: {err}")))?;
    listener
        .local_addr()
        .map(|addr| addr.port())
        .map_err(|err| SurfaceError::Launch(format!("failed to reserve a port: {err}")))
}
