//! Rendering surface backed by chromedriver and headless Chrome.
//!
//! Every [`WebDriverLauncher::launch`] starts a private chromedriver process
//! and opens one browser session on it. Nothing is pooled: the driver, the
//! browser and the session all go away in [`RenderingSurface::shutdown`], or
//! from `Drop` if the render was cancelled first.

mod client;
mod process;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use url::Url;

use crate::{
    application::render::{
        PrintConfiguration, Readiness, RenderingSurface, SurfaceError, SurfaceLauncher,
    },
    domain::request::WaitFor,
};

pub use client::{LogEntry, WebDriverClient};
pub use process::DriverProcess;

const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Slack on top of the page-load timeout for any single driver command.
const COMMAND_SLACK: Duration = Duration::from_secs(30);
const LOG_KINDS: [&str; 2] = ["driver", "browser"];
/// Budget for log collection, and separately for session deletion.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub chromedriver_path: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub startup_timeout: Duration,
    pub page_load_timeout: Duration,
}

/// Capabilities requested for every session.
pub fn session_capabilities(config: &WebDriverConfig) -> Value {
    let mut chrome_options = json!({ "args": ["--headless", "--disable-gpu"] });
    if let Some(binary) = config.chrome_path.as_ref() {
        chrome_options["binary"] = Value::String(binary.display().to_string());
    }

    json!({
        "browserName": "chrome",
        "goog:chromeOptions": chrome_options,
        "goog:loggingPrefs": { "driver": "ALL", "browser": "ALL" },
        "timeouts": { "pageLoad": config.page_load_timeout.as_millis() as u64 },
    })
}

#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    config: WebDriverConfig,
}

impl WebDriverLauncher {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SurfaceLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderingSurface>, SurfaceError> {
        let started_at = Instant::now();
        let (mut process, client) = DriverProcess::start(
            &self.config.chromedriver_path,
            self.config.startup_timeout,
            self.config.page_load_timeout + COMMAND_SLACK,
        )
        .await?;

        let session = match client
            .new_session(session_capabilities(&self.config))
            .await
        {
            Ok(session) => session,
            Err(err) => {
                process.terminate().await;
                return Err(err);
            }
        };

        debug!(
            target = "infra::webdriver",
            op = "webdriver::launch",
            result = "ok",
            port = process.port(),
            session = %session,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Browser session opened"
        );

        Ok(Box::new(WebDriverSurface {
            client,
            session: Some(session),
            process: Some(process),
            teardown_timeout: TEARDOWN_TIMEOUT,
        }))
    }
}

pub struct WebDriverSurface {
    client: WebDriverClient,
    session: Option<String>,
    process: Option<DriverProcess>,
    teardown_timeout: Duration,
}

impl WebDriverSurface {
    /// A surface over an already open session with no driver process to own.
    #[cfg(test)]
    fn attached(client: WebDriverClient, session: &str, teardown_timeout: Duration) -> Self {
        Self {
            client,
            session: Some(session.to_string()),
            process: None,
            teardown_timeout,
        }
    }

    fn session(&self) -> Result<&str, SurfaceError> {
        self.session
            .as_deref()
            .ok_or_else(|| SurfaceError::Transport("browser session already closed".to_string()))
    }
}

#[async_trait]
impl RenderingSurface for WebDriverSurface {
    async fn load(&mut self, url: &Url) -> Result<(), SurfaceError> {
        let session = self.session()?;
        self.client.navigate(session, url).await
    }

    async fn await_ready(&mut self, wait_for: &WaitFor) -> Result<Readiness, SurfaceError> {
        let session = self.session()?;
        let selector = wait_for.selector();
        let started_at = Instant::now();
        loop {
            if self.client.count_elements(session, &selector).await? > 0 {
                return Ok(Readiness::Ready);
            }
            let elapsed = started_at.elapsed();
            if elapsed >= wait_for.timeout() {
                return Ok(Readiness::TimedOut);
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL.min(wait_for.timeout() - elapsed)).await;
        }
    }

    async fn print_to_document(
        &mut self,
        config: &PrintConfiguration,
    ) -> Result<Option<String>, SurfaceError> {
        let session = self.session()?;
        let params = serde_json::to_value(config).map_err(|err| SurfaceError::Protocol {
            code: "invalid argument".to_string(),
            message: err.to_string(),
        })?;
        let value = self
            .client
            .execute_cdp(session, "Page.printToPDF", params)
            .await?;
        Ok(value
            .get("data")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn diagnostic_log(&mut self) -> Vec<String> {
        let Ok(session) = self.session() else {
            return Vec::new();
        };
        let deadline = tokio::time::Instant::now() + self.teardown_timeout;
        let mut lines = Vec::new();
        for kind in LOG_KINDS {
            match tokio::time::timeout_at(deadline, self.client.log(session, kind)).await {
                Ok(Ok(entries)) => lines.extend(entries.iter().map(LogEntry::line)),
                Ok(Err(err)) => lines.push(format!("failed to collect {kind} log: {err}")),
                Err(_) => lines.push(format!("{kind} log unavailable: driver did not respond")),
            }
        }
        lines
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(err) =
                delete_session_within(&self.client, &session, self.teardown_timeout).await
        {
            warn!(
                target = "infra::webdriver",
                op = "webdriver::shutdown",
                result = "error",
                session = %session,
                error = %err,
                "Failed to close browser session"
            );
        }
        if let Some(mut process) = self.process.take() {
            process.terminate().await;
        }
    }
}

impl Drop for WebDriverSurface {
    fn drop(&mut self) {
        if self.session.is_none() && self.process.is_none() {
            return;
        }
        let session = self.session.take();
        let process = self.process.take();
        let client = self.client.clone();
        let teardown_timeout = self.teardown_timeout;

        // Without a runtime the child is still killed on drop; the browser
        // session is left to chromedriver's own teardown.
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if let Some(session) = session {
                    let _ = delete_session_within(&client, &session, teardown_timeout).await;
                }
                if let Some(mut process) = process {
                    process.terminate().await;
                }
            });
        }
    }
}

async fn delete_session_within(
    client: &WebDriverClient,
    session: &str,
    limit: Duration,
) -> Result<(), SurfaceError> {
    tokio::time::timeout(limit, client.delete_session(session))
        .await
        .unwrap_or_else(|_| {
            Err(SurfaceError::Transport(format!(
                "session deletion did not finish within {}ms",
                limit.as_millis()
            )))
        })
}
