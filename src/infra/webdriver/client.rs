use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::application::render::SurfaceError;

/// A single entry returned by the vendor log endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl LogEntry {
    pub fn line(&self) -> String {
        format!("[{}] {} {}", self.timestamp, self.level, self.message)
    }
}

/// Minimal W3C WebDriver client covering the commands the renderer issues,
/// plus chromedriver's CDP passthrough and log extensions.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base: Url,
}

impl WebDriverClient {
    pub fn new(base: Url, command_timeout: Duration) -> Result<Self, SurfaceError> {
        let http = Client::builder()
            .timeout(command_timeout)
            .user_agent(concat!("pdfoid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| SurfaceError::Transport(err.to_string()))?;
        Ok(Self { http, base })
    }

    /// `true` once the driver reports it can create sessions.
    pub async fn status(&self) -> Result<bool, SurfaceError> {
        let value = self.command(Method::GET, "status", None).await?;
        Ok(value
            .get("ready")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    pub async fn new_session(&self, capabilities: Value) -> Result<String, SurfaceError> {
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let value = self.command(Method::POST, "session", Some(body)).await?;
        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SurfaceError::Protocol {
                code: "invalid response".to_string(),
                message: "new session response carried no sessionId".to_string(),
            })
    }

    pub async fn navigate(&self, session: &str, url: &Url) -> Result<(), SurfaceError> {
        let body = json!({ "url": url.as_str() });
        self.command(Method::POST, &format!("session/{session}/url"), Some(body))
            .await
            .map(drop)
    }

    /// Number of elements currently matching the CSS selector.
    pub async fn count_elements(&self, session: &str, selector: &str) -> Result<usize, SurfaceError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self
            .command(
                Method::POST,
                &format!("session/{session}/elements"),
                Some(body),
            )
            .await?;
        Ok(value.as_array().map(Vec::len).unwrap_or(0))
    }

    pub async fn execute_cdp(
        &self,
        session: &str,
        cmd: &str,
        params: Value,
    ) -> Result<Value, SurfaceError> {
        let body = json!({ "cmd": cmd, "params": params });
        self.command(
            Method::POST,
            &format!("session/{session}/goog/cdp/execute"),
            Some(body),
        )
        .await
    }

    pub async fn log(&self, session: &str, kind: &str) -> Result<Vec<LogEntry>, SurfaceError> {
        let body = json!({ "type": kind });
        let value = self
            .command(Method::POST, &format!("session/{session}/se/log"), Some(body))
            .await?;
        serde_json::from_value(value).map_err(|err| SurfaceError::Protocol {
            code: "invalid response".to_string(),
            message: format!("malformed log entries: {err}"),
        })
    }

    pub async fn delete_session(&self, session: &str) -> Result<(), SurfaceError> {
        self.command(Method::DELETE, &format!("session/{session}"), None)
            .await
            .map(drop)
    }

    /// Issue one command and unwrap the `value` member of the response.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, SurfaceError> {
        let url = self
            .base
            .join(path)
            .map_err(|err| SurfaceError::Transport(format!("invalid command path `{path}`: {err}")))?;

        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|err| SurfaceError::Transport(err.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| SurfaceError::Transport(err.to_string()))?;

        let mut payload: Value = serde_json::from_slice(&bytes).map_err(|err| {
            SurfaceError::Protocol {
                code: status.as_u16().to_string(),
                message: format!(
                    "unparseable response ({err}): {}",
                    String::from_utf8_lossy(&bytes)
                ),
            }
        })?;
        let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if let Some(code) = value.get("error").and_then(Value::as_str) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(SurfaceError::Protocol {
                code: code.to_string(),
                message,
            });
        }
        if !status.is_success() {
            return Err(SurfaceError::Protocol {
                code: status.as_u16().to_string(),
                message: value.to_string(),
            });
        }

        Ok(value)
    }
}
