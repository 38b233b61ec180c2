//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, LoggingOverrides, RenderArgs, RenderOverrides, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pdfoid";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 32 * 1024 * 1024;
const DEFAULT_CHROMEDRIVER_PATH: &str = "chromedriver";
const DEFAULT_EXIFTOOL_PATH: &str = "exiftool";
const DEFAULT_MAX_CONCURRENT_RENDERS: u64 = 4;
const DEFAULT_QUEUE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ANNOTATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DRIVER_STARTUP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub chromedriver_path: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub exiftool_path: PathBuf,
    pub workspace_root: Option<PathBuf>,
    pub max_concurrent_renders: usize,
    pub queue_timeout: Duration,
    pub annotation_timeout: Duration,
    pub driver_startup_timeout: Duration,
    pub page_load_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PDFOID").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_logging_overrides(&cli.logging);
    raw.apply_render_overrides(&cli.render);
    if let Some(Command::Serve(args)) = cli.command.as_ref() {
        raw.apply_serve_overrides(&args.overrides);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.chromedriver_path.as_ref() {
            self.render.chromedriver_path = Some(path.clone());
        }
        if let Some(path) = overrides.chrome_path.as_ref() {
            self.render.chrome_path = Some(path.clone());
        }
        if let Some(path) = overrides.exiftool_path.as_ref() {
            self.render.exiftool_path = Some(path.clone());
        }
        if let Some(dir) = overrides.workspace_root.as_ref() {
            self.render.workspace_root = Some(dir.clone());
        }
        if let Some(value) = overrides.max_concurrent_renders {
            self.render.max_concurrent_renders = Some(value);
        }
        if let Some(value) = overrides.queue_timeout_seconds {
            self.render.queue_timeout_seconds = Some(value);
        }
        if let Some(value) = overrides.annotation_timeout_seconds {
            self.render.annotation_timeout_seconds = Some(value);
        }
        if let Some(value) = overrides.driver_startup_timeout_seconds {
            self.render.driver_startup_timeout_seconds = Some(value);
        }
        if let Some(value) = overrides.page_load_timeout_seconds {
            self.render.page_load_timeout_seconds = Some(value);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_request_bytes = non_zero_usize(
        server.max_request_bytes.unwrap_or(DEFAULT_MAX_REQUEST_BYTES),
        "server.max_request_bytes",
    )?;

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let chromedriver_path = required_path(
        render.chromedriver_path,
        DEFAULT_CHROMEDRIVER_PATH,
        "render.chromedriver_path",
    )?;
    let exiftool_path = required_path(
        render.exiftool_path,
        DEFAULT_EXIFTOOL_PATH,
        "render.exiftool_path",
    )?;
    let chrome_path = render
        .chrome_path
        .filter(|path| !path.as_os_str().is_empty());
    let workspace_root = render
        .workspace_root
        .filter(|path| !path.as_os_str().is_empty());

    let max_concurrent_renders = non_zero_usize(
        render
            .max_concurrent_renders
            .unwrap_or(DEFAULT_MAX_CONCURRENT_RENDERS),
        "render.max_concurrent_renders",
    )?;

    Ok(RenderSettings {
        chromedriver_path,
        chrome_path,
        exiftool_path,
        workspace_root,
        max_concurrent_renders,
        queue_timeout: seconds(
            render.queue_timeout_seconds,
            DEFAULT_QUEUE_TIMEOUT_SECS,
            "render.queue_timeout_seconds",
        )?,
        annotation_timeout: seconds(
            render.annotation_timeout_seconds,
            DEFAULT_ANNOTATION_TIMEOUT_SECS,
            "render.annotation_timeout_seconds",
        )?,
        driver_startup_timeout: seconds(
            render.driver_startup_timeout_seconds,
            DEFAULT_DRIVER_STARTUP_TIMEOUT_SECS,
            "render.driver_startup_timeout_seconds",
        )?,
        page_load_timeout: seconds(
            render.page_load_timeout_seconds,
            DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            "render.page_load_timeout_seconds",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    chromedriver_path: Option<PathBuf>,
    chrome_path: Option<PathBuf>,
    exiftool_path: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    max_concurrent_renders: Option<u64>,
    queue_timeout_seconds: Option<u64>,
    annotation_timeout_seconds: Option<u64>,
    driver_startup_timeout_seconds: Option<u64>,
    page_load_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn required_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<usize, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    usize::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))
}

fn seconds(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    let value = value.unwrap_or(default);
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}
