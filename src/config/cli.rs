use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pdfoid binary.
#[derive(Debug, Parser)]
#[command(name = "pdfoid", version, about = "HTML to PDF rendering server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PDFOID_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub render: RenderOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP render service.
    Serve(Box<ServeArgs>),
    /// Render a single HTML file to PDF and exit.
    Render(Box<RenderArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the maximum accepted request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Path or program name of the chromedriver executable.
    #[arg(
        long = "chromedriver-path",
        env = "CHROMEDRIVER_PATH",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        global = true
    )]
    pub chromedriver_path: Option<PathBuf>,

    /// Chrome binary to launch instead of the driver's default.
    #[arg(
        long = "chrome-path",
        env = "CHROME_PATH",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        global = true
    )]
    pub chrome_path: Option<PathBuf>,

    /// Path or program name of the ExifTool executable.
    #[arg(
        long = "exiftool-path",
        env = "EXIFTOOL_PATH",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath,
        global = true
    )]
    pub exiftool_path: Option<PathBuf>,

    /// Directory under which per-request workspaces are created.
    #[arg(
        long = "workspace-root",
        value_name = "DIR",
        value_hint = ValueHint::DirPath,
        global = true
    )]
    pub workspace_root: Option<PathBuf>,

    /// Override the number of renders allowed to run at once.
    #[arg(long = "max-concurrent-renders", value_name = "COUNT", global = true)]
    pub max_concurrent_renders: Option<u64>,

    /// Override how long a request may wait for a render slot.
    #[arg(long = "queue-timeout-seconds", value_name = "SECONDS", global = true)]
    pub queue_timeout_seconds: Option<u64>,

    /// Override the ExifTool run time limit.
    #[arg(long = "annotation-timeout-seconds", value_name = "SECONDS", global = true)]
    pub annotation_timeout_seconds: Option<u64>,

    /// Override how long chromedriver may take to become ready.
    #[arg(long = "driver-startup-timeout-seconds", value_name = "SECONDS", global = true)]
    pub driver_startup_timeout_seconds: Option<u64>,

    /// Override the browser page-load timeout.
    #[arg(long = "page-load-timeout-seconds", value_name = "SECONDS", global = true)]
    pub page_load_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Document title stamped into the PDF metadata.
    #[arg(long, value_name = "TITLE")]
    pub title: String,

    /// HTML file to render.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the PDF.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// HTML injected as the page header.
    #[arg(long = "header-template", value_name = "HTML")]
    pub header_template: Option<String>,

    /// HTML injected as the page footer; `{page_number}` and `{total_pages}` are substituted.
    #[arg(long = "footer-template", value_name = "HTML")]
    pub footer_template: Option<String>,

    /// Wait for an element with this class before printing.
    #[arg(long = "wait-for-class", value_name = "CLASS", requires = "wait_for_duration_secs")]
    pub wait_for_class: Option<String>,

    /// Seconds to wait for the class to appear.
    #[arg(long = "wait-for-duration-secs", value_name = "SECONDS", requires = "wait_for_class")]
    pub wait_for_duration_secs: Option<u64>,
}
