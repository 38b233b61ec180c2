use std::{process, sync::Arc, time::Duration};

use pdfoid::{
    application::{
        error::AppError,
        render::{RenderBackend, RenderError},
    },
    config::{self, RenderArgs},
    domain::request::{RenderRequest, WaitFor},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    let backend = Arc::new(RenderBackend::from_settings(&settings.render)?);

    match command {
        config::Command::Serve(_) => run_serve(&settings, backend).await,
        config::Command::Render(args) => run_render(&backend, *args).await,
    }
}

async fn run_serve(settings: &config::Settings, backend: Arc<RenderBackend>) -> Result<(), AppError> {
    let router = http::build_router(HttpState { backend }, settings.server.max_request_bytes);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "pdfoid::serve",
        addr = %settings.server.addr,
        "Listening for render requests"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "pdfoid::serve", "Server stopped");
    Ok(())
}

async fn run_render(backend: &RenderBackend, args: RenderArgs) -> Result<(), AppError> {
    let html = tokio::fs::read_to_string(&args.input)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let mut request = RenderRequest::new(args.title, html);
    if let Some(template) = args.header_template {
        request = request.with_header_template(template);
    }
    if let Some(template) = args.footer_template {
        request = request.with_footer_template(template);
    }
    if let (Some(class_name), Some(seconds)) = (args.wait_for_class, args.wait_for_duration_secs) {
        let wait_for = WaitFor::new(class_name, Duration::from_secs(seconds))
            .map_err(|err| AppError::from(RenderError::from(err)))?;
        request = request.with_wait_for(wait_for);
    }

    let result = backend.render(&request).await?;
    tokio::fs::write(&args.output, &result.pdf)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pdfoid::render",
        output = %args.output.display(),
        pdf_bytes = result.pdf.len(),
        "PDF written"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(target = "pdfoid::serve", "Shutdown signal received");
}
