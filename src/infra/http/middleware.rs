use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Log every request. Render failures answer 200, so a failure is recognised by
/// the [`ErrorReport`] the handler attached, not by the status code.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        if status.is_client_error() || status.is_server_error() {
            warn!(
                target = "pdfoid::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                request_id = request_id,
                "client request error",
            );
        } else {
            info!(
                target = "pdfoid::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                request_id = request_id,
                "request completed",
            );
        }
        return response;
    };

    let detail = report
        .messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if report.kind == "validation" {
        warn!(
            target = "pdfoid::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            source = report.source,
            kind = report.kind,
            detail = %detail,
            request_id = request_id,
            "render request rejected",
        );
    } else {
        error!(
            target = "pdfoid::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            source = report.source,
            kind = report.kind,
            detail = %detail,
            chain = ?report.messages,
            request_id = request_id,
            "render request failed",
        );
    }

    response
}
