mod handlers;
mod middleware;
mod models;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::render::RenderBackend;

pub use middleware::RequestContext;
pub use models::{RenderEnvelope, RenderForm};

#[derive(Clone)]
pub struct HttpState {
    pub backend: Arc<RenderBackend>,
}

pub fn build_router(state: HttpState, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/", post(handlers::render_pdf))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
