use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{error::ErrorReport, render::RenderError};

use super::{
    HttpState,
    models::{RenderEnvelope, RenderForm},
};

const SOURCE: &str = "infra::http::render_pdf";

/// `POST /`. Always answers 200; success or failure travels in the envelope.
pub(super) async fn render_pdf(
    State(state): State<HttpState>,
    form: Result<Form<RenderForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            let message = rejection.body_text();
            let mut response = Json(RenderEnvelope::failure(message.clone())).into_response();
            ErrorReport::from_message(SOURCE, "validation", message).attach(&mut response);
            return response;
        }
    };

    let outcome = match form.into_request() {
        Ok(request) => state.backend.render(&request).await,
        Err(err) => Err(RenderError::from(err)),
    };

    match outcome {
        Ok(result) => Json(RenderEnvelope::success(&result.pdf)).into_response(),
        Err(err) => {
            let mut response = Json(RenderEnvelope::failure(err.to_string())).into_response();
            ErrorReport::from_error(SOURCE, err.kind(), &err).attach(&mut response);
            response
        }
    }
}

/// `GET /health`.
pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
