use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recode_core::pipeline::PipelineError;
use recode_core::services::generation::GenerationError;
use thiserror::Error;

/// Every failure a handler can return, rendered as a `text/plain` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Upload(#[from] MultipartError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload(e) => e.status(),
            ApiError::Generation(_) | ApiError::Pipeline(PipelineError::Generation(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> String {
        match self {
            ApiError::BadRequest(message) => message.clone(),
            ApiError::Upload(e) => e.body_text(),
            ApiError::Generation(e) | ApiError::Pipeline(PipelineError::Generation(e)) => {
                format!("Text generation failed: {e}")
            }
            ApiError::Pipeline(e @ (PipelineError::Decompile(_) | PipelineError::Join(_))) => {
                format!("Decompilation failed: {e}")
            }
            ApiError::Pipeline(e) => format!("Internal error: {e}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "request failed: {self}");
        } else {
            tracing::debug!(%status, "request rejected: {self}");
        }
        (status, self.body()).into_response()
    }
}
