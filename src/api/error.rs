//! Mapping of pipeline failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use super::types::ProcessResponse;
use crate::tasks::TaskError;

/// Shown instead of the raw model reply when it cannot be decoded.
pub const PARSE_FAILURE_MESSAGE: &str =
    "The AI service returned a response in an unexpected format. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request method")]
    InvalidMethod,

    #[error("Invalid JSON payload")]
    MalformedPayload,

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidMethod => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MalformedPayload => StatusCode::BAD_REQUEST,
            ApiError::Task(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Task(TaskError::Parse(_)) => PARSE_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Task failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "Rejected request: {}", self);
        }
        (status, Json(ProcessResponse::error(self.public_message()))).into_response()
    }
}
