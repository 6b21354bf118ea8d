//! `POST /api/process`: run one text task.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, response::Json};

use super::error::ApiError;
use super::routes::AppState;
use super::types::ProcessResponse;
use crate::tasks::TaskRequest;

/// The body is decoded as JSON whatever the `Content-Type` says; only an
/// undecodable body is rejected.
pub async fn process(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request: TaskRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!("Rejected process payload: {}", e);
        ApiError::MalformedPayload
    })?;

    let result = state.dispatcher.dispatch(request).await?;
    Ok(Json(result.into()))
}

/// Any method other than POST on the process route.
pub async fn invalid_method() -> ApiError {
    ApiError::InvalidMethod
}
