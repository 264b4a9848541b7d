use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Result};

/// Serializes `body` with sonic-rs into a JSON response.
pub fn json<T: serde::Serialize>(status: StatusCode, body: &T) -> Result<Response> {
    let body = sonic_rs::to_string(body)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {e}")))?;

    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}
