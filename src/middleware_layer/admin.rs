use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{error::AppError, state::AppState};

/// The request header carrying the admin password.
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// A middleware that admits only requests carrying the admin password.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or `403` when no admin password is configured and `401`
/// when the header is missing or wrong.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.admin_password.as_ref() else {
        return Err(AppError::Forbidden(
            "Admin endpoints are disabled".to_string(),
        ));
    };

    let provided = request
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .map(|v| v.as_bytes())
        .ok_or_else(|| AppError::Authentication("Missing admin password".to_string()))?;

    if !bool::from(provided.ct_eq(expected.as_bytes())) {
        return Err(AppError::Authentication("Invalid admin password".to_string()));
    }

    tracing::debug!("🔐 Admin access granted for {}", request.uri().path());

    Ok(next.run(request).await)
}
