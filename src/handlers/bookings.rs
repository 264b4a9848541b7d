use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    Json,
};

use crate::{
    error::{AppError, Result},
    services::booking as booking_service,
    state::AppState,
    validation::booking::BookingRequest,
};

use super::response::json;

/// Validates a booking submission and reserves the seat.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `payload` - The submitted attendee details and session. A body that
///   is not a JSON booking request is a validation error.
///
/// # Returns
///
/// `201 Created` with the confirmed slot, or the error mapped to its status.
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    let (session_id, attendee) = req.into_attendee()?;
    tracing::debug!("📝 Booking request for session {}", session_id);

    let confirmation =
        booking_service::attempt_booking(state.store.as_ref(), session_id, attendee).await?;

    json(
        StatusCode::CREATED,
        &sonic_rs::json!({
            "booking_id": confirmation.booking_id,
            "session_id": confirmation.session_id,
            "activity": confirmation.activity,
            "event_date": confirmation.event_date.format("%Y-%m-%d").to_string(),
            "start_time": confirmation.start_time.format("%H:%M").to_string(),
            "end_time": confirmation.end_time.format("%H:%M").to_string(),
            "created_at": confirmation.created_at.to_rfc3339(),
            "message": "Booking confirmed"
        }),
    )
}
