use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    models::session::SessionAvailability,
    services::{booking as booking_service, catalog as catalog_service},
    state::AppState,
};

use super::response::json;

/// The query parameters for listing sessions.
#[derive(Deserialize)]
pub struct SessionsQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub activity: Option<String>,
}

fn session_json(s: &SessionAvailability) -> sonic_rs::Value {
    sonic_rs::json!({
        "id": s.session.id,
        "activity": s.session.activity,
        "event_date": s.session.event_date.format("%Y-%m-%d").to_string(),
        "start_time": s.session.start_time.format("%H:%M").to_string(),
        "end_time": s.session.end_time.format("%H:%M").to_string(),
        "capacity": s.session.capacity,
        "booked": s.booked,
        "remaining": s.remaining,
        "available": s.has_free_seat()
    })
}

/// Lists the dates that have sessions.
#[axum::debug_handler]
pub async fn list_event_dates(State(state): State<AppState>) -> Result<Response> {
    let dates: Vec<String> = catalog_service::event_dates(state.store.as_ref())
        .await?
        .into_iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();

    json(StatusCode::OK, &sonic_rs::json!({ "dates": dates }))
}

/// Lists the sessions on a date, with remaining seats.
///
/// Without a `date` the earliest event date is listed. An empty `activity`
/// means every activity.
#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionsQuery>,
) -> Result<Response> {
    let activity = query
        .activity
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    let schedule = catalog_service::day_schedule(state.store.as_ref(), query.date, activity).await?;
    let sessions: Vec<_> = schedule.sessions.iter().map(session_json).collect();

    json(
        StatusCode::OK,
        &sonic_rs::json!({
            "date": schedule.date.format("%Y-%m-%d").to_string(),
            "activities": schedule.activities,
            "sessions": sessions
        }),
    )
}

/// Reports the seats left in one session.
#[axum::debug_handler]
pub async fn session_remaining(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Result<Response> {
    let remaining = booking_service::remaining(state.store.as_ref(), session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    json(
        StatusCode::OK,
        &sonic_rs::json!({
            "session_id": session_id,
            "remaining": remaining
        }),
    )
}
