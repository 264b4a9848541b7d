use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::Result,
    services::{admin as admin_service, catalog as catalog_service},
    state::AppState,
};

use super::response::json;

/// The query parameters of the admin endpoints.
#[derive(Deserialize)]
pub struct AdminQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Lists the bookings for a date.
#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Response> {
    let date = catalog_service::resolve_date(state.store.as_ref(), query.date).await?;
    let bookings = admin_service::bookings_on(state.store.as_ref(), date).await?;

    let rows: Vec<_> = bookings
        .iter()
        .map(|b| {
            sonic_rs::json!({
                "event_date": b.event_date.format("%Y-%m-%d").to_string(),
                "activity": b.activity,
                "start_time": b.start_time.format("%H:%M").to_string(),
                "end_time": b.end_time.format("%H:%M").to_string(),
                "full_name": b.full_name,
                "phone": b.phone,
                "email": b.email,
                "created_at": b.created_at.to_rfc3339()
            })
        })
        .collect();

    json(
        StatusCode::OK,
        &sonic_rs::json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "count": rows.len(),
            "bookings": rows
        }),
    )
}

/// Downloads the bookings for a date as CSV.
#[axum::debug_handler]
pub async fn export_bookings(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Response> {
    let date = catalog_service::resolve_date(state.store.as_ref(), query.date).await?;
    let bookings = admin_service::bookings_on(state.store.as_ref(), date).await?;
    let csv = admin_service::render_csv(&bookings);

    let disposition = format!(
        "attachment; filename=\"{}\"",
        admin_service::export_filename(date)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}
