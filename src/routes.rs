use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{HeaderName, HeaderValue, Method, header};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {o:?}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(middleware_layer::admin::ADMIN_PASSWORD_HEADER),
        ])
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(Duration::from_secs(86400)))
}

/// Builds the application router.
///
/// # Arguments
///
/// * `state` - The application state.
///
/// # Returns
///
/// A `Result` containing the `Router`, or an error if the CORS origins or
/// the rate limit are misconfigured.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let public_routes = Router::new()
        .route("/api/event-dates", get(handlers::sessions::list_event_dates))
        .route("/api/sessions", get(handlers::sessions::list_sessions))
        .route(
            "/api/sessions/{session_id}/remaining",
            get(handlers::sessions::session_remaining),
        )
        .with_state(state.clone());

    let mut booking_routes = Router::new()
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .with_state(state.clone());

    if let Some(limit) = state.config.booking_rate_limit {
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(limit.per_second)
                .burst_size(limit.burst)
                .use_headers()
                .finish()
                .context("Invalid booking rate limit")?,
        );
        booking_routes = booking_routes.layer(GovernorLayer::new(governor_conf));
        tracing::info!(
            "✅ Booking rate limit: burst {}, one more every {}s",
            limit.burst,
            limit.per_second
        );
    }

    let admin_routes = Router::new()
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/export",
            get(handlers::admin::export_bookings),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::admin::require_admin,
        ))
        .with_state(state.clone());

    if !state.config.admin_enabled() {
        tracing::warn!("⚠️ ADMIN_PASSWORD is not set, admin endpoints are disabled");
    }

    Ok(Router::new()
        .merge(public_routes)
        .merge(booking_routes)
        .merge(admin_routes)
        .fallback_service(ServeDir::new(&state.config.public_dir))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(cors_layer(&state.config.cors_allowed_origins)?))
}
