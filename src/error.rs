use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// A failure of the persistence layer itself.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// No connection could be checked out of the pool.
    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The session's row lock was not granted within the lock-wait timeout.
    #[error("Timed out waiting for the session lock")]
    LockTimeout,
}

/// The outcome of a booking attempt that did not produce a booking.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The requested session does not exist.
    #[error("Session {0} not found")]
    SessionNotFound(i64),

    /// The session had no remaining seats while its lock was held.
    #[error("Session {0} is full")]
    SessionFull(i64),

    /// The store could not be reached or the transaction failed.
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] PersistenceError),
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A persistence error outside of a booking attempt.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A booking attempt failed.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// The database pool could not be built.
    #[error("Pool creation error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An authorization error.
    #[error("Authorization failed: {0}")]
    Forbidden(String),

    /// A resource not found error.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Persistence(PersistenceError::Database(e))
    }
}

fn persistence_response(e: &PersistenceError) -> (StatusCode, String) {
    match e {
        PersistenceError::LockTimeout => {
            tracing::warn!("Session lock wait timed out");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "The session is busy, please try again".to_string(),
            )
        }
        other => {
            tracing::error!("Persistence error: {}", other);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Booking storage is unavailable".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Persistence(ref e) => persistence_response(e),

            AppError::Booking(BookingError::SessionNotFound(id)) => {
                tracing::debug!("Session {} not found", id);
                (StatusCode::NOT_FOUND, "Session not found".to_string())
            }

            AppError::Booking(BookingError::SessionFull(id)) => {
                tracing::info!("Session {} is full", id);
                (
                    StatusCode::CONFLICT,
                    "Sorry, that session has just filled up".to_string(),
                )
            }

            AppError::Booking(BookingError::PersistenceUnavailable(ref e)) => {
                persistence_response(e)
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool creation error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Forbidden(ref msg) => {
                tracing::warn!("Authorization failed: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
