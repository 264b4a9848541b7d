use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::PersistenceError,
    models::{
        booking::{Booking, BookingRecord, NewBooking},
        session::{Session, SessionAvailability},
    },
};

/// A `Result` for persistence operations.
pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// A transactional store holding sessions and their bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Opens a transaction for one booking attempt on `session_id`.
    ///
    /// Attempts on the same session may queue here before any connection
    /// is taken. Waiting longer than the lock-wait timeout fails with
    /// [`PersistenceError::LockTimeout`].
    async fn begin(&self, session_id: i64) -> StoreResult<Box<dyn BookingTx>>;

    /// Distinct dates that have sessions, ascending.
    async fn event_dates(&self) -> StoreResult<Vec<NaiveDate>>;

    /// Sessions on `date` with their booking counts, by activity then start time.
    async fn sessions_on(&self, date: NaiveDate) -> StoreResult<Vec<SessionAvailability>>;

    /// A single session with its booking count.
    async fn session_availability(&self, session_id: i64) -> StoreResult<Option<SessionAvailability>>;

    /// Bookings for sessions on `date`, by activity, start time and creation.
    async fn bookings_on(&self, date: NaiveDate) -> StoreResult<Vec<BookingRecord>>;
}

/// An open transaction.
///
/// Dropping it without calling [`commit`](BookingTx::commit) discards every
/// write made through it and releases its locks.
#[async_trait]
pub trait BookingTx: Send {
    /// Reads the session and holds an exclusive lock on it until the
    /// transaction ends. Returns `None` without locking if it does not exist.
    async fn lock_session(&mut self, session_id: i64) -> StoreResult<Option<Session>>;

    /// Counts bookings referencing the session, as seen by this transaction.
    async fn count_bookings(&mut self, session_id: i64) -> StoreResult<i64>;

    /// Inserts a booking and returns it with its assigned id and timestamp.
    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking>;

    /// Makes every write visible and releases the session lock.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discards every write and releases the session lock.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
