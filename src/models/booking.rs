use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::session::Session;

/// The attendee details recorded with a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// The attendee's full name.
    pub full_name: String,
    /// The attendee's phone number.
    pub phone: String,
    /// The attendee's email address.
    pub email: String,
}

/// One attendee's reservation against a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// The unique identifier for the booking.
    pub id: i64,
    /// The session the booking holds a seat in.
    pub session_id: i64,
    /// The attendee's full name.
    pub full_name: String,
    /// The attendee's phone number.
    pub phone: String,
    /// The attendee's email address.
    pub email: String,
    /// When the booking was committed, assigned by the store.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Row> for Booking {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            full_name: row.try_get("full_name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A booking row that has not been inserted yet.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// The session to hold a seat in.
    pub session_id: i64,
    /// Who the seat is for.
    pub attendee: Attendee,
}

/// Returned to the caller after a booking commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    /// The id assigned to the new booking.
    pub booking_id: i64,
    /// The booked session.
    pub session_id: i64,
    /// The booked session's activity.
    pub activity: String,
    /// The day of the booked session.
    pub event_date: NaiveDate,
    /// When the booked session starts.
    pub start_time: NaiveTime,
    /// When the booked session ends.
    pub end_time: NaiveTime,
    /// When the booking was committed.
    pub created_at: DateTime<Utc>,
}

impl Confirmation {
    /// Echoes the booked slot alongside the new booking's id.
    pub fn new(session: &Session, booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            session_id: session.id,
            activity: session.activity.clone(),
            event_date: session.event_date,
            start_time: session.start_time,
            end_time: session.end_time,
            created_at: booking.created_at,
        }
    }
}

/// A booking joined with its session, as listed and exported for admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRecord {
    /// The day of the session.
    pub event_date: NaiveDate,
    /// The session's activity.
    pub activity: String,
    /// When the session starts.
    pub start_time: NaiveTime,
    /// When the session ends.
    pub end_time: NaiveTime,
    /// The attendee's full name.
    pub full_name: String,
    /// The attendee's phone number.
    pub phone: String,
    /// The attendee's email address.
    pub email: String,
    /// When the booking was committed.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<&Row> for BookingRecord {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            event_date: row.try_get("event_date")?,
            activity: row.try_get("activity")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            full_name: row.try_get("full_name")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
