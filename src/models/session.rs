use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// A scheduled activity time-slot with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The unique identifier for the session.
    pub id: i64,
    /// The name of the activity.
    pub activity: String,
    /// The day the session takes place.
    pub event_date: NaiveDate,
    /// When the session starts.
    pub start_time: NaiveTime,
    /// When the session ends.
    pub end_time: NaiveTime,
    /// The maximum number of bookings.
    pub capacity: i32,
}

impl Session {
    /// Seats left once `booked` bookings exist. Negative when overbooked.
    pub fn remaining(&self, booked: i64) -> i64 {
        i64::from(self.capacity) - booked
    }
}

impl TryFrom<&Row> for Session {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            activity: row.try_get("activity")?,
            event_date: row.try_get("event_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            capacity: row.try_get("capacity")?,
        })
    }
}

/// A session together with how many seats are taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionAvailability {
    /// The session itself.
    #[serde(flatten)]
    pub session: Session,
    /// The number of bookings referencing the session.
    pub booked: i64,
    /// `capacity - booked`.
    pub remaining: i64,
}

impl SessionAvailability {
    /// Builds the projection from a session and its booking count.
    pub fn new(session: Session, booked: i64) -> Self {
        let remaining = session.remaining(booked);
        Self { session, booked, remaining }
    }

    /// Whether another booking would still fit.
    pub fn has_free_seat(&self) -> bool {
        self.remaining > 0
    }
}

impl TryFrom<&Row> for SessionAvailability {
    type Error = tokio_postgres::Error;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let session = Session::try_from(row)?;
        let booked: i64 = row.try_get("booked")?;
        Ok(Self::new(session, booked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: i32) -> Session {
        Session {
            id: 1,
            activity: "Kayak".to_string(),
            event_date: NaiveDate::from_ymd_opt(2025, 6, 14).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            capacity,
        }
    }

    #[test]
    fn remaining_is_capacity_minus_booked() {
        assert_eq!(session(5).remaining(0), 5);
        assert_eq!(session(5).remaining(3), 2);
        assert_eq!(session(1).remaining(1), 0);
    }

    #[test]
    fn availability_reports_full_sessions() {
        let open = SessionAvailability::new(session(2), 1);
        assert!(open.has_free_seat());
        assert_eq!(open.remaining, 1);

        let full = SessionAvailability::new(session(2), 2);
        assert!(!full.has_free_seat());

        let zero = SessionAvailability::new(session(0), 0);
        assert!(!zero.has_free_seat());
    }
}
