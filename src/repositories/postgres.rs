use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_postgres::{Object, Pool};
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tokio_postgres::error::SqlState;

use crate::{
    error::PersistenceError,
    models::{
        booking::{Booking, BookingRecord, NewBooking},
        session::{Session, SessionAvailability},
    },
    repositories::{
        admission::SessionAdmission,
        store::{BookingStore, BookingTx, StoreResult},
    },
};

const LOCK_SESSION: &str = r#"
    SELECT id, activity, event_date, start_time, end_time, capacity
    FROM sessions
    WHERE id = $1
    FOR UPDATE
"#;

const COUNT_BOOKINGS: &str = r#"
    SELECT COUNT(*) AS booked
    FROM bookings
    WHERE session_id = $1
"#;

const INSERT_BOOKING: &str = r#"
    INSERT INTO bookings (session_id, full_name, phone, email)
    VALUES ($1, $2, $3, $4)
    RETURNING id, session_id, full_name, phone, email, created_at
"#;

const EVENT_DATES: &str = r#"
    SELECT DISTINCT event_date
    FROM sessions
    ORDER BY event_date
"#;

const SESSIONS_ON: &str = r#"
    SELECT s.id, s.activity, s.event_date, s.start_time, s.end_time, s.capacity,
           COUNT(b.id) AS booked
    FROM sessions s
    LEFT JOIN bookings b ON b.session_id = s.id
    WHERE s.event_date = $1
    GROUP BY s.id
    ORDER BY s.activity, s.start_time
"#;

const SESSION_AVAILABILITY: &str = r#"
    SELECT s.id, s.activity, s.event_date, s.start_time, s.end_time, s.capacity,
           COUNT(b.id) AS booked
    FROM sessions s
    LEFT JOIN bookings b ON b.session_id = s.id
    WHERE s.id = $1
    GROUP BY s.id
"#;

const BOOKINGS_ON: &str = r#"
    SELECT s.event_date, s.activity, s.start_time, s.end_time,
           b.full_name, b.phone, b.email, b.created_at
    FROM bookings b
    JOIN sessions s ON s.id = b.session_id
    WHERE s.event_date = $1
    ORDER BY s.activity, s.start_time, b.created_at
"#;

/// Maps a lock-wait timeout to its own variant.
fn classify(e: tokio_postgres::Error) -> PersistenceError {
    if e.code() == Some(&SqlState::LOCK_NOT_AVAILABLE) {
        PersistenceError::LockTimeout
    } else {
        PersistenceError::Database(e)
    }
}

/// Sessions and bookings stored in PostgreSQL.
#[derive(Clone)]
pub struct PgBookingStore {
    pool: Pool,
    lock_timeout: Duration,
    admission: SessionAdmission,
}

impl PgBookingStore {
    /// Creates a store over `pool`. A booking attempt waits at most
    /// `lock_timeout` in total for its session, counting both the queue in
    /// front of the session and the database row lock.
    pub fn new(pool: Pool, lock_timeout: Duration) -> Self {
        Self {
            pool,
            lock_timeout,
            admission: SessionAdmission::new(),
        }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self, session_id: i64) -> StoreResult<Box<dyn BookingTx>> {
        let started = Instant::now();
        let admission = self.admission.admit(session_id, self.lock_timeout).await?;
        let client = self.pool.get().await?;

        let lock_budget = self
            .lock_timeout
            .saturating_sub(started.elapsed())
            .max(Duration::from_millis(1));
        let tx = PgBookingTx::begin(client, admission, lock_budget).await?;
        Ok(Box::new(tx))
    }

    async fn event_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(EVENT_DATES).await?;
        let rows = client.query(&stmt, &[]).await?;
        rows.iter()
            .map(|r| r.try_get("event_date").map_err(PersistenceError::from))
            .collect()
    }

    async fn sessions_on(&self, date: NaiveDate) -> StoreResult<Vec<SessionAvailability>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(SESSIONS_ON).await?;
        let rows = client.query(&stmt, &[&date]).await?;
        rows.iter()
            .map(|r| SessionAvailability::try_from(r).map_err(PersistenceError::from))
            .collect()
    }

    async fn session_availability(&self, session_id: i64) -> StoreResult<Option<SessionAvailability>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(SESSION_AVAILABILITY).await?;
        let row = client.query_opt(&stmt, &[&session_id]).await?;
        row.map(|r| SessionAvailability::try_from(&r).map_err(PersistenceError::from))
            .transpose()
    }

    async fn bookings_on(&self, date: NaiveDate) -> StoreResult<Vec<BookingRecord>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(BOOKINGS_ON).await?;
        let rows = client.query(&stmt, &[&date]).await?;
        rows.iter()
            .map(|r| BookingRecord::try_from(r).map_err(PersistenceError::from))
            .collect()
    }
}

/// A transaction holding one pooled connection and its session's admission.
///
/// The connection is taken out of the pool if the transaction is dropped
/// while still open, so the server rolls it back when the socket closes.
pub struct PgBookingTx {
    /// `Some` for as long as the transaction is alive. Only `finish` and
    /// `drop` take it, and both consume the transaction.
    client: Option<Object>,
    _admission: OwnedSemaphorePermit,
}

impl PgBookingTx {
    async fn begin(
        client: Object,
        admission: OwnedSemaphorePermit,
        lock_timeout: Duration,
    ) -> StoreResult<Self> {
        // SET LOCAL takes no bind parameters.
        let setup = format!(
            "BEGIN; SET LOCAL lock_timeout = '{}ms'",
            lock_timeout.as_millis()
        );
        if let Err(e) = client.batch_execute(&setup).await {
            drop(Object::take(client));
            return Err(e.into());
        }
        Ok(Self {
            client: Some(client),
            _admission: admission,
        })
    }

    fn client(&self) -> &Object {
        match &self.client {
            Some(client) => client,
            None => unreachable!("booking transaction used after it finished"),
        }
    }

    async fn finish(mut self: Box<Self>, statement: &str) -> StoreResult<()> {
        let Some(client) = self.client.take() else {
            unreachable!("booking transaction finished twice");
        };
        match client.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                drop(Object::take(client));
                Err(classify(e))
            }
        }
    }
}

impl Drop for PgBookingTx {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            tracing::warn!("Open booking transaction dropped, discarding its connection");
            drop(Object::take(client));
        }
    }
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn lock_session(&mut self, session_id: i64) -> StoreResult<Option<Session>> {
        let client = self.client();
        let stmt = client.prepare_cached(LOCK_SESSION).await?;
        let row = client
            .query_opt(&stmt, &[&session_id])
            .await
            .map_err(classify)?;
        row.map(|r| Session::try_from(&r).map_err(PersistenceError::from))
            .transpose()
    }

    async fn count_bookings(&mut self, session_id: i64) -> StoreResult<i64> {
        let client = self.client();
        let stmt = client.prepare_cached(COUNT_BOOKINGS).await?;
        let row = client.query_one(&stmt, &[&session_id]).await?;
        Ok(row.try_get("booked")?)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking> {
        let client = self.client();
        let stmt = client.prepare_cached(INSERT_BOOKING).await?;
        let row = client
            .query_one(
                &stmt,
                &[
                    &booking.session_id,
                    &booking.attendee.full_name,
                    &booking.attendee.phone,
                    &booking.attendee.email,
                ],
            )
            .await?;
        Ok(Booking::try_from(&row)?)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.finish("ROLLBACK").await
    }
}

#[cfg(test)]
mod tests {
    //! These run against a real PostgreSQL database:
    //! `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`

    use super::*;
    use crate::{
        db,
        error::BookingError,
        models::booking::Attendee,
        services::booking as booking_service,
    };
    use chrono::NaiveTime;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn setup(lock_timeout: Duration) -> (Pool, PgBookingStore) {
        setup_with_pool(16, lock_timeout).await
    }

    async fn setup_with_pool(size: usize, lock_timeout: Duration) -> (Pool, PgBookingStore) {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let pool = db::create_pool(&url, size, lock_timeout + Duration::from_secs(1)).expect("pool");
        db::run_migrations(&pool).await.expect("migrations");
        let store = PgBookingStore::new(pool.clone(), lock_timeout);
        (pool, store)
    }

    async fn insert_session(pool: &Pool, activity: &str, capacity: i32) -> i64 {
        let client = pool.get().await.expect("client");
        let row = client
            .query_one(
                "INSERT INTO sessions (activity, event_date, start_time, end_time, capacity)
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &activity,
                    &NaiveDate::from_ymd_opt(2031, 3, 1).unwrap(),
                    &NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                    &NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
                    &capacity,
                ],
            )
            .await
            .expect("insert session");
        row.get("id")
    }

    async fn rows_for(pool: &Pool, session_id: i64) -> i64 {
        let client = pool.get().await.expect("client");
        client
            .query_one("SELECT COUNT(*) FROM bookings WHERE session_id = $1", &[&session_id])
            .await
            .expect("count")
            .get(0)
    }

    fn attendee(n: usize) -> Attendee {
        Attendee {
            full_name: format!("Attendee {n}"),
            phone: "+34 600 123 456".to_string(),
            email: format!("attendee{n}@example.com"),
        }
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn concurrent_attempts_never_exceed_capacity() {
        let (pool, store) = setup(Duration::from_secs(5)).await;
        let session_id = insert_session(&pool, "Climbing", 5).await;
        let store: Arc<dyn BookingStore> = Arc::new(store);

        let handles: Vec<_> = (0..12)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    booking_service::attempt_booking(store.as_ref(), session_id, attendee(n)).await
                })
            })
            .collect();

        let mut ids = HashSet::new();
        let mut full = 0;
        for handle in handles {
            match handle.await.expect("task") {
                Ok(confirmation) => assert!(ids.insert(confirmation.booking_id)),
                Err(BookingError::SessionFull(_)) => full += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(ids.len(), 5);
        assert_eq!(full, 7);
        assert_eq!(rows_for(&pool, session_id).await, 5);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn missing_session_is_reported() {
        let (_pool, store) = setup(Duration::from_secs(5)).await;
        let result = booking_service::attempt_booking(&store, i64::MAX, attendee(0)).await;
        assert!(matches!(result, Err(BookingError::SessionNotFound(id)) if id == i64::MAX));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn held_lock_times_out_other_attempts() {
        let (pool, store) = setup(Duration::from_millis(100)).await;
        let session_id = insert_session(&pool, "Archery", 3).await;

        let mut holder = store.begin(session_id).await.expect("begin");
        holder.lock_session(session_id).await.expect("lock").expect("session");

        let result = booking_service::attempt_booking(&store, session_id, attendee(1)).await;
        assert!(matches!(
            result,
            Err(BookingError::PersistenceUnavailable(PersistenceError::LockTimeout))
        ));

        holder.rollback().await.expect("rollback");
        assert_eq!(rows_for(&pool, session_id).await, 0);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn hot_session_does_not_starve_other_sessions() {
        let (pool, store) = setup_with_pool(4, Duration::from_secs(3)).await;
        let hot = insert_session(&pool, "Hot", 25).await;
        let cold = insert_session(&pool, "Cold", 5).await;
        let store: Arc<dyn BookingStore> = Arc::new(store);

        let mut holder = store.begin(hot).await.expect("begin");
        holder.lock_session(hot).await.expect("lock").expect("session");

        let waiters: Vec<_> = (0..20)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    booking_service::attempt_booking(store.as_ref(), hot, attendee(n)).await
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let result = booking_service::attempt_booking(store.as_ref(), cold, attendee(99)).await;
        let waited = started.elapsed();

        assert!(result.is_ok(), "cold session attempt failed: {result:?}");
        assert!(waited < Duration::from_secs(1), "cold session waited {waited:?}");

        holder.rollback().await.expect("rollback");
        for waiter in waiters {
            assert!(waiter.await.expect("task").is_ok());
        }
        assert_eq!(rows_for(&pool, hot).await, 20);
        assert_eq!(rows_for(&pool, cold).await, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn dropped_transaction_releases_session() {
        let (pool, store) = setup(Duration::from_millis(500)).await;
        let session_id = insert_session(&pool, "Rowing", 2).await;

        {
            let mut tx = store.begin(session_id).await.expect("begin");
            tx.lock_session(session_id).await.expect("lock").expect("session");
            tx.insert_booking(&NewBooking { session_id, attendee: attendee(0) })
                .await
                .expect("insert");
        }

        booking_service::attempt_booking(&store, session_id, attendee(1))
            .await
            .expect("booking after dropped transaction");
        assert_eq!(rows_for(&pool, session_id).await, 1);
    }
}
