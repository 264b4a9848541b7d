//! An in-process store with per-session row locks, used by the tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::PersistenceError,
    models::{
        booking::{Booking, BookingRecord, NewBooking},
        session::{Session, SessionAvailability},
    },
    repositories::store::{BookingStore, BookingTx, StoreResult},
};

#[derive(Default)]
struct Tables {
    sessions: BTreeMap<i64, Session>,
    bookings: Vec<Booking>,
}

impl Tables {
    fn booked(&self, session_id: i64) -> i64 {
        self.bookings.iter().filter(|b| b.session_id == session_id).count() as i64
    }
}

#[derive(Clone)]
pub struct MemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
    row_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
    next_booking_id: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl MemoryBookingStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            next_booking_id: Arc::new(AtomicI64::new(1)),
            lock_timeout,
        }
    }

    pub async fn add_session(&self, session: Session) {
        self.tables.lock().await.sessions.insert(session.id, session);
    }

    /// Inserts a committed booking directly, bypassing the capacity check.
    pub async fn add_booking(&self, session_id: i64, full_name: &str) -> Booking {
        let booking = Booking {
            id: self.next_booking_id.fetch_add(1, Ordering::SeqCst),
            session_id,
            full_name: full_name.to_string(),
            phone: "600000000".to_string(),
            email: "seed@example.com".to_string(),
            created_at: Utc::now(),
        };
        self.tables.lock().await.bookings.push(booking.clone());
        booking
    }

    /// Committed bookings for a session.
    pub async fn booking_rows(&self, session_id: i64) -> i64 {
        self.tables.lock().await.booked(session_id)
    }

    async fn row_lock(&self, session_id: i64) -> Arc<Mutex<()>> {
        self.row_locks
            .lock()
            .await
            .entry(session_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn begin(&self, _session_id: i64) -> StoreResult<Box<dyn BookingTx>> {
        Ok(Box::new(MemoryBookingTx {
            store: self.clone(),
            held: Vec::new(),
            pending: Vec::new(),
        }))
    }

    async fn event_dates(&self) -> StoreResult<Vec<NaiveDate>> {
        let tables = self.tables.lock().await;
        let mut dates: Vec<NaiveDate> = tables.sessions.values().map(|s| s.event_date).collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    async fn sessions_on(&self, date: NaiveDate) -> StoreResult<Vec<SessionAvailability>> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<SessionAvailability> = tables
            .sessions
            .values()
            .filter(|s| s.event_date == date)
            .map(|s| SessionAvailability::new(s.clone(), tables.booked(s.id)))
            .collect();
        sessions.sort_by(|a, b| {
            (&a.session.activity, a.session.start_time).cmp(&(&b.session.activity, b.session.start_time))
        });
        Ok(sessions)
    }

    async fn session_availability(&self, session_id: i64) -> StoreResult<Option<SessionAvailability>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(&session_id)
            .map(|s| SessionAvailability::new(s.clone(), tables.booked(s.id))))
    }

    async fn bookings_on(&self, date: NaiveDate) -> StoreResult<Vec<BookingRecord>> {
        let tables = self.tables.lock().await;
        let mut records: Vec<BookingRecord> = tables
            .bookings
            .iter()
            .filter_map(|b| {
                let s = tables.sessions.get(&b.session_id)?;
                (s.event_date == date).then(|| BookingRecord {
                    event_date: s.event_date,
                    activity: s.activity.clone(),
                    start_time: s.start_time,
                    end_time: s.end_time,
                    full_name: b.full_name.clone(),
                    phone: b.phone.clone(),
                    email: b.email.clone(),
                    created_at: b.created_at,
                })
            })
            .collect();
        records.sort_by(|a, b| {
            (&a.activity, a.start_time, a.created_at).cmp(&(&b.activity, b.start_time, b.created_at))
        });
        Ok(records)
    }
}

pub struct MemoryBookingTx {
    store: MemoryBookingStore,
    held: Vec<OwnedMutexGuard<()>>,
    pending: Vec<Booking>,
}

#[async_trait]
impl BookingTx for MemoryBookingTx {
    async fn lock_session(&mut self, session_id: i64) -> StoreResult<Option<Session>> {
        if !self.store.tables.lock().await.sessions.contains_key(&session_id) {
            return Ok(None);
        }

        let row = self.store.row_lock(session_id).await;
        let guard = tokio::time::timeout(self.store.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| PersistenceError::LockTimeout)?;
        self.held.push(guard);

        Ok(self.store.tables.lock().await.sessions.get(&session_id).cloned())
    }

    async fn count_bookings(&mut self, session_id: i64) -> StoreResult<i64> {
        let committed = self.store.tables.lock().await.booked(session_id);
        let pending = self.pending.iter().filter(|b| b.session_id == session_id).count() as i64;
        // Let other attempts run between the count and the insert.
        tokio::task::yield_now().await;
        Ok(committed + pending)
    }

    async fn insert_booking(&mut self, booking: &NewBooking) -> StoreResult<Booking> {
        let row = Booking {
            id: self.store.next_booking_id.fetch_add(1, Ordering::SeqCst),
            session_id: booking.session_id,
            full_name: booking.attendee.full_name.clone(),
            phone: booking.attendee.phone.clone(),
            email: booking.attendee.email.clone(),
            created_at: Utc::now(),
        };
        self.pending.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryBookingTx { store, held, pending } = *self;
        store.tables.lock().await.bookings.extend(pending);
        drop(held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
