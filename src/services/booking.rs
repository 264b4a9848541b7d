use crate::{
    error::{BookingError, PersistenceError},
    models::{
        booking::{Attendee, Booking, Confirmation, NewBooking},
        session::Session,
    },
    repositories::store::{BookingStore, BookingTx},
};

/// Reserves one seat in a session for an attendee.
///
/// The session row is locked for the whole check-then-insert sequence, so
/// concurrent attempts on the same session run one after another while
/// attempts on other sessions proceed in parallel. Nothing is retried: a
/// race lost to another attendee surfaces as [`BookingError::SessionFull`].
///
/// # Arguments
///
/// * `store` - The transactional store.
/// * `session_id` - The session to book.
/// * `attendee` - Attendee details, already validated by the caller.
///
/// # Returns
///
/// A `Result` containing the `Confirmation` of the committed booking.
pub async fn attempt_booking(
    store: &dyn BookingStore,
    session_id: i64,
    attendee: Attendee,
) -> Result<Confirmation, BookingError> {
    let mut tx = store.begin(session_id).await?;

    match reserve_seat(tx.as_mut(), session_id, attendee).await {
        Ok((session, booking)) => {
            tx.commit().await?;
            tracing::info!(
                "✅ Booking {} confirmed for session {} ({})",
                booking.id,
                session.id,
                session.activity
            );
            Ok(Confirmation::new(&session, &booking))
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    "Rollback of booking attempt on session {} failed: {}",
                    session_id,
                    rollback_err
                );
            }
            Err(e)
        }
    }
}

async fn reserve_seat(
    tx: &mut (dyn BookingTx + 'static),
    session_id: i64,
    attendee: Attendee,
) -> Result<(Session, Booking), BookingError> {
    let session = tx
        .lock_session(session_id)
        .await?
        .ok_or(BookingError::SessionNotFound(session_id))?;

    let booked = tx.count_bookings(session_id).await?;
    let remaining = session.remaining(booked);
    tracing::debug!(
        "Session {} locked: capacity {}, booked {}, remaining {}",
        session_id,
        session.capacity,
        booked,
        remaining
    );

    if remaining <= 0 {
        return Err(BookingError::SessionFull(session_id));
    }

    let booking = tx
        .insert_booking(&NewBooking { session_id, attendee })
        .await?;

    Ok((session, booking))
}

/// Seats left in a session, or `None` if it does not exist.
pub async fn remaining(
    store: &dyn BookingStore,
    session_id: i64,
) -> Result<Option<i64>, PersistenceError> {
    Ok(store
        .session_availability(session_id)
        .await?
        .map(|s| s.remaining))
}
