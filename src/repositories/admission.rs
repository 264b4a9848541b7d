use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::PersistenceError;

/// Queues booking attempts on the same session inside this process.
///
/// An attempt holds its session's permit from before it takes a pooled
/// connection until its transaction ends, so at most one connection per
/// session waits on the row lock. Attempts waiting for a busy session hold
/// no connection, and other sessions keep the rest of the pool.
#[derive(Clone, Default)]
pub struct SessionAdmission {
    gates: Arc<Mutex<HashMap<i64, Arc<Semaphore>>>>,
}

impl SessionAdmission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits at most `timeout` for the session's turn.
    ///
    /// # Returns
    ///
    /// The permit to hold for the rest of the attempt, or
    /// [`PersistenceError::LockTimeout`] if the turn did not come in time.
    pub async fn admit(
        &self,
        session_id: i64,
        timeout: Duration,
    ) -> Result<OwnedSemaphorePermit, PersistenceError> {
        let gate = self
            .gates
            .lock()
            .await
            .entry(session_id)
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();

        match tokio::time::timeout(timeout, gate.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            // Gates are never closed; a closed one behaves like a busy one.
            Ok(Err(_)) | Err(_) => {
                tracing::debug!("Session {} admission timed out", session_id);
                Err(PersistenceError::LockTimeout)
            }
        }
    }
}
