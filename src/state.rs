use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::postgres::PgBookingStore;
use crate::repositories::store::BookingStore;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The transactional booking store.
    pub store: Arc<dyn BookingStore>,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL.
    ///
    /// Builds the connection pool and applies the schema before returning.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = crate::db::create_pool(
            &config.database_url,
            config.pool_size,
            config.pool_wait_timeout(),
        )?;
        tracing::info!(
            "✅ PostgreSQL pool initialized (max {} connections, wait {} ms)",
            config.pool_size,
            config.pool_wait_timeout().as_millis()
        );

        crate::db::run_migrations(&pool).await?;
        tracing::info!("✅ Schema is up to date");

        let store = PgBookingStore::new(pool, config.lock_timeout);
        tracing::info!(
            "✅ Booking store ready (lock timeout {} ms)",
            config.lock_timeout.as_millis()
        );

        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Creates a state around an existing store.
    pub fn with_store(store: Arc<dyn BookingStore>, config: &Config) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }
}
