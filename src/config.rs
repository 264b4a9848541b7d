use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Rate limit applied to booking submissions, per client IP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingRateLimit {
    /// Seconds after which one request of the burst is replenished.
    pub per_second: u64,
    /// Burst size.
    pub burst: u32,
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// Secret gating the admin listing and export. `None` disables them.
    pub admin_password: Option<Zeroizing<String>>,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Maximum number of pooled database connections.
    pub pool_size: usize,
    /// How long a booking attempt may wait for a session's row lock.
    pub lock_timeout: Duration,
    /// Rate limit for `POST /api/bookings`. `None` disables it.
    pub booking_rate_limit: Option<BookingRateLimit>,
    /// Origins allowed by CORS.
    pub cors_allowed_origins: Vec<String>,
    /// Directory of static front-end files served as the fallback.
    pub public_dir: String,
}

/// Extra time a pool checkout may wait beyond the lock-wait timeout.
const POOL_WAIT_MARGIN: Duration = Duration::from_secs(1);

fn var_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from any source of variables.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the value of a variable, or `None` if unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        if database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL must not be empty");
        }

        let admin_password = lookup("ADMIN_PASSWORD")
            .filter(|p| !p.is_empty())
            .map(Zeroizing::new);

        let per_second: u64 = var_or(&lookup, "BOOKING_RATE_PERIOD_SECS", 2)?;
        let burst: u32 = var_or(&lookup, "BOOKING_RATE_BURST", 10)?;
        let booking_rate_limit = (per_second > 0 && burst > 0)
            .then_some(BookingRateLimit { per_second, burst });

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let lock_timeout_ms: u64 = var_or(&lookup, "LOCK_TIMEOUT_MS", 5000)?;
        if lock_timeout_ms == 0 {
            anyhow::bail!("LOCK_TIMEOUT_MS must be greater than 0");
        }

        let pool_size: usize = var_or(&lookup, "DATABASE_POOL_SIZE", 16)?;
        if pool_size == 0 {
            anyhow::bail!("DATABASE_POOL_SIZE must be greater than 0");
        }

        Ok(Self {
            database_url,
            admin_password,
            bind_addr: var_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            pool_size,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            booking_rate_limit,
            cors_allowed_origins,
            public_dir: lookup("PUBLIC_DIR").unwrap_or_else(|| "files/public".to_string()),
        })
    }

    /// Whether the admin endpoints are reachable at all.
    pub fn admin_enabled(&self) -> bool {
        self.admin_password.is_some()
    }

    /// How long a pool checkout may wait. Always longer than the lock-wait
    /// timeout, so a booking that waited its full turn can still get a
    /// connection.
    pub fn pool_wait_timeout(&self) -> Duration {
        self.lock_timeout + POOL_WAIT_MARGIN
    }
}

#[cfg(test)]
impl Config {
    /// A configuration for in-process tests: no rate limit, short lock wait.
    pub fn for_tests(admin_password: Option<&str>) -> Self {
        Self {
            database_url: "postgres://localhost/slotbook_test".to_string(),
            admin_password: admin_password.map(|p| Zeroizing::new(p.to_string())),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            pool_size: 4,
            lock_timeout: Duration::from_millis(200),
            booking_rate_limit: None,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            public_dir: "files/public".to_string(),
        }
    }
}
