//! Busy-lock retry logic.
//!
//! Several processes may write the same graph file. `SQLite` serializes
//! writers; a writer that outlives the busy timeout surfaces
//! `database is locked`, which is retried here with exponential backoff.

use std::time::Duration;

use kg_config::StoreConfig;

/// Configuration for retry behavior on busy or conflicting writes.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Backoff before attempt `attempt + 1`, doubling from `base_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl From<&StoreConfig> for RetryConfig {
    fn from(store: &StoreConfig) -> Self {
        Self {
            max_attempts: store.max_conflict_retries,
            base_delay: store.retry_base_delay(),
            max_delay: store.retry_max_delay(),
        }
    }
}

/// Detect lock contention errors that resolve once the other writer commits.
///
/// Constraint violations are deliberately not matched.
pub fn is_busy_error(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("SQLITE_BUSY")
}
