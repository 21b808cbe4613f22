//! Backoff schedule for stock lookups
//!
//! A lookup gets `attempts` tries in total. The wait before each retry starts
//! at `first_delay`, doubles per retry and is capped at `MAX_STOCK_BACKOFF`.

use std::time::Duration;

use crate::config::InventoryConfig;

/// Longest wait between two stock lookup attempts
pub const MAX_STOCK_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockBackoff {
    attempts: u32,
    first_delay: Duration,
}

impl StockBackoff {
    pub fn new(attempts: u32, first_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            first_delay,
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_initial_delay_ms),
        )
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before retrying after failed attempt `attempt` (1-based);
    /// `None` once every attempt is spent
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.first_delay.saturating_mul(factor).min(MAX_STOCK_BACKOFF))
    }
}
