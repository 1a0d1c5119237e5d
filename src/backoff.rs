//! Exponential backoff between redeploy attempts.

use std::time::Duration;

/// Doubling backoff measured in whole units: 1, 2, 4, ... capped at `max_units`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    unit: Duration,
    max_units: u32,
}

impl ExponentialBackoff {
    /// Creates a backoff of one `unit` per step, capping at `max_units` units.
    pub fn new(unit: Duration, max_units: u32) -> Self {
        Self {
            unit,
            max_units: max_units.max(1),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `min(2^(attempt-1), max)` units.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let units = (1u32 << exponent).min(self.max_units);
        self.unit.checked_mul(units).unwrap_or(Duration::MAX)
    }
}
