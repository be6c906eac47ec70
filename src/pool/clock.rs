use std::time::Duration;

pub const DEFAULT_TICK_MS: u64 = 100;

/// Tick period and the per-tick progress formula travel together: a task of
/// `duration` time-units needs `duration / period_ms` ticks, so each tick adds
/// `100 / (duration / period_ms)` percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    period_ms: u64,
}

impl TickConfig {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms: period_ms.max(1),
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn progress_step(&self, duration: f64) -> f64 {
        100.0 / (duration / self.period_ms as f64)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_MS)
    }
}
