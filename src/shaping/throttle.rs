use std::time::{Duration, Instant};

/// Leading throttle: the first call fires, later calls are dropped until
/// `limit` has elapsed since the last firing.
#[derive(Debug, Clone)]
pub struct Throttle {
    limit: Duration,
    last_fired: Option<Instant>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last_fired: None,
        }
    }

    pub fn set_limit(&mut self, limit: Duration) {
        self.limit = limit;
    }

    pub fn call(&mut self, now: Instant) -> bool {
        let open = match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.limit,
        };
        if open {
            self.last_fired = Some(now);
        }
        open
    }
}
