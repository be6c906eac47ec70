use std::time::{Duration, Instant};

use log::debug;

use crate::error::ShapingError;
use crate::shaping::debounce::Debouncer;
use crate::shaping::throttle::Throttle;

pub const DEFAULT_WINDOW_MS: u64 = 600;
pub const MIN_WINDOW_MS: u64 = 200;
pub const MAX_WINDOW_MS: u64 = 2000;
pub const WINDOW_STEP_MS: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShapingCounts {
    pub raw: u64,
    pub debounced: u64,
    pub throttled: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapingStats {
    pub counts: ShapingCounts,
    /// Percent of raw events the debouncer absorbed.
    pub debounce_saved: u32,
    pub throttle_saved: u32,
}

pub fn validate_window(ms: u64) -> Result<Duration, ShapingError> {
    if (MIN_WINDOW_MS..=MAX_WINDOW_MS).contains(&ms) && ms % WINDOW_STEP_MS == 0 {
        Ok(Duration::from_millis(ms))
    } else {
        Err(ShapingError::WindowOutOfRange {
            got: ms,
            min: MIN_WINDOW_MS,
            max: MAX_WINDOW_MS,
            step: WINDOW_STEP_MS,
        })
    }
}

/// Feeds one raw event stream through a debouncer and a throttle sharing
/// the same window, counting what each lets through.
///
/// Bursts are played on a simulated timeline ahead of the wall clock. The
/// lab keeps that timeline monotone: `skew` is how far it runs ahead, and
/// `cursor` is the latest instant either shaper has seen.
#[derive(Debug, Clone)]
pub struct ShapingLab {
    window: Duration,
    debouncer: Debouncer,
    throttle: Throttle,
    counts: ShapingCounts,
    skew: Duration,
    cursor: Option<Instant>,
}

impl ShapingLab {
    pub fn new(window_ms: u64) -> Result<Self, ShapingError> {
        let window = validate_window(window_ms)?;
        Ok(Self {
            window,
            debouncer: Debouncer::new(window),
            throttle: Throttle::new(window),
            counts: ShapingCounts::default(),
            skew: Duration::ZERO,
            cursor: None,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_window(&mut self, window_ms: u64) -> Result<(), ShapingError> {
        let window = validate_window(window_ms)?;
        self.window = window;
        self.debouncer.set_delay(window);
        self.throttle.set_limit(window);
        Ok(())
    }

    /// A trailing firing is still armed.
    pub fn pending(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Maps a wall-clock instant onto the lab timeline, never going back.
    fn timeline(&mut self, now: Instant) -> Instant {
        let at = match self.cursor {
            Some(cursor) => (now + self.skew).max(cursor),
            None => now + self.skew,
        };
        self.cursor = Some(at);
        at
    }

    pub fn record(&mut self, now: Instant) {
        let at = self.timeline(now);
        self.record_at(at);
    }

    pub fn poll(&mut self, now: Instant) {
        let at = self.timeline(now);
        self.poll_at(at);
    }

    fn record_at(&mut self, at: Instant) {
        self.poll_at(at);
        self.counts.raw += 1;
        if self.throttle.call(at) {
            self.counts.throttled += 1;
        }
        self.debouncer.call(at);
    }

    fn poll_at(&mut self, at: Instant) {
        if self.debouncer.poll(at) {
            self.counts.debounced += 1;
        }
    }

    /// Plays `count` events spaced `gap` apart starting at `start`, then
    /// waits out the window so a trailing debounce can land. The burst
    /// occupies lab time only; later calls continue after its end.
    pub fn feed_burst(&mut self, start: Instant, count: u32, gap: Duration) -> ShapingStats {
        let first = self.timeline(start);
        let mut at = first;
        for i in 0..count {
            at = first + gap * i;
            self.record_at(at);
        }
        let end = at + self.window;
        self.poll_at(end);
        self.skew += end.saturating_duration_since(first);
        self.cursor = Some(end);
        debug!("Burst of {} events, gap {:?}: {:?}", count, gap, self.counts);
        self.stats()
    }

    pub fn stats(&self) -> ShapingStats {
        ShapingStats {
            counts: self.counts,
            debounce_saved: saved_percent(self.counts.raw, self.counts.debounced),
            throttle_saved: saved_percent(self.counts.raw, self.counts.throttled),
        }
    }
}

fn saved_percent(raw: u64, passed: u64) -> u32 {
    if raw == 0 {
        return 0;
    }
    ((raw.saturating_sub(passed)) as f64 / raw as f64 * 100.0).round() as u32
}
