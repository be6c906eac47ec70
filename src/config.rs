use clap::Parser;

use crate::error::{PoolError, ShapingError};
use crate::pool::clock::{TickConfig, DEFAULT_TICK_MS};
use crate::pool::scheduler::{Concurrency, DEFAULT_CONCURRENCY};
use crate::shaping::lab::{validate_window, DEFAULT_WINDOW_MS};

#[derive(Debug, Parser)]
#[command(version, about = "Terminal simulator for a task pool, mark-and-sweep and event shaping")]
pub struct Args {
    /// Pool slots (1-6).
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY as i64)]
    pub concurrency: i64,

    /// Clock period in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Seed for task and heap generation; random when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Debounce/throttle window in milliseconds (200-2000, step 100).
    #[arg(long, default_value_t = DEFAULT_WINDOW_MS)]
    pub window_ms: u64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Shaping(#[from] ShapingError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub concurrency: Concurrency,
    pub clock: TickConfig,
    pub seed: u64,
    pub window_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::default(),
            clock: TickConfig::default(),
            seed: 0,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl TryFrom<Args> for SimConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let concurrency = Concurrency::new(args.concurrency)?;
        validate_window(args.window_ms)?;
        Ok(Self {
            concurrency,
            clock: TickConfig::new(args.tick_ms),
            seed: args.seed.unwrap_or_else(rand::random),
            window_ms: args.window_ms,
        })
    }
}
