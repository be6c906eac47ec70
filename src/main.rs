mod app;
mod config;
mod error;
mod heap;
mod manager;
mod models;
mod pool;
mod shaping;
mod worker;

use anyhow::Context;
use clap::Parser;

use app::cli::{self, App};
use config::{Args, SimConfig};

fn main() -> anyhow::Result<()> {
    // Quiet by default so log lines don't tear the raw-mode prompt.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .try_init();

    let config = SimConfig::try_from(Args::parse()).context("invalid configuration")?;
    log::info!(
        "Starting with {} slots, {} ms tick, seed {}",
        config.concurrency.get(),
        config.clock.period_ms(),
        config.seed
    );

    let app = App::new(&config).context("invalid shaping window")?;
    cli::run_cli(app).context("terminal session failed")?;
    Ok(())
}
