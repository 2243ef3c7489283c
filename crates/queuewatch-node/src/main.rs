//! Queuewatch - engine queue-depth watchdog
//!
//! For every target this binary:
//! - probes whether the node serves the diagnostic namespace
//! - subscribes to the engine queue size stream
//! - waits for the unsafe head to advance while sampling
//! - checks every sample against the queue-depth bound
//!
//! Exits non-zero when any target fails.

mod cli;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Args, Settings};
use queuewatch_harness::FanOutRunner;
use queuewatch_rpc::{BlockAdvanceDriver, RpcCapabilityProbe, WsSampleSource};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "queuewatch={level},queuewatch_harness={level},queuewatch_rpc={level}"
        ))
    })?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::resolve(&args)?;
    let config = &settings.watchdog;

    info!(
        targets = settings.targets.len(),
        max_depth = config.max_queue_depth,
        units = config.units_requested,
        "Starting queuewatch"
    );

    let runner = FanOutRunner::from_config(
        Arc::new(RpcCapabilityProbe::from_config(config)),
        Arc::new(WsSampleSource::from_config(config)),
        Arc::new(BlockAdvanceDriver::from_config(config)),
        config,
    );

    let report = runner.run(settings.targets).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in report.failures() {
            error!(target = %failure.target, "{}", failure);
        }
        Ok(ExitCode::FAILURE)
    }
}
