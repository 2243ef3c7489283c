//! Queuewatch Harness - concurrent watchdog sampling
//!
//! Runs one bounded sampling session per target while a load action is in
//! progress, then validates every collected sample.
//!
//! # Overview
//!
//! - **Metric sampler**: reads batches from a subscription until the remote
//!   confirms closure after stop
//! - **Watchdog**: starts the sampler, waits for the subscription to be
//!   acknowledged, drives the load, then fires the stop signal exactly once
//! - **Fan-out runner**: probes each target and runs the watchdog on every
//!   supported one concurrently, aggregating only after all have finished
//!
//! # Example
//!
//! ```rust,ignore
//! use queuewatch_harness::FanOutRunner;
//!
//! let runner = FanOutRunner::from_config(probe, source, driver, &config);
//! let report = runner.run(targets).await;
//! if !report.is_success() {
//!     eprintln!("{}", report);
//! }
//! ```

pub mod fanout;
pub mod sampler;
pub mod watchdog;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use fanout::FanOutRunner;
pub use sampler::{collect_until_closed, MetricSampler};
pub use watchdog::{Watchdog, WatchdogRun};
