//! Per-target fan-out
//!
//! Every target gets its own task running probe, watchdog and validation.
//! Tasks only return values; the report is assembled after all of them have
//! joined, so one target's failure never hides or interrupts another's.

use chrono::Utc;
use futures::future::join_all;
use queuewatch_core::{
    Capability, CapabilityProbe, FanOutReport, Invariant, LoadDriver, RunOutcome, RunResult,
    SampleSource, Target, Validator, WatchdogConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::watchdog::{task_failed, Watchdog};

/// Runs the watchdog pipeline on many targets at once
#[derive(Clone)]
pub struct FanOutRunner {
    probe: Arc<dyn CapabilityProbe>,
    watchdog: Arc<Watchdog>,
    validator: Validator,
    probe_timeout: Duration,
}

impl FanOutRunner {
    pub fn new(
        probe: Arc<dyn CapabilityProbe>,
        watchdog: Watchdog,
        validator: Validator,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            watchdog: Arc::new(watchdog),
            validator,
            probe_timeout,
        }
    }

    /// Wire up a runner with the queue-depth invariant from `config`
    pub fn from_config(
        probe: Arc<dyn CapabilityProbe>,
        source: Arc<dyn SampleSource>,
        driver: Arc<dyn LoadDriver>,
        config: &WatchdogConfig,
    ) -> Self {
        Self::new(
            probe,
            Watchdog::from_config(source, driver, config),
            Validator::new(Invariant::max_depth(config.max_queue_depth)),
            config.probe_timeout,
        )
    }

    /// Run every target concurrently and report once all have finished
    pub async fn run(&self, targets: Vec<Target>) -> FanOutReport {
        info!(targets = targets.len(), "Starting watchdog fan-out");

        let (ids, handles): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .map(|target| {
                let runner = self.clone();
                let id = target.id.clone();
                (id, tokio::spawn(async move { runner.run_target(target).await }))
            })
            .unzip();

        let results = ids
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(id, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!(target = %id, error = %e, "Target task failed");
                    RunResult {
                        run_id: Uuid::new_v4(),
                        target: id,
                        capability: Capability::Supported,
                        started_at: Utc::now(),
                        elapsed_ms: 0,
                        outcome: RunOutcome::Failed {
                            error: task_failed("target", e),
                        },
                    }
                }
            })
            .collect();

        let report = FanOutReport::new(results);
        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Watchdog fan-out finished"
        );
        report
    }

    /// Probe, sample and validate a single target
    pub async fn run_target(&self, target: Target) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("watchdog", target = %target.id, %run_id);

        async move {
            let started_at = Utc::now();
            let clock = Instant::now();

            let supported = match timeout(self.probe_timeout, self.probe.supports(&target)).await {
                Ok(supported) => supported,
                Err(_) => {
                    warn!("Capability probe timed out, treating as unsupported");
                    false
                }
            };

            let (capability, outcome) = if supported {
                info!(endpoint = %target.endpoint, "Diagnostic interface supported, running watchdog");
                (Capability::Supported, self.watch(&target).await)
            } else {
                info!("Diagnostic interface not supported, skipping");
                (Capability::Unsupported, RunOutcome::Skipped)
            };

            RunResult {
                run_id,
                target: target.id,
                capability,
                started_at,
                elapsed_ms: clock.elapsed().as_millis() as u64,
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    async fn watch(&self, target: &Target) -> RunOutcome {
        let run = match self.watchdog.run(target).await {
            Ok(run) => run,
            Err(error) => {
                error!(%error, "Watchdog run failed");
                return RunOutcome::Failed { error };
            }
        };

        let violations = self.validator.validate(&run.samples);
        if violations.is_empty() {
            info!(invariant = %self.validator.invariant().name(), "All samples hold");
        } else {
            for violation in &violations {
                warn!(
                    value = violation.value,
                    batch = violation.batch,
                    position = violation.position,
                    "Invariant violated: {}",
                    violation.reason
                );
            }
        }

        RunOutcome::Completed {
            samples: run.samples,
            violations,
            load_error: run.load.err(),
        }
    }
}

impl std::fmt::Debug for FanOutRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutRunner")
            .field("watchdog", &self.watchdog)
            .field("validator", &self.validator)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}
