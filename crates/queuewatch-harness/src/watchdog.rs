//! Watchdog orchestrator
//!
//! Ordering for one run:
//!
//! 1. spawn the sampler and wait for the subscription acknowledgment
//! 2. spawn the bridge task that turns "load finished" into the stop signal
//! 3. drive the load on the calling task
//! 4. fire "load finished" once the load returns, however it returned
//! 5. join the sampler, bounded by the drain timeout plus a margin, and hand
//!    back its samples
//!
//! The load never starts before the remote acknowledged the subscription,
//! and stop can never fire before that either, since the bridge does not
//! exist until then.

use queuewatch_core::{
    stop_signal, AdvanceReport, LoadDriver, LoadError, Result, SampleSet, SampleSource, Target,
    TransportError, WatchdogConfig, WatchdogError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

use crate::sampler::MetricSampler;

/// Slack on top of the drain timeout before a stopped sampler is abandoned
const SAMPLER_JOIN_MARGIN: Duration = Duration::from_secs(1);

/// Samples from one run plus how the load went
#[derive(Debug)]
pub struct WatchdogRun {
    pub samples: SampleSet,
    pub load: std::result::Result<AdvanceReport, LoadError>,
}

/// Coordinates the sampler with one load episode
pub struct Watchdog {
    sampler: MetricSampler,
    driver: Arc<dyn LoadDriver>,
    units_requested: u64,
    units_ceiling: u64,
    run_timeout: Duration,
}

impl Watchdog {
    pub fn new(
        sampler: MetricSampler,
        driver: Arc<dyn LoadDriver>,
        units_requested: u64,
        units_ceiling: u64,
        run_timeout: Duration,
    ) -> Self {
        Self {
            sampler,
            driver,
            units_requested,
            units_ceiling,
            run_timeout,
        }
    }

    pub fn from_config(
        source: Arc<dyn SampleSource>,
        driver: Arc<dyn LoadDriver>,
        config: &WatchdogConfig,
    ) -> Self {
        let sampler = MetricSampler::new(source, config.connect_timeout, config.drain_timeout);
        Self::new(
            sampler,
            driver,
            config.units_requested,
            config.units_ceiling,
            config.run_timeout,
        )
    }

    /// Run the load against `target` while sampling it.
    ///
    /// A load failure is returned inside [`WatchdogRun`] next to the samples;
    /// only a sampler failure makes the whole run an error.
    pub async fn run(&self, target: &Target) -> Result<WatchdogRun> {
        let (stop, stop_listener) = stop_signal();
        let (opened_tx, opened_rx) = oneshot::channel();

        let sampler = self.sampler.clone();
        let sampler_target = target.clone();
        let sampler_task = tokio::spawn(
            async move { sampler.sample(&sampler_target, stop_listener, opened_tx).await }
                .in_current_span(),
        );

        if opened_rx.await.is_err() {
            // Sampler ended without ever acknowledging
            return Err(match sampler_task.await {
                Ok(Err(e)) => WatchdogError::Transport(e),
                Ok(Ok(_)) => WatchdogError::Transport(TransportError::ClosedBeforeStop(
                    "sampler finished before the subscription was acknowledged".into(),
                )),
                Err(e) => task_failed("sampler", e),
            });
        }
        debug!("Sampler listening, starting load");

        let (load_finished, mut load_finished_listener) = stop_signal();
        let bridge = tokio::spawn(
            async move {
                load_finished_listener.fired().await;
                if stop.fire() {
                    debug!("Stop propagated to sampler");
                }
            }
            .in_current_span(),
        );

        let load = match timeout(
            self.run_timeout,
            self.driver
                .advance(target, self.units_requested, self.units_ceiling),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LoadError::Timeout {
                duration_ms: self.run_timeout.as_millis() as u64,
            }),
        };

        match &load {
            Ok(report) => info!(
                produced = report.produced,
                attempts = report.attempts,
                "Load finished"
            ),
            Err(e) => warn!(error = %e, "Load failed, validating partial samples"),
        }

        load_finished.fire();
        if let Err(e) = bridge.await {
            // The stop signal is dropped with the bridge, which also releases the sampler
            warn!(error = %e, "Stop bridge task failed");
        }

        let samples = join_sampler(
            sampler_task,
            self.sampler.drain_timeout() + SAMPLER_JOIN_MARGIN,
        )
        .await?;

        info!(
            batches = samples.batch_count(),
            values = samples.value_count(),
            peak = ?samples.peak(),
            "Sampling finished"
        );

        Ok(WatchdogRun { samples, load })
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("sampler", &self.sampler)
            .field("units_requested", &self.units_requested)
            .field("units_ceiling", &self.units_ceiling)
            .field("run_timeout", &self.run_timeout)
            .finish()
    }
}

/// Wait for a stopped sampler, abandoning it once `deadline` has passed
pub(crate) async fn join_sampler(
    mut task: JoinHandle<std::result::Result<SampleSet, TransportError>>,
    deadline: Duration,
) -> Result<SampleSet> {
    match timeout(deadline, &mut task).await {
        Ok(Ok(Ok(samples))) => Ok(samples),
        Ok(Ok(Err(e))) => Err(WatchdogError::Transport(e)),
        Ok(Err(e)) => Err(task_failed("sampler", e)),
        Err(_) => {
            task.abort();
            warn!(
                deadline_ms = deadline.as_millis() as u64,
                "Sampler did not finish after stop, abandoning it"
            );
            Err(WatchdogError::TaskFailed {
                task: "sampler",
                reason: format!("no result within {}ms of stop", deadline.as_millis()),
            })
        }
    }
}

pub(crate) fn task_failed(task: &'static str, err: JoinError) -> WatchdogError {
    let reason = if err.is_panic() {
        "panicked".to_string()
    } else {
        err.to_string()
    };
    WatchdogError::TaskFailed { task, reason }
}
