//! Metric sampler
//!
//! The read loop services whichever comes first, an inbound batch or the stop
//! signal, preferring the batch when both are ready. The stop flag is also
//! checked after every batch, so a stream that always has a batch ready still
//! sees stop. Stop alone does not end the loop: the subscription is closed and
//! then drained until the transport confirms closure, so a batch in flight at
//! stop time is kept.

use queuewatch_core::{SampleSet, SampleSource, StopListener, Subscription, Target, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Opens a subscription and collects everything it delivers
#[derive(Clone)]
pub struct MetricSampler {
    source: Arc<dyn SampleSource>,
    open_timeout: Duration,
    drain_timeout: Duration,
}

impl MetricSampler {
    pub fn new(source: Arc<dyn SampleSource>, open_timeout: Duration, drain_timeout: Duration) -> Self {
        Self {
            source,
            open_timeout,
            drain_timeout,
        }
    }

    /// Open the subscription, bounded by the open timeout
    pub async fn open(&self, target: &Target) -> Result<Box<dyn Subscription>, TransportError> {
        timeout(self.open_timeout, self.source.subscribe(target))
            .await
            .map_err(|_| TransportError::timeout(self.open_timeout))?
    }

    /// Subscribe, report the acknowledgment on `opened`, then collect until
    /// the subscription ends.
    ///
    /// Returning is the only way samples leave the sampler.
    pub async fn sample(
        &self,
        target: &Target,
        stop: StopListener,
        opened: oneshot::Sender<()>,
    ) -> Result<SampleSet, TransportError> {
        let subscription = self.open(target).await?;

        if opened.send(()).is_err() {
            debug!("Watchdog stopped waiting for the subscription");
        }

        collect_until_closed(subscription, stop, self.drain_timeout).await
    }

    /// How long closing may take once stop fired
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }
}

impl std::fmt::Debug for MetricSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSampler")
            .field("open_timeout", &self.open_timeout)
            .field("drain_timeout", &self.drain_timeout)
            .finish()
    }
}

/// Read batches until the stop signal fires and the subscription closes.
///
/// A subscription that ends or errors before stop is a transport failure.
/// After stop, closing is bounded by `drain_timeout`; if the remote never
/// confirms, whatever was collected is returned.
pub async fn collect_until_closed(
    mut subscription: Box<dyn Subscription>,
    mut stop: StopListener,
    drain_timeout: Duration,
) -> Result<SampleSet, TransportError> {
    let mut batches = Vec::new();

    loop {
        tokio::select! {
            biased;

            next = subscription.next_batch() => match next {
                Ok(Some(batch)) => {
                    debug!(values = ?batch.values(), "Batch received");
                    batches.push(batch);
                    if stop.is_fired() {
                        break;
                    }
                }
                Ok(None) if stop.is_fired() => {
                    debug!("Subscription closed by remote after stop");
                    return Ok(SampleSet::from_batches(batches));
                }
                Ok(None) => {
                    return Err(TransportError::ClosedBeforeStop(format!(
                        "remote closed the subscription after {} batches",
                        batches.len()
                    )));
                }
                Err(e) if stop.is_fired() => {
                    debug!(error = %e, "Subscription errored after stop");
                    return Ok(SampleSet::from_batches(batches));
                }
                Err(e) => return Err(e),
            },

            _ = stop.fired() => break,
        }
    }

    info!(batches = batches.len(), "Stop received, closing subscription");

    // One deadline covers the close request and every read after it
    let deadline = Instant::now() + drain_timeout;
    let mut confirmed = false;

    match timeout_at(deadline, subscription.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to close subscription cleanly"),
        Err(_) => debug!("Close request did not complete before the drain deadline"),
    }

    while Instant::now() < deadline {
        match timeout_at(deadline, subscription.next_batch()).await {
            Ok(Ok(Some(batch))) => {
                debug!(values = ?batch.values(), "Batch drained after stop");
                batches.push(batch);
            }
            Ok(Ok(None)) => {
                confirmed = true;
                break;
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Subscription ended with error while draining");
                confirmed = true;
                break;
            }
            Err(_) => break,
        }
    }

    if !confirmed {
        warn!(
            drain_ms = drain_timeout.as_millis() as u64,
            batches = batches.len(),
            "Subscription did not close in time, keeping collected samples"
        );
    }

    Ok(SampleSet::from_batches(batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FeedSource, ScriptedSource};
    use queuewatch_core::stop_signal;

    const DRAIN: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_collects_until_stop_then_drains() {
        let (source, feed) = FeedSource::new();
        let source = source.with_trailing(vec![vec![7]]);
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (stop, listener) = stop_signal();

        feed.push(vec![0]);
        feed.push(vec![1, 1]);

        let task = tokio::spawn(collect_until_closed(sub, listener, DRAIN));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.fire();

        let samples = task.await.unwrap().unwrap();
        let batches: Vec<_> = samples.batches().iter().map(|b| b.values().to_vec()).collect();
        assert_eq!(batches, vec![vec![0], vec![1, 1], vec![7]]);
        assert!(source.close_requested());
    }

    #[tokio::test]
    async fn test_remote_close_before_stop_is_transport_failure() {
        let (source, feed) = FeedSource::new();
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (_stop, listener) = stop_signal();

        feed.push(vec![0]);
        feed.disconnect();

        let err = collect_until_closed(sub, listener, DRAIN).await.unwrap_err();
        assert!(matches!(err, TransportError::ClosedBeforeStop(_)));
    }

    #[tokio::test]
    async fn test_double_stop_does_not_duplicate_samples() {
        let source = ScriptedSource::new().with_script("a", vec![vec![0], vec![1]]);
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (stop, listener) = stop_signal();

        assert!(stop.fire());
        assert!(!stop.fire());

        let samples = timeout(Duration::from_secs(1), collect_until_closed(sub, listener, DRAIN))
            .await
            .expect("collection should finish")
            .unwrap();
        assert_eq!(samples.values().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unresponsive_close_is_bounded() {
        let (source, feed) = FeedSource::new();
        let source = source.ignoring_close();
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (stop, listener) = stop_signal();

        feed.push(vec![1]);
        let task = tokio::spawn(collect_until_closed(sub, listener, DRAIN));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.fire();

        let samples = timeout(Duration::from_secs(2), task)
            .await
            .expect("drain timeout should end collection")
            .unwrap()
            .unwrap();
        assert_eq!(samples.values().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_open_failure_is_reported() {
        let source = Arc::new(ScriptedSource::new().unreachable("a"));
        let sampler = MetricSampler::new(source, Duration::from_secs(1), DRAIN);
        let (_stop, listener) = stop_signal();
        let (opened_tx, opened_rx) = oneshot::channel();

        let err = sampler
            .sample(&Target::new("a", "ws://fake"), listener, opened_tx)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(opened_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_slow_ack_is_bounded() {
        let (source, _feed) = FeedSource::new();
        let source = Arc::new(source.with_ack_delay(Duration::from_secs(5)));
        let sampler = MetricSampler::new(source, Duration::from_millis(50), DRAIN);

        let err = sampler.open(&Target::new("a", "ws://fake")).await.err().unwrap();
        assert_eq!(err, TransportError::Timeout { duration_ms: 50 });
    }

    #[tokio::test]
    async fn test_stop_is_seen_while_batches_keep_arriving() {
        let (source, feed) = FeedSource::new();
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (stop, listener) = stop_signal();

        for _ in 0..10_000 {
            feed.push(vec![0]);
        }
        let producer = tokio::spawn(async move {
            loop {
                for _ in 0..1000 {
                    feed.push(vec![1]);
                }
                tokio::task::yield_now().await;
            }
        });

        let task = tokio::spawn(collect_until_closed(sub, listener, DRAIN));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.fire();

        let samples = timeout(Duration::from_secs(3), task)
            .await
            .expect("stop should end collection under a busy stream")
            .unwrap()
            .unwrap();
        producer.abort();

        assert!(samples.batch_count() > 0);
        assert!(source.close_requested());
    }

    #[tokio::test]
    async fn test_batch_sent_as_stop_fires_is_kept() {
        let (source, feed) = FeedSource::new();
        let sub = source.subscribe(&Target::new("a", "ws://fake")).await.unwrap();
        let (stop, listener) = stop_signal();

        feed.push(vec![0]);
        let task = tokio::spawn(collect_until_closed(sub, listener, DRAIN));
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Nothing runs between these two on the current-thread runtime
        stop.fire();
        feed.push(vec![1]);

        let samples = task.await.unwrap().unwrap();
        assert_eq!(samples.values().collect::<Vec<_>>(), vec![0, 1]);
    }
}
