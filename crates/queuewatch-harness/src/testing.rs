//! Fakes for exercising the harness without a node
//!
//! - [`StaticProbe`] answers from an allow-list
//! - [`ScriptedSource`] replays fixed batches per target
//! - [`FeedSource`] delivers batches pushed live through a [`FeedHandle`]
//! - [`FakeLoadDriver`] sleeps, fails or hangs on request and records when
//!   each target's load started

use async_trait::async_trait;
use parking_lot::Mutex;
use queuewatch_core::{
    AdvanceReport, CapabilityProbe, LoadDriver, LoadError, SampleBatch, SampleSource, Sample,
    Subscription, Target, TransportError,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn batches(values: Vec<Vec<Sample>>) -> Vec<SampleBatch> {
    values.into_iter().map(SampleBatch::from).collect()
}

// ============ Capability Probe ============

/// Probe with a fixed answer per target key
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    supported: Option<HashSet<String>>,
}

impl StaticProbe {
    /// Every target is supported
    pub fn all() -> Self {
        Self { supported: None }
    }

    /// Only the listed targets are supported
    pub fn only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: Some(keys.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl CapabilityProbe for StaticProbe {
    async fn supports(&self, target: &Target) -> bool {
        self.supported
            .as_ref()
            .map_or(true, |keys| keys.contains(target.key()))
    }
}

// ============ Scripted Source ============

/// Replays a fixed list of batches per target, then stays open until closed
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<SampleBatch>>,
    unreachable: HashSet<String>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, key: impl Into<String>, script: Vec<Vec<Sample>>) -> Self {
        self.scripts.insert(key.into(), batches(script));
        self
    }

    /// Subscribing to this target fails with a connect error
    pub fn unreachable(mut self, key: impl Into<String>) -> Self {
        self.unreachable.insert(key.into());
        self
    }
}

#[async_trait]
impl SampleSource for ScriptedSource {
    async fn subscribe(&self, target: &Target) -> Result<Box<dyn Subscription>, TransportError> {
        if self.unreachable.contains(target.key()) {
            return Err(TransportError::Connect {
                endpoint: target.endpoint.clone(),
                reason: "connection refused".into(),
            });
        }

        let queue = self
            .scripts
            .get(target.key())
            .cloned()
            .unwrap_or_default()
            .into();
        Ok(Box::new(ScriptedSubscription {
            queue,
            closing: false,
        }))
    }
}

struct ScriptedSubscription {
    queue: VecDeque<SampleBatch>,
    closing: bool,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn next_batch(&mut self) -> Result<Option<SampleBatch>, TransportError> {
        if let Some(batch) = self.queue.pop_front() {
            return Ok(Some(batch));
        }
        if self.closing {
            return Ok(None);
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closing = true;
        Ok(())
    }
}

// ============ Feed Source ============

/// Event pushed into a [`FeedSource`] subscription
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Batch(SampleBatch),
    /// Remote closes the connection
    Disconnect,
}

/// Pushes events into the subscription of a [`FeedSource`]
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl FeedHandle {
    pub fn push(&self, values: Vec<Sample>) {
        let _ = self.tx.send(FeedEvent::Batch(SampleBatch::from(values)));
    }

    pub fn disconnect(&self) {
        let _ = self.tx.send(FeedEvent::Disconnect);
    }
}

/// Single-subscription source fed live by a [`FeedHandle`]
#[derive(Debug)]
pub struct FeedSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<FeedEvent>>>,
    trailing: Vec<SampleBatch>,
    ack_delay: Duration,
    honor_close: bool,
    acked_at: Mutex<Option<Instant>>,
    close_requested: Arc<AtomicBool>,
}

impl FeedSource {
    pub fn new() -> (Self, FeedHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx: Mutex::new(Some(rx)),
            trailing: Vec::new(),
            ack_delay: Duration::ZERO,
            honor_close: true,
            acked_at: Mutex::new(None),
            close_requested: Arc::new(AtomicBool::new(false)),
        };
        (source, FeedHandle { tx })
    }

    /// Batches the remote still sends after it was asked to close
    pub fn with_trailing(mut self, trailing: Vec<Vec<Sample>>) -> Self {
        self.trailing = batches(trailing);
        self
    }

    /// Delay before the subscription is acknowledged
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    /// Remote never confirms closure
    pub fn ignoring_close(mut self) -> Self {
        self.honor_close = false;
        self
    }

    /// When the subscription was acknowledged
    pub fn acked_at(&self) -> Option<Instant> {
        *self.acked_at.lock()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SampleSource for FeedSource {
    async fn subscribe(&self, target: &Target) -> Result<Box<dyn Subscription>, TransportError> {
        let rx = self.rx.lock().take().ok_or_else(|| TransportError::Connect {
            endpoint: target.endpoint.clone(),
            reason: "feed already subscribed".into(),
        })?;

        if !self.ack_delay.is_zero() {
            tokio::time::sleep(self.ack_delay).await;
        }
        *self.acked_at.lock() = Some(Instant::now());

        Ok(Box::new(FeedSubscription {
            rx,
            trailing: self.trailing.clone().into(),
            honor_close: self.honor_close,
            closing: false,
            close_requested: self.close_requested.clone(),
        }))
    }
}

struct FeedSubscription {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    trailing: VecDeque<SampleBatch>,
    honor_close: bool,
    closing: bool,
    close_requested: Arc<AtomicBool>,
}

#[async_trait]
impl Subscription for FeedSubscription {
    async fn next_batch(&mut self) -> Result<Option<SampleBatch>, TransportError> {
        if self.closing {
            // Anything already queued was in flight before the close
            if let Ok(event) = self.rx.try_recv() {
                return Ok(match event {
                    FeedEvent::Batch(batch) => Some(batch),
                    FeedEvent::Disconnect => None,
                });
            }
            if let Some(batch) = self.trailing.pop_front() {
                return Ok(Some(batch));
            }
            if self.honor_close {
                return Ok(None);
            }
            return std::future::pending().await;
        }

        match self.rx.recv().await {
            Some(FeedEvent::Batch(batch)) => Ok(Some(batch)),
            Some(FeedEvent::Disconnect) => Ok(None),
            // Handle dropped: the remote just goes quiet
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closing = true;
        self.close_requested.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============ Load Driver ============

/// Load driver with scripted behaviour
#[derive(Debug, Default)]
pub struct FakeLoadDriver {
    duration: Duration,
    failing: HashSet<String>,
    hang: bool,
    feed: Option<(FeedHandle, Vec<SampleBatch>)>,
    starts: Mutex<HashMap<String, Instant>>,
    calls: AtomicUsize,
}

impl FakeLoadDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time each load takes
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Load against this target falls short of its ceiling
    pub fn failing_for(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Load never returns
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Push these batches into a feed while the load runs, the last one
    /// right before returning
    pub fn feeding(mut self, handle: FeedHandle, script: Vec<Vec<Sample>>) -> Self {
        self.feed = Some((handle, batches(script)));
        self
    }

    /// When load against `key` started
    pub fn started_at(&self, key: &str) -> Option<Instant> {
        self.starts.lock().get(key).copied()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoadDriver for FakeLoadDriver {
    async fn advance(
        &self,
        target: &Target,
        requested: u64,
        ceiling: u64,
    ) -> Result<AdvanceReport, LoadError> {
        self.starts
            .lock()
            .insert(target.key().to_string(), Instant::now());
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.hang {
            std::future::pending::<()>().await;
        }

        match &self.feed {
            Some((handle, script)) => {
                let step = self.duration / (script.len() as u32 + 1);
                for batch in script {
                    tokio::time::sleep(step).await;
                    handle.push(batch.values().to_vec());
                }
            }
            None => tokio::time::sleep(self.duration).await,
        }

        if self.failing.contains(target.key()) {
            return Err(LoadError::CeilingReached {
                requested,
                produced: requested / 2,
                attempts: ceiling,
            });
        }

        Ok(AdvanceReport {
            produced: requested,
            attempts: requested.min(ceiling),
        })
    }
}
