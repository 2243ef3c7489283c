//! Collaborator interfaces
//!
//! The harness only talks to targets through these traits. The RPC crate
//! provides the real implementations; the harness ships fakes for tests.

use async_trait::async_trait;

use crate::error::{LoadError, TransportError};
use crate::sample::SampleBatch;
use crate::target::Target;

/// Decides whether a target exposes the diagnostic streaming interface.
///
/// Probing is advisory: any failure to answer means "unsupported".
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn supports(&self, target: &Target) -> bool;
}

/// Opens subscriptions to a target's streaming diagnostic source
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Open a subscription.
    ///
    /// Must only resolve once the remote has acknowledged the subscription,
    /// so callers can start load knowing nothing will be missed.
    async fn subscribe(&self, target: &Target) -> Result<Box<dyn Subscription>, TransportError>;
}

/// A live subscription delivering sample batches
#[async_trait]
pub trait Subscription: Send {
    /// Next batch, or `None` once the transport has closed.
    ///
    /// Must be cancel safe: dropping the returned future before it resolves
    /// must not lose a batch.
    async fn next_batch(&mut self) -> Result<Option<SampleBatch>, TransportError>;

    /// Start tearing the subscription down.
    ///
    /// Batches already in flight keep being returned by
    /// [`next_batch`](Self::next_batch) until the close is confirmed.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// What a load driver achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Units of work observed
    pub produced: u64,
    /// Attempts spent against the ceiling
    pub attempts: u64,
}

/// Produces work against a target
#[async_trait]
pub trait LoadDriver: Send + Sync {
    /// Block until `requested` units were produced or `ceiling` is reached
    async fn advance(
        &self,
        target: &Target,
        requested: u64,
        ceiling: u64,
    ) -> Result<AdvanceReport, LoadError>;
}
