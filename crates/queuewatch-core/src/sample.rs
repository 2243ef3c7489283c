//! Sample batches and sealed sample sets
//!
//! The streaming interface delivers samples in batches of any size, empty
//! batches included. A [`SampleSet`] is built once from the batches a sampler
//! collected and has no mutating API afterwards.

use serde::{Deserialize, Serialize};

/// One numeric observation (a queue depth)
pub type Sample = u64;

/// A single delivery from the streaming interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleBatch(Vec<Sample>);

impl SampleBatch {
    /// Create a batch from values
    pub fn new(values: Vec<Sample>) -> Self {
        Self(values)
    }

    /// Create a batch holding one value
    pub fn single(value: Sample) -> Self {
        Self(vec![value])
    }

    /// Values in delivery order
    pub fn values(&self) -> &[Sample] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Sample>> for SampleBatch {
    fn from(values: Vec<Sample>) -> Self {
        Self(values)
    }
}

/// Every batch collected during one run, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSet {
    batches: Vec<SampleBatch>,
}

impl SampleSet {
    /// Seal a list of collected batches
    pub fn from_batches(batches: Vec<SampleBatch>) -> Self {
        Self { batches }
    }

    /// An empty set
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[SampleBatch] {
        &self.batches
    }

    /// Number of deliveries received
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Number of individual samples across all batches
    pub fn value_count(&self) -> usize {
        self.batches.iter().map(SampleBatch::len).sum()
    }

    /// All samples flattened in arrival order
    pub fn values(&self) -> impl Iterator<Item = Sample> + '_ {
        self.batches.iter().flat_map(|b| b.values().iter().copied())
    }

    /// Largest observed sample
    pub fn peak(&self) -> Option<Sample> {
        self.values().max()
    }

    pub fn is_empty(&self) -> bool {
        self.value_count() == 0
    }
}
