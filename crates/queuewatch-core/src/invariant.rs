//! Per-sample invariants and the validator
//!
//! An invariant looks at one sample at a time; there is no state carried
//! between samples. The validator walks every value of every batch and
//! reports all of the offending ones, not just the first.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::sample::{Sample, SampleSet};

/// A named predicate over a single sample
#[derive(Clone)]
pub struct Invariant {
    name: String,
    predicate: Arc<dyn Fn(Sample) -> bool + Send + Sync>,
}

impl Invariant {
    /// Create an invariant from an arbitrary predicate
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Sample) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Queue depth must stay at or below `max`
    pub fn max_depth(max: Sample) -> Self {
        Self::new(format!("queue depth <= {}", max), move |depth| depth <= max)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a sample satisfies the invariant
    pub fn holds(&self, sample: Sample) -> bool {
        (self.predicate)(sample)
    }
}

impl std::fmt::Debug for Invariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invariant").field("name", &self.name).finish()
    }
}

/// A sample that failed the invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Offending value
    pub value: Sample,
    /// Index of the batch it arrived in
    pub batch: usize,
    /// Position inside that batch
    pub position: usize,
    /// Which invariant was broken
    pub reason: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "value {} at batch {}[{}] violates {}",
            self.value, self.batch, self.position, self.reason
        )
    }
}

/// Applies an invariant to a whole sample set
#[derive(Debug, Clone)]
pub struct Validator {
    invariant: Invariant,
}

impl Validator {
    pub fn new(invariant: Invariant) -> Self {
        Self { invariant }
    }

    pub fn invariant(&self) -> &Invariant {
        &self.invariant
    }

    /// Check every sample; an empty result means the set passes
    pub fn validate(&self, samples: &SampleSet) -> Vec<Violation> {
        samples
            .batches()
            .iter()
            .enumerate()
            .flat_map(|(batch, values)| {
                values
                    .values()
                    .iter()
                    .enumerate()
                    .map(move |(position, &value)| (batch, position, value))
            })
            .filter(|&(_, _, value)| !self.invariant.holds(value))
            .map(|(batch, position, value)| Violation {
                value,
                batch,
                position,
                reason: self.invariant.name().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleBatch;

    fn set(batches: Vec<Vec<Sample>>) -> SampleSet {
        SampleSet::from_batches(batches.into_iter().map(SampleBatch::from).collect())
    }

    #[test]
    fn test_single_violation_reported() {
        let validator = Validator::new(Invariant::max_depth(1));
        let violations = validator.validate(&set(vec![vec![0, 1, 2, 0, 1]]));

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].value, 2);
        assert_eq!(violations[0].batch, 0);
        assert_eq!(violations[0].position, 2);
        assert_eq!(violations[0].reason, "queue depth <= 1");
    }

    #[test]
    fn test_clean_set_passes() {
        let validator = Validator::new(Invariant::max_depth(1));
        assert!(validator.validate(&set(vec![vec![0, 1, 1, 0]])).is_empty());
    }

    #[test]
    fn test_all_violations_reported_across_batches() {
        let validator = Validator::new(Invariant::max_depth(1));
        let violations = validator.validate(&set(vec![vec![5], vec![], vec![0, 3, 4]]));

        let found: Vec<_> = violations
            .iter()
            .map(|v| (v.value, v.batch, v.position))
            .collect();
        assert_eq!(found, vec![(5, 0, 0), (3, 2, 1), (4, 2, 2)]);
    }

    #[test]
    fn test_empty_set_passes() {
        let validator = Validator::new(Invariant::max_depth(0));
        assert!(validator.validate(&SampleSet::empty()).is_empty());
    }

    #[test]
    fn test_custom_predicate() {
        let even = Invariant::new("even", |v| v % 2 == 0);
        let violations = Validator::new(even).validate(&set(vec![vec![2, 3, 4, 7]]));
        assert_eq!(violations.iter().map(|v| v.value).collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(violations[0].to_string(), "value 3 at batch 0[1] violates even");
    }
}
