//! Per-target outcomes and the fan-out report
//!
//! Results are plain values built by each target's task and only judged once
//! every task has joined. Nothing here is asserted from inside a worker.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::error::{LoadError, WatchdogError};
use crate::invariant::Violation;
use crate::sample::SampleSet;
use crate::target::TargetId;

/// Whether a target exposes the diagnostic streaming interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Supported,
    Unsupported,
}

/// What happened during one target's run
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Capability probe said no; nothing was sampled or validated
    Skipped,

    /// Samples were collected and validated
    Completed {
        samples: SampleSet,
        violations: Vec<Violation>,
        /// Set when the load action fell short; samples are still validated
        #[serde(serialize_with = "serialize_optional_display")]
        load_error: Option<LoadError>,
    },

    /// The run could not collect samples
    Failed {
        #[serde(serialize_with = "serialize_display")]
        error: WatchdogError,
    },
}

/// Coarse verdict for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "PASS"),
            RunStatus::Failed => write!(f, "FAIL"),
            RunStatus::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Outcome of one target's run
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Correlation ID for logs
    pub run_id: Uuid,
    /// Target this run belongs to
    pub target: TargetId,
    /// Probe result
    pub capability: Capability,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall time spent on the run
    pub elapsed_ms: u64,
    /// What happened
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn status(&self) -> RunStatus {
        match &self.outcome {
            RunOutcome::Skipped => RunStatus::Skipped,
            RunOutcome::Completed {
                violations,
                load_error,
                ..
            } => {
                if violations.is_empty() && load_error.is_none() {
                    RunStatus::Passed
                } else {
                    RunStatus::Failed
                }
            }
            RunOutcome::Failed { .. } => RunStatus::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status() == RunStatus::Failed
    }

    /// Collected samples, absent for skipped and failed runs
    pub fn samples(&self) -> Option<&SampleSet> {
        match &self.outcome {
            RunOutcome::Completed { samples, .. } => Some(samples),
            _ => None,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match &self.outcome {
            RunOutcome::Completed { violations, .. } => violations,
            _ => &[],
        }
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.outcome {
            RunOutcome::Completed { load_error, .. } => load_error.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WatchdogError> {
        match &self.outcome {
            RunOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.target)?;
        match &self.outcome {
            RunOutcome::Skipped => write!(f, ": diagnostic interface not supported"),
            RunOutcome::Failed { error } => write!(f, ": {}", error),
            RunOutcome::Completed {
                samples,
                violations,
                load_error,
            } => {
                write!(
                    f,
                    " ({} samples in {} batches",
                    samples.value_count(),
                    samples.batch_count()
                )?;
                if let Some(peak) = samples.peak() {
                    write!(f, ", peak {}", peak)?;
                }
                write!(f, ")")?;
                if let Some(err) = load_error {
                    write!(f, "\n    load: {}", err)?;
                }
                for violation in violations {
                    write!(f, "\n    {}", violation)?;
                }
                Ok(())
            }
        }
    }
}

/// Aggregate over every target, built after all runs joined
#[derive(Debug, Default, Serialize)]
pub struct FanOutReport {
    pub results: Vec<RunResult>,
}

impl FanOutReport {
    pub fn new(results: Vec<RunResult>) -> Self {
        Self { results }
    }

    fn count(&self, status: RunStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(RunStatus::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(RunStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(RunStatus::Skipped)
    }

    /// True when no target failed
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Look up a target's result
    pub fn get(&self, target: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.target.as_str() == target)
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

impl fmt::Display for FanOutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )?;
        for result in &self.results {
            write!(f, "\n  {}", result)?;
        }
        Ok(())
    }
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

fn serialize_optional_display<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: fmt::Display,
    S: Serializer,
{
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}
