//! Queuewatch Core - Foundational types for queue-depth watchdog runs
//!
//! This crate provides the vocabulary shared by the transport and harness
//! layers: targets under test, sample batches, the single-fire stop signal,
//! invariants and the per-target run results.
//!
//! # Modules
//!
//! - [`target`] - Target identity and endpoint
//! - [`sample`] - Sample batches and sealed sample sets
//! - [`signal`] - Single-fire stop signal shared between tasks
//! - [`invariant`] - Per-sample predicates and the validator
//! - [`result`] - Per-target outcomes and the fan-out report
//! - [`traits`] - Collaborator interfaces (probe, sample source, load driver)
//! - [`config`] - Watchdog configuration
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```rust
//! use queuewatch_core::{Invariant, SampleBatch, SampleSet, Validator};
//!
//! let samples = SampleSet::from_batches(vec![
//!     SampleBatch::from(vec![0, 1]),
//!     SampleBatch::from(vec![2, 0, 1]),
//! ]);
//!
//! let violations = Validator::new(Invariant::max_depth(1)).validate(&samples);
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].value, 2);
//! ```

pub mod config;
pub mod error;
pub mod invariant;
pub mod result;
pub mod sample;
pub mod signal;
pub mod target;
pub mod traits;

// Re-exports for convenience
pub use config::WatchdogConfig;
pub use error::{ConfigError, LoadError, Result, TransportError, WatchdogError};
pub use invariant::{Invariant, Validator, Violation};
pub use result::{Capability, FanOutReport, RunOutcome, RunResult, RunStatus};
pub use sample::{Sample, SampleBatch, SampleSet};
pub use signal::{stop_signal, StopListener, StopSignal};
pub use target::{Target, TargetId};
pub use traits::{AdvanceReport, CapabilityProbe, LoadDriver, SampleSource, Subscription};
