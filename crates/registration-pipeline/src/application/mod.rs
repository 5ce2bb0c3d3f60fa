//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod allowance_guard;
pub mod appendix_sequencer;
pub mod guard;
pub mod pipeline;
pub mod registration_executor;
pub mod session;

pub use allowance_guard::AllowanceGuard;
pub use appendix_sequencer::{AppendixSequencer, SequenceEvent, SequenceReport};
pub use guard::{CancelHandle, StageGuard};
pub use pipeline::RegistrationPipeline;
pub use registration_executor::{PendingResolution, RegistrationExecutor};
pub use session::{AutoSaver, DraftSession};

use crate::domain::{PipelineError, TransactionOutcome};

/// A failed pipeline step, with the outcome of its transaction when the
/// transaction was mined.
#[derive(Clone, Debug, PartialEq)]
pub struct StepFailure {
    /// Classified error.
    pub error: PipelineError,
    /// Mined but unsuccessful transaction.
    pub outcome: Option<TransactionOutcome>,
}

impl StepFailure {
    /// Failure carrying the outcome of a mined transaction.
    pub fn with_outcome(error: PipelineError, outcome: TransactionOutcome) -> Self {
        Self {
            error,
            outcome: Some(outcome),
        }
    }
}

impl From<PipelineError> for StepFailure {
    fn from(error: PipelineError) -> Self {
        Self {
            error,
            outcome: None,
        }
    }
}
