//! # Domain Errors
//!
//! Error types for the registration pipeline and its outbound ports.
//!
//! Every pipeline failure maps to exactly one [`AbortReason`], which is what
//! callers match on when deciding how to resume.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::value_objects::{short_hex, AppendixKey, PipelineStage, TxHash};

/// A single rejected draft field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Field key as stored in the draft.
    pub field: String,
    /// What is wrong with it.
    pub problem: String,
}

impl FieldIssue {
    /// Create a new field issue.
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_tx(tx_hash: &Option<TxHash>) -> String {
    match tx_hash {
        Some(hash) => short_hex(hash),
        None => "not submitted".to_string(),
    }
}

/// Pipeline error taxonomy.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// Missing or malformed required field. Never reaches the ledger.
    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<FieldIssue>),

    /// Payer cannot cover the fee.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Fee amount in token base units
        required: U256,
        /// Current payer balance
        available: U256,
    },

    /// Allowance transaction reverted or was rejected by the signer.
    #[error("Approval failed ({}): {reason}", describe_tx(.tx_hash))]
    ApprovalFailed {
        /// Approval transaction, if it reached the ledger
        tx_hash: Option<TxHash>,
        /// Revert or rejection reason
        reason: String,
    },

    /// Primary registration reverted (or was never signed). No entity exists.
    #[error("Registration reverted ({}): {reason}", describe_tx(.tx_hash))]
    RegistrationReverted {
        /// Registration transaction, if it reached the ledger
        tx_hash: Option<TxHash>,
        /// Revert or rejection reason
        reason: String,
    },

    /// Registration confirmed but the creation event was not found.
    /// The entity may or may not exist.
    #[error("Registration ({}) unresolved: no {expected_event} event was found", describe_tx(.tx_hash))]
    RegistrationUnparseable {
        /// Registration transaction, if its hash is known
        tx_hash: Option<TxHash>,
        /// Event name that was expected in the receipt
        expected_event: String,
    },

    /// A specific appendix transaction failed. Earlier attachments stand.
    #[error("Attachment {step} failed ({}): {reason}", describe_tx(.tx_hash))]
    AttachmentFailed {
        /// Appendix that failed
        step: AppendixKey,
        /// Attachment transaction, if it reached the ledger
        tx_hash: Option<TxHash>,
        /// Revert or rejection reason
        reason: String,
    },

    /// Document upload failed before the dependent transaction was attempted.
    #[error("Upload of '{slot}' failed during {stage}: {reason}")]
    UploadFailed {
        /// Document slot in the draft
        slot: String,
        /// Stage that needed the document
        stage: PipelineStage,
        /// Uploader error
        reason: String,
    },

    /// A ledger await exceeded the confirmation timeout.
    #[error("Timed out after {after_ms}ms during {stage}")]
    Timeout {
        /// Stage that was waiting
        stage: PipelineStage,
        /// Configured timeout in milliseconds
        after_ms: u64,
    },

    /// The caller abandoned the run.
    #[error("Cancelled during {stage}")]
    Cancelled {
        /// Stage that was interrupted
        stage: PipelineStage,
    },

    /// Ledger read failed (transport, unknown transaction).
    #[error("Ledger unavailable during {stage}: {message}")]
    Ledger {
        /// Stage that issued the read
        stage: PipelineStage,
        /// Ledger error message
        message: String,
    },

    /// The draft checkpoint could not be written.
    #[error("Draft store error: {0}")]
    DraftStore(String),
}

impl PipelineError {
    /// Classify this error for the pipeline result status.
    pub fn reason(&self) -> AbortReason {
        match self {
            Self::Validation(_) => AbortReason::ValidationError,
            Self::InsufficientBalance { .. } => AbortReason::InsufficientBalance,
            Self::ApprovalFailed { .. } => AbortReason::ApprovalFailed,
            Self::RegistrationReverted { .. } => AbortReason::RegistrationReverted,
            Self::RegistrationUnparseable { .. } => AbortReason::RegistrationUnparseable,
            Self::AttachmentFailed { step, .. } => AbortReason::AttachmentFailed(*step),
            Self::UploadFailed { .. } => AbortReason::UploadFailed,
            Self::Timeout { .. } => AbortReason::Timeout,
            Self::Cancelled { .. } => AbortReason::Cancelled,
            Self::Ledger { .. } => AbortReason::LedgerUnavailable,
            Self::DraftStore(_) => AbortReason::DraftStore,
        }
    }

    /// Whether a blind retry of the same draft could mint a duplicate entity.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::RegistrationUnparseable { .. })
    }
}

/// Why a pipeline run ended in `Aborted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    /// Local validation rejected the draft.
    ValidationError,
    /// Balance below the quoted fee.
    InsufficientBalance,
    /// Allowance approval did not confirm.
    ApprovalFailed,
    /// Registration reverted or was rejected.
    RegistrationReverted,
    /// Registration confirmed without a parseable creation event.
    RegistrationUnparseable,
    /// The given appendix failed.
    AttachmentFailed(AppendixKey),
    /// A document upload failed.
    UploadFailed,
    /// A ledger await timed out.
    Timeout,
    /// The caller cancelled.
    Cancelled,
    /// The ledger could not be read.
    LedgerUnavailable,
    /// The draft could not be persisted.
    DraftStore,
}

/// Ledger client errors (outbound port).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The signer declined the transaction.
    #[error("Rejected by signer: {0}")]
    Rejected(String),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// No such transaction is known to the ledger.
    #[error("Unknown transaction: {}", short_hex(.0))]
    UnknownTransaction(TxHash),

    /// Operation not supported by this ledger.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Document uploader errors (outbound port).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Nothing to upload.
    #[error("Empty document")]
    EmptyContent,

    /// The upload service refused the content.
    #[error("Upload rejected: {0}")]
    Rejected(String),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),
}

/// Draft persistence errors (outbound port).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DraftStoreError {
    /// Filesystem failure.
    #[error("IO error: {message}")]
    Io {
        /// Underlying error message
        message: String,
    },

    /// The draft could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<DraftStoreError> for PipelineError {
    fn from(err: DraftStoreError) -> Self {
        PipelineError::DraftStore(err.to_string())
    }
}
