//! # Registration Pipeline
//!
//! Fee-gated asset registration with dependent appendix transactions and
//! resumable drafts.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Turn a multi-step registration form into ledger records:
//! - real-world-asset tokenization (`tokenizeAsset` → `AssetTokenized`)
//! - cargo manifest registration (`registerManifest` → `ManifestRegistered`)
//!   followed by hazardous, reefer, out-of-gauge and document appendices
//!
//! ## Guarantees
//!
//! | Concern | Behaviour |
//! |---------|-----------|
//! | Allowance | Approval submitted only when the allowance is below the fee |
//! | Ordering | One transaction at a time, appendices in canonical order |
//! | Failure | Fail-fast; the draft is kept with its checkpoint |
//! | Resume | A cached entity id skips fee approval and registration |
//! | Ambiguity | A pending registration is reconciled before paying again |
//! | Completion | The draft is cleared exactly once, only on `Completed` |
//!
//! ## Module Structure
//!
//! ```text
//! registration-pipeline/
//! ├── domain/          # Drafts, requests, receipts, errors, invariants
//! ├── algorithms/      # Validation, appendix planning, receipt parsing
//! ├── ports/           # API trait (inbound) + ledger/uploader/store (outbound)
//! ├── adapters/        # File & memory draft stores, sandbox ledger, uploader
//! ├── application/     # Pipeline, allowance guard, executor, sequencer, session
//! └── config.rs        # PipelineConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    ContentAddressedUploader, FileDraftStore, InMemoryDraftStore, SandboxLedger,
};
pub use algorithms::{plan_appendices, validate_draft, AppendixPlan, SkipReason};
pub use application::{
    AllowanceGuard, AppendixSequencer, AutoSaver, CancelHandle, DraftSession,
    RegistrationExecutor, RegistrationPipeline,
};
pub use config::PipelineConfig;
pub use domain::{
    AbortReason, AppendixKey, AppendixRequest, AssetDraft, DocumentKind, DocumentRef, EntityId,
    PendingDocument, PipelineError, PipelineKind, PipelineResult, PipelineStage, PipelineStatus,
    TransactionOutcome,
};
pub use ports::{DocumentUploader, DraftStore, LedgerClient, RegistrationPipelineApi};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
