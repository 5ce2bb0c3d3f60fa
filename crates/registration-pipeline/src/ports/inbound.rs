//! # Inbound Ports
//!
//! API trait defining what the registration pipeline can do.

use async_trait::async_trait;

use crate::domain::{AssetDraft, PipelineKind, PipelineResult};

/// Registration pipeline API - inbound port.
#[async_trait]
pub trait RegistrationPipelineApi: Send + Sync {
    /// Run a draft through validation, fee approval, registration and
    /// appendix attachment.
    ///
    /// Never fails outright: every failure is reported as an `Aborted`
    /// result and the draft is kept in the store.
    async fn submit(&self, draft: AssetDraft) -> PipelineResult;

    /// Resubmit the stored draft of `kind`, if any.
    async fn resume(&self, kind: PipelineKind) -> Option<PipelineResult>;
}
