//! # Registration Pipeline
//!
//! Orchestrates one submission attempt:
//!
//! ```text
//! Idle → Validating → ApprovingFee → Registering → AttachingAppendices → Completed
//! ```
//!
//! Any non-terminal stage may end in `Aborted`. The draft checkpoint is
//! written after every stage transition, before and after every submission
//! and after every confirmed transaction, so an aborted run can be resumed
//! from where it stopped without repeating a transaction that landed. A
//! draft that already carries an entity id goes straight from `Validating`
//! to `AttachingAppendices`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::allowance_guard::AllowanceGuard;
use super::appendix_sequencer::{AppendixSequencer, SequenceEvent};
use super::guard::{CancelHandle, StageGuard};
use super::registration_executor::{PendingResolution, RegistrationExecutor};
use super::StepFailure;
use crate::algorithms::{
    plan_appendices, validate_draft, AppendixPlan, UploadSource, ValidatedRegistration,
};
use crate::config::PipelineConfig;
use crate::domain::{
    AssetDraft, DocumentMetadata, DocumentRef, EntityId, PipelineError, PipelineKind,
    PipelineResult, PipelineStage, PipelineStatus, TransactionOutcome, TxHash, TxPurpose,
};
use crate::ports::{DocumentUploader, DraftStore, LedgerClient, RegistrationPipelineApi};

/// State of one submission attempt.
struct Attempt {
    id: Uuid,
    stage: PipelineStage,
    draft: AssetDraft,
    outcomes: Vec<TransactionOutcome>,
    tx_hashes: Vec<TxHash>,
}

impl Attempt {
    fn new(draft: AssetDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: PipelineStage::Idle,
            draft,
            outcomes: Vec::new(),
            tx_hashes: Vec::new(),
        }
    }

    fn enter(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "invalid transition {} -> {}",
            self.stage,
            next
        );
        debug!(
            attempt_id = %self.id,
            "[pipeline] {} -> {}", self.stage, next
        );
        self.stage = next;
    }

    /// Record an outcome of this attempt.
    fn push(&mut self, outcome: TransactionOutcome) {
        if outcome.success {
            self.tx_hashes.push(outcome.tx_hash);
        }
        self.outcomes.push(outcome);
    }

    /// Keep the mined transaction of a failed step and return its error.
    fn absorb(&mut self, failure: StepFailure) -> PipelineError {
        if let Some(outcome) = failure.outcome {
            self.push(outcome);
        }
        failure.error
    }

    fn into_result(self, status: PipelineStatus, error: Option<PipelineError>) -> PipelineResult {
        PipelineResult {
            attempt_id: self.id,
            status,
            entity_id: self.draft.checkpoint.entity_id,
            tx_hashes: self.tx_hashes,
            outcomes: self.outcomes,
            error,
        }
    }
}

fn persist_draft(store: &dyn DraftStore, draft: &mut AssetDraft) -> Result<(), PipelineError> {
    draft.last_saved_at = Utc::now();
    store.save(draft).map_err(PipelineError::from)
}

/// Registration pipeline service.
pub struct RegistrationPipeline {
    config: PipelineConfig,
    ledger: Arc<dyn LedgerClient>,
    uploader: Arc<dyn DocumentUploader>,
    store: Arc<dyn DraftStore>,
    cancel: CancelHandle,
    guard: StageGuard,
    allowance: AllowanceGuard,
    executor: RegistrationExecutor,
    sequencer: AppendixSequencer,
}

impl RegistrationPipeline {
    /// Create a pipeline with its own cancellation handle.
    pub fn new(
        config: PipelineConfig,
        ledger: Arc<dyn LedgerClient>,
        uploader: Arc<dyn DocumentUploader>,
        store: Arc<dyn DraftStore>,
    ) -> Self {
        Self::with_cancel(config, ledger, uploader, store, CancelHandle::new())
    }

    /// Create a pipeline observing an existing cancellation handle.
    pub fn with_cancel(
        config: PipelineConfig,
        ledger: Arc<dyn LedgerClient>,
        uploader: Arc<dyn DocumentUploader>,
        store: Arc<dyn DraftStore>,
        cancel: CancelHandle,
    ) -> Self {
        let guard = StageGuard::new(config.confirmation_timeout(), &cancel);
        Self {
            allowance: AllowanceGuard::new(ledger.clone(), guard.clone()),
            executor: RegistrationExecutor::new(ledger.clone(), guard.clone()),
            sequencer: AppendixSequencer::new(ledger.clone(), uploader.clone(), guard.clone()),
            config,
            ledger,
            uploader,
            store,
            cancel,
            guard,
        }
    }

    /// Handle that cancels in-flight and future submissions.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Draft store in use.
    pub fn store(&self) -> &Arc<dyn DraftStore> {
        &self.store
    }

    fn persist(&self, attempt: &mut Attempt) -> Result<(), PipelineError> {
        persist_draft(self.store.as_ref(), &mut attempt.draft)
    }

    fn enter(&self, attempt: &mut Attempt, next: PipelineStage) -> Result<(), PipelineError> {
        attempt.enter(next);
        self.persist(attempt)
    }

    async fn run(&self, attempt: &mut Attempt) -> Result<(), PipelineError> {
        let kind = attempt.draft.kind;

        self.enter(attempt, PipelineStage::Validating)?;
        self.guard.check(PipelineStage::Validating)?;
        let (validated, plan) = validate(&attempt.draft)?;
        for skipped in &plan.skipped {
            debug!("[pipeline] Skipping {}: {:?}", skipped.key, skipped.reason);
        }

        let checkpoint = &attempt.draft.checkpoint;
        if checkpoint.entity_id.is_none()
            && (checkpoint.pending_registration_tx.is_some() || checkpoint.registration_in_flight)
        {
            let pending = checkpoint.pending_registration_tx;
            self.reconcile(attempt, &validated, pending).await?;
        }

        let entity_id = match attempt.draft.checkpoint.entity_id {
            Some(entity_id) => {
                info!(
                    "[pipeline] {} #{} already registered; resuming appendices",
                    kind, entity_id
                );
                entity_id
            }
            None => {
                self.enter(attempt, PipelineStage::ApprovingFee)?;
                self.approve_fee(attempt, kind).await?;

                self.enter(attempt, PipelineStage::Registering)?;
                self.register(attempt, &validated).await?
            }
        };

        self.enter(attempt, PipelineStage::AttachingAppendices)?;
        self.attach(attempt, entity_id, plan).await?;

        attempt.enter(PipelineStage::Completed);
        Ok(())
    }

    /// Settle a registration submitted by an earlier attempt before paying
    /// for a new one. `pending` is `None` when that submission was
    /// interrupted before the ledger returned a hash.
    async fn reconcile(
        &self,
        attempt: &mut Attempt,
        validated: &ValidatedRegistration,
        pending: Option<TxHash>,
    ) -> Result<(), PipelineError> {
        let kind = validated.kind();
        let unresolved = PipelineError::RegistrationUnparseable {
            tx_hash: pending,
            expected_event: kind.registration_event().to_string(),
        };
        if !self.config.reconcile {
            warn!("[pipeline] Pending registration found and reconciliation is disabled");
            return Err(unresolved);
        }

        let resolution = self
            .executor
            .resolve_pending(
                PipelineStage::Validating,
                kind,
                self.ledger.signer(),
                &validated.natural_key(),
                pending,
            )
            .await?;
        match resolution {
            PendingResolution::Registered(entity_id) => {
                info!("[pipeline] Adopted {} #{} from an earlier attempt", kind, entity_id);
                let checkpoint = &mut attempt.draft.checkpoint;
                checkpoint.entity_id = Some(entity_id);
                checkpoint.pending_registration_tx = None;
                checkpoint.registration_in_flight = false;
                self.persist(attempt)
            }
            PendingResolution::Reverted => {
                info!("[pipeline] Earlier registration reverted; registering again");
                attempt.draft.checkpoint.pending_registration_tx = None;
                self.persist(attempt)
            }
            PendingResolution::Absent => {
                info!("[pipeline] Interrupted registration never landed; registering again");
                attempt.draft.checkpoint.registration_in_flight = false;
                self.persist(attempt)
            }
            PendingResolution::Unresolved => Err(unresolved),
        }
    }

    async fn approve_fee(&self, attempt: &mut Attempt, kind: PipelineKind) -> Result<(), PipelineError> {
        let stage = PipelineStage::ApprovingFee;
        let quote = self
            .guard
            .bound(stage, self.ledger.fee_quote(kind))
            .await?
            .map_err(|e| PipelineError::Ledger {
                stage,
                message: e.to_string(),
            })?;

        let owner = self.ledger.signer();
        let available = self.allowance.balance_of(owner, quote.token).await?;
        if available < quote.amount {
            return Err(PipelineError::InsufficientBalance {
                required: quote.amount,
                available,
            });
        }

        match self
            .allowance
            .ensure_allowance(owner, &quote, self.config.allowance_policy(kind))
            .await
        {
            Ok(Some(outcome)) => {
                attempt.draft.checkpoint.record_tx(&outcome.tx_hash);
                attempt.push(outcome);
                self.persist(attempt)
            }
            Ok(None) => Ok(()),
            Err(failure) => Err(attempt.absorb(failure)),
        }
    }

    async fn register(
        &self,
        attempt: &mut Attempt,
        validated: &ValidatedRegistration,
    ) -> Result<EntityId, PipelineError> {
        let kind = validated.kind();
        let mut locators = BTreeMap::new();
        for upload in &validated.uploads {
            let locator = match &upload.source {
                UploadSource::Draft(DocumentRef::Uploaded { locator }) => locator.clone(),
                UploadSource::Draft(DocumentRef::Pending(doc)) => {
                    let locator = self
                        .upload(&upload.slot, &doc.bytes, &doc.metadata())
                        .await?;
                    attempt
                        .draft
                        .documents
                        .insert(upload.slot.clone(), DocumentRef::uploaded(locator.clone()));
                    self.persist(attempt)?;
                    locator
                }
                UploadSource::Generated { bytes, metadata } => {
                    self.upload(&upload.slot, bytes, metadata).await?
                }
            };
            locators.insert(upload.slot.clone(), locator);
        }

        let request = validated.finalize(&locators);
        attempt.draft.checkpoint.registration_in_flight = true;
        self.persist(attempt)?;
        let tx_hash = match self.executor.submit(&request).await {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                // a rejected submission never reached the ledger
                if matches!(error, PipelineError::RegistrationReverted { .. }) {
                    attempt.draft.checkpoint.registration_in_flight = false;
                }
                return Err(error);
            }
        };
        let checkpoint = &mut attempt.draft.checkpoint;
        checkpoint.pending_registration_tx = Some(tx_hash);
        checkpoint.registration_in_flight = false;
        self.persist(attempt)?;

        match self.executor.confirm(kind, tx_hash).await {
            Ok(outcome) => {
                let entity_id =
                    outcome
                        .emitted_id
                        .ok_or_else(|| PipelineError::RegistrationUnparseable {
                            tx_hash: Some(tx_hash),
                            expected_event: kind.registration_event().to_string(),
                        })?;
                let checkpoint = &mut attempt.draft.checkpoint;
                checkpoint.entity_id = Some(entity_id);
                checkpoint.pending_registration_tx = None;
                checkpoint.record_tx(&tx_hash);
                attempt.push(outcome);
                self.persist(attempt)?;
                Ok(entity_id)
            }
            Err(failure) => {
                if matches!(failure.error, PipelineError::RegistrationReverted { .. }) {
                    attempt.draft.checkpoint.pending_registration_tx = None;
                }
                Err(attempt.absorb(failure))
            }
        }
    }

    async fn attach(
        &self,
        attempt: &mut Attempt,
        entity_id: EntityId,
        plan: AppendixPlan,
    ) -> Result<(), PipelineError> {
        let plan = plan.without_attached(&attempt.draft.checkpoint.attached);
        if !attempt.draft.checkpoint.attached.is_empty() {
            debug!(
                "[pipeline] {} appendices already attached",
                attempt.draft.checkpoint.attached.len()
            );
        }

        let pending = attempt.draft.checkpoint.pending_attachments.clone();
        let store = self.store.as_ref();
        let draft = &mut attempt.draft;
        let report = self
            .sequencer
            .attach_all(entity_id, &plan.requests, &pending, |event| {
                let checkpoint = &mut draft.checkpoint;
                match event {
                    SequenceEvent::Uploaded { slot, locator } => {
                        draft
                            .documents
                            .insert(slot.to_string(), DocumentRef::uploaded(locator));
                    }
                    SequenceEvent::Submitting(key) => checkpoint.mark_attachment_pending(key, None),
                    SequenceEvent::Submitted { key, tx_hash } => {
                        checkpoint.mark_attachment_pending(key, Some(tx_hash))
                    }
                    SequenceEvent::Attached(outcome) => {
                        if let TxPurpose::Attachment(key) = outcome.purpose {
                            checkpoint.attached.insert(key);
                            checkpoint.settle_attachment(key);
                        }
                        checkpoint.record_tx(&outcome.tx_hash);
                    }
                    SequenceEvent::Adopted { key, tx_hash } => {
                        checkpoint.attached.insert(key);
                        checkpoint.settle_attachment(key);
                        checkpoint.record_tx(&tx_hash);
                    }
                    SequenceEvent::Released(key) => checkpoint.settle_attachment(key),
                }
                persist_draft(store, draft)
            })
            .await;

        for outcome in report.outcomes {
            attempt.push(outcome);
        }
        match report.failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn upload(
        &self,
        slot: &str,
        bytes: &[u8],
        metadata: &DocumentMetadata,
    ) -> Result<String, PipelineError> {
        let stage = PipelineStage::Registering;
        self.guard
            .bound(stage, self.uploader.upload(bytes, metadata))
            .await?
            .map_err(|e| PipelineError::UploadFailed {
                slot: slot.to_string(),
                stage,
                reason: e.to_string(),
            })
    }

    fn finish(&self, mut attempt: Attempt, outcome: Result<(), PipelineError>) -> PipelineResult {
        let kind = attempt.draft.kind;
        match outcome {
            Ok(()) => {
                if let Err(e) = self.store.clear(kind) {
                    error!("[pipeline] Completed but the {} draft could not be cleared: {}", kind, e);
                }
                info!(
                    attempt_id = %attempt.id,
                    entity_id = ?attempt.draft.checkpoint.entity_id.map(|id| id.to_string()),
                    transactions = attempt.tx_hashes.len(),
                    "[pipeline] ✅ {} completed", kind
                );
                attempt.into_result(PipelineStatus::Completed, None)
            }
            Err(error) => {
                let at = attempt.stage;
                attempt.enter(PipelineStage::Aborted);
                if let Err(e) = self.persist(&mut attempt) {
                    warn!("[pipeline] Could not persist aborted {} draft: {}", kind, e);
                }
                warn!(
                    attempt_id = %attempt.id,
                    stage = %at,
                    "[pipeline] ❌ {} aborted: {}", kind, error
                );
                let status = PipelineStatus::Aborted {
                    at,
                    reason: error.reason(),
                };
                attempt.into_result(status, Some(error))
            }
        }
    }
}

/// Validate registration fields and appendix fields together so every
/// issue is reported at once.
fn validate(draft: &AssetDraft) -> Result<(ValidatedRegistration, AppendixPlan), PipelineError> {
    match (validate_draft(draft), plan_appendices(draft)) {
        (Ok(validated), Ok(plan)) => Ok((validated, plan)),
        (validated, plan) => {
            let mut issues = match validated {
                Err(PipelineError::Validation(issues)) => issues,
                Err(other) => return Err(other),
                Ok(_) => Vec::new(),
            };
            if let Err(more) = plan {
                issues.extend(more);
            }
            Err(PipelineError::Validation(issues))
        }
    }
}

#[async_trait]
impl RegistrationPipelineApi for RegistrationPipeline {
    #[instrument(skip(self, draft), fields(kind = %draft.kind))]
    async fn submit(&self, draft: AssetDraft) -> PipelineResult {
        let mut attempt = Attempt::new(draft);
        info!(attempt_id = %attempt.id, "[pipeline] Submitting {} draft", attempt.draft.kind);
        let outcome = self.run(&mut attempt).await;
        self.finish(attempt, outcome)
    }

    async fn resume(&self, kind: PipelineKind) -> Option<PipelineResult> {
        let draft = self.store.load(kind)?;
        Some(self.submit(draft).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ContentAddressedUploader, InMemoryDraftStore, SandboxLedger};
    use crate::domain::{AbortReason, AppendixKey, DocumentKind, PendingDocument};
    use primitive_types::U256;
    use std::time::Duration;

    struct Harness {
        ledger: Arc<SandboxLedger>,
        uploader: Arc<ContentAddressedUploader>,
        store: Arc<InMemoryDraftStore>,
        pipeline: RegistrationPipeline,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(SandboxLedger::new());
        let uploader = Arc::new(ContentAddressedUploader::new());
        let store = Arc::new(InMemoryDraftStore::new());
        let pipeline = RegistrationPipeline::new(
            PipelineConfig::for_testing(),
            ledger.clone(),
            uploader.clone(),
            store.clone(),
        );
        Harness {
            ledger,
            uploader,
            store,
            pipeline,
        }
    }

    fn pdf(name: &str) -> DocumentRef {
        DocumentRef::Pending(PendingDocument::new(name, "application/pdf", name.as_bytes().to_vec()))
    }

    fn manifest_draft() -> AssetDraft {
        AssetDraft::new(PipelineKind::Manifest)
            .with_field("containerId", "MSCU1234567")
            .with_field("commodityDescription", "Green coffee beans")
            .with_field("weightMT", "18.25")
            .with_field("consignee", format!("0x{}", "ab".repeat(20)))
            .with_field("originPort", "COBUN")
            .with_field("destinationPort", "ESVLC")
    }

    fn tokenization_draft() -> AssetDraft {
        AssetDraft::new(PipelineKind::Tokenization)
            .with_field("category", "0")
            .with_field("name", "Edificio Sol")
            .with_field("location", "Madrid")
            .with_field("valuationUsd", "1500000")
            .with_field("totalSupply", "10000")
            .with_field("pricePerFraction", "150")
            .with_field("estimatedYield", "6.5")
            .with_document("legal", pdf("deed.pdf"))
    }

    #[tokio::test]
    async fn test_manifest_completes_and_clears_once() {
        let h = harness();
        let result = h.pipeline.submit(manifest_draft()).await;

        assert!(result.is_completed(), "{:?}", result.error);
        assert_eq!(result.entity_id, Some(EntityId::from(1)));
        // exact approval then registration
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.outcomes[0].purpose, TxPurpose::Approval);
        assert_eq!(result.tx_hashes.len(), 2);
        assert_eq!(h.store.clear_count(), 1);
        assert!(!h.store.exists(PipelineKind::Manifest));
        assert_eq!(h.ledger.allowance(PipelineKind::Manifest), U256::zero());
    }

    #[tokio::test]
    async fn test_tokenization_uses_unbounded_allowance() {
        let h = harness();
        let result = h.pipeline.submit(tokenization_draft()).await;
        assert!(result.is_completed(), "{:?}", result.error);
        assert_eq!(h.ledger.allowance(PipelineKind::Tokenization), U256::MAX);

        // second asset needs no approval
        let second = tokenization_draft().with_field("name", "Edificio Luna");
        let result = h.pipeline.submit(second).await;
        assert!(result.is_completed());
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(result.outcomes[0].purpose, TxPurpose::Registration);
    }

    #[tokio::test]
    async fn test_validation_failure_touches_nothing() {
        let h = harness();
        let draft = manifest_draft()
            .with_field("containerId", "")
            .with_flag("reefer")
            .with_field("reefer.temperature", "frozen");
        let result = h.pipeline.submit(draft).await;

        assert_eq!(result.abort_reason(), Some(AbortReason::ValidationError));
        let Some(PipelineError::Validation(issues)) = &result.error else {
            panic!("expected validation error");
        };
        assert_eq!(issues.len(), 2);
        assert!(h.ledger.submissions().is_empty());
        assert!(h.uploader.attempts().is_empty());
        assert!(h.store.exists(PipelineKind::Manifest));
    }

    #[tokio::test]
    async fn test_insufficient_balance_aborts_before_approval() {
        let h = harness();
        h.ledger.set_balance(U256::from(5u64));
        let result = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::InsufficientBalance));
        assert_eq!(
            result.status,
            PipelineStatus::Aborted {
                at: PipelineStage::ApprovingFee,
                reason: AbortReason::InsufficientBalance
            }
        );
        assert!(h.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_approval_aborts() {
        let h = harness();
        h.ledger.revert_approval("token paused");
        let result = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::ApprovalFailed));
        assert_eq!(result.outcomes.len(), 1);
        assert!(!result.outcomes[0].success);
        assert_eq!(h.ledger.registration_count(), 0);
    }

    #[tokio::test]
    async fn test_attachment_failure_keeps_entity_and_resumes() {
        let h = harness();
        h.ledger
            .fail_attachment(AppendixKey::Document(DocumentKind::PackingList));
        let draft = manifest_draft()
            .with_document("invoice", pdf("inv.pdf"))
            .with_document("packingList", pdf("pl.pdf"));

        let first = h.pipeline.submit(draft).await;
        assert_eq!(
            first.abort_reason(),
            Some(AbortReason::AttachmentFailed(AppendixKey::Document(
                DocumentKind::PackingList
            )))
        );
        let stored = h.store.load(PipelineKind::Manifest).unwrap();
        assert_eq!(stored.entity_id(), Some(EntityId::from(1)));
        assert!(stored
            .checkpoint
            .attached
            .contains(&AppendixKey::Document(DocumentKind::Invoice)));
        assert_eq!(
            stored.document("invoice").and_then(DocumentRef::locator).map(str::len),
            Some("ipfs://".len() + 64)
        );

        h.ledger.heal();
        let second = h.pipeline.resume(PipelineKind::Manifest).await.unwrap();
        assert!(second.is_completed(), "{:?}", second.error);
        assert_eq!(second.outcomes.len(), 1);
        assert_eq!(h.ledger.registration_count(), 1);
        assert_eq!(h.ledger.attachments(EntityId::from(1)).len(), 2);
        assert!(h.pipeline.resume(PipelineKind::Manifest).await.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_registration_is_reconciled() {
        let h = harness();
        h.ledger.drop_registration_event(true);
        let first = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(first.abort_reason(), Some(AbortReason::RegistrationUnparseable));
        assert_eq!(first.entity_id, None);
        let stored = h.store.load(PipelineKind::Manifest).unwrap();
        assert!(stored.checkpoint.pending_registration_tx.is_some());

        h.ledger.heal();
        let second = h.pipeline.resume(PipelineKind::Manifest).await.unwrap();
        assert!(second.is_completed(), "{:?}", second.error);
        assert_eq!(second.entity_id, Some(EntityId::from(1)));
        assert_eq!(h.ledger.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_reconciliation_disabled_aborts() {
        let ledger = Arc::new(SandboxLedger::new());
        let store = Arc::new(InMemoryDraftStore::new());
        let config = PipelineConfig {
            reconcile: false,
            ..PipelineConfig::for_testing()
        };
        let pipeline = RegistrationPipeline::new(
            config,
            ledger.clone(),
            Arc::new(ContentAddressedUploader::new()),
            store.clone(),
        );
        let mut draft = manifest_draft();
        draft.checkpoint.pending_registration_tx = Some([9u8; 32]);

        let result = pipeline.submit(draft).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::RegistrationUnparseable));
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_registration_is_adopted_not_repeated() {
        let h = harness();
        h.ledger.slow_submissions(Some(Duration::from_secs(10)));
        let first = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(
            first.status,
            PipelineStatus::Aborted {
                at: PipelineStage::Registering,
                reason: AbortReason::Timeout
            }
        );
        let stored = h.store.load(PipelineKind::Manifest).unwrap();
        assert!(stored.checkpoint.registration_in_flight);
        assert_eq!(stored.checkpoint.pending_registration_tx, None);

        h.ledger.heal();
        let second = h.pipeline.resume(PipelineKind::Manifest).await.unwrap();
        assert!(second.is_completed(), "{:?}", second.error);
        assert_eq!(second.entity_id, Some(EntityId::from(1)));
        assert_eq!(h.ledger.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_registration_leaves_no_marker() {
        let h = harness();
        h.ledger.reject_registration("nonce too low");
        let first = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(first.abort_reason(), Some(AbortReason::RegistrationReverted));
        let stored = h.store.load(PipelineKind::Manifest).unwrap();
        assert!(!stored.checkpoint.registration_in_flight);
        assert_eq!(stored.checkpoint.pending_registration_tx, None);
    }

    #[tokio::test]
    async fn test_in_flight_registration_with_reconciliation_disabled_aborts() {
        let ledger = Arc::new(SandboxLedger::new());
        let config = PipelineConfig {
            reconcile: false,
            ..PipelineConfig::for_testing()
        };
        let pipeline = RegistrationPipeline::new(
            config,
            ledger.clone(),
            Arc::new(ContentAddressedUploader::new()),
            Arc::new(InMemoryDraftStore::new()),
        );
        let mut draft = manifest_draft();
        draft.checkpoint.registration_in_flight = true;

        let result = pipeline.submit(draft).await;
        assert_eq!(
            result.error,
            Some(PipelineError::RegistrationUnparseable {
                tx_hash: None,
                expected_event: PipelineKind::Manifest.registration_event().to_string(),
            })
        );
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_receipt_times_out() {
        let h = harness();
        h.ledger.delay_receipts(Some(Duration::from_secs(10)));
        let result = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::Timeout));
        assert_eq!(
            result.status,
            PipelineStatus::Aborted {
                at: PipelineStage::ApprovingFee,
                reason: AbortReason::Timeout
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_pipeline_aborts() {
        let h = harness();
        h.pipeline.cancel_handle().cancel();
        let result = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::Cancelled));
        assert!(h.ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_draft_store_failure_aborts() {
        let h = harness();
        h.store.fail_saves(Some("read-only filesystem"));
        let result = h.pipeline.submit(manifest_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::DraftStore));
        assert!(h.ledger.submissions().is_empty());
    }
}
