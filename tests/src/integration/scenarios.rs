//! # End-to-End Scenarios
//!
//! Full pipeline runs against the sandbox ledger:
//!
//! 1. **Documents only**: completes with one attachment per document
//! 2. **Appendix upload failure**: aborts after registration, keeps the id
//! 3. **Registration revert**: aborts without an id, draft untouched
//! 4. **Resume**: a cached id skips fee approval and registration
//! 5. **Interrupted attachments**: a timeout, cancellation or lost receipt
//!    while attaching never leads to a second attachment on resume
//! 6. **Completion**: the stored draft is cleared exactly once

#[cfg(test)]
mod tests {
    use primitive_types::U256;
    use std::time::Duration;

    use registration_pipeline::domain::{DocumentKind, PipelineStage, TxPurpose};
    use registration_pipeline::{
        AbortReason, AppendixKey, CancelHandle, DraftStore, EntityId, FileDraftStore, PipelineError,
        PipelineKind, PipelineStatus, RegistrationPipelineApi,
    };

    use crate::integration::fixtures::{
        documented_manifest, manifest_draft, pdf, tokenization_draft, Sandbox,
    };

    fn document_keys() -> Vec<AppendixKey> {
        DocumentKind::ALL.iter().map(|kind| AppendixKey::Document(*kind)).collect()
    }

    // =========================================================================
    // SCENARIO A: DOCUMENTS ONLY
    // =========================================================================

    #[tokio::test]
    async fn test_documents_only_completes_in_canonical_order() {
        let sandbox = Sandbox::new();
        let result = sandbox.pipeline.submit(documented_manifest()).await;

        assert!(result.is_completed(), "{:?}", result.error);
        let attached: Vec<_> = result.attachment_outcomes().map(|o| o.purpose).collect();
        assert_eq!(
            attached,
            DocumentKind::ALL
                .iter()
                .map(|kind| TxPurpose::Attachment(AppendixKey::Document(*kind)))
                .collect::<Vec<_>>()
        );
        assert!(result.attachment_outcomes().all(|o| o.success));

        let id = result.entity_id.expect("registered");
        let calls = sandbox.ledger.attachments(id);
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|call| call.entity_id() == id));
    }

    #[tokio::test]
    async fn test_no_flags_submits_no_appendix_transactions() {
        let sandbox = Sandbox::new();
        let result = sandbox.pipeline.submit(documented_manifest()).await;
        assert!(result.is_completed());
        assert!(!sandbox
            .ledger
            .submissions()
            .iter()
            .any(|purpose| matches!(
                purpose,
                TxPurpose::Attachment(AppendixKey::Hazardous)
                    | TxPurpose::Attachment(AppendixKey::Reefer)
                    | TxPurpose::Attachment(AppendixKey::Oversized)
            )));
    }

    // =========================================================================
    // SCENARIO B: APPENDIX UPLOAD FAILURE
    // =========================================================================

    #[tokio::test]
    async fn test_msds_upload_failure_keeps_entity_id() {
        let sandbox = Sandbox::new();
        sandbox
            .ledger
            .set_allowance(PipelineKind::Manifest, U256::MAX);
        sandbox.uploader.fail_file("msds.pdf");
        let draft = documented_manifest()
            .with_flag("hazardous")
            .with_field("hazardous.unClass", "3")
            .with_document("msds", pdf("msds.pdf"));

        let result = sandbox.pipeline.submit(draft).await;

        assert_eq!(
            result.status,
            PipelineStatus::Aborted {
                at: PipelineStage::AttachingAppendices,
                reason: AbortReason::UploadFailed,
            }
        );
        assert!(matches!(
            &result.error,
            Some(PipelineError::UploadFailed { slot, .. }) if slot == "msds"
        ));
        // allowance sufficed: registration is the only transaction
        assert_eq!(sandbox.ledger.submissions(), vec![TxPurpose::Registration]);

        let stored = sandbox
            .store
            .load(PipelineKind::Manifest)
            .expect("draft retained");
        assert_eq!(stored.entity_id(), result.entity_id);
        assert!(stored.entity_id().is_some());
        assert!(stored.checkpoint.attached.is_empty());
    }

    // =========================================================================
    // SCENARIO C: REGISTRATION REVERT
    // =========================================================================

    #[tokio::test]
    async fn test_registration_revert_leaves_draft_unchanged() {
        let sandbox = Sandbox::new();
        sandbox.ledger.revert_registration("out of gas");
        let draft = documented_manifest();

        let result = sandbox.pipeline.submit(draft.clone()).await;

        assert_eq!(
            result.abort_reason(),
            Some(AbortReason::RegistrationReverted)
        );
        assert_eq!(result.entity_id, None);
        let stored = sandbox
            .store
            .load(PipelineKind::Manifest)
            .expect("draft retained");
        assert_eq!(stored.fields, draft.fields);
        assert_eq!(stored.flags, draft.flags);
        assert_eq!(stored.documents, draft.documents);
        assert_eq!(stored.entity_id(), None);
        assert_eq!(stored.checkpoint.pending_registration_tx, None);
        // submitted once, nothing attached
        assert_eq!(sandbox.ledger.registration_count(), 1);
        assert!(!sandbox
            .ledger
            .submissions()
            .iter()
            .any(|purpose| matches!(purpose, TxPurpose::Attachment(_))));
    }

    // =========================================================================
    // SCENARIO D: RESUME
    // =========================================================================

    #[tokio::test]
    async fn test_cached_entity_id_skips_registration() {
        let sandbox = Sandbox::new();
        sandbox
            .ledger
            .fail_attachment(AppendixKey::Document(DocumentKind::Certificate));
        let first = sandbox.pipeline.submit(documented_manifest()).await;
        assert_eq!(
            first.abort_reason(),
            Some(AbortReason::AttachmentFailed(AppendixKey::Document(
                DocumentKind::Certificate
            )))
        );
        let before = sandbox.ledger.submissions().len();

        sandbox.ledger.heal();
        let stored = sandbox.store.load(PipelineKind::Manifest).expect("draft retained");
        let resumed = sandbox.pipeline.submit(stored).await;

        assert!(resumed.is_completed(), "{:?}", resumed.error);
        assert_eq!(resumed.entity_id, first.entity_id);
        // only the certificate is left to attach
        assert_eq!(
            sandbox.ledger.submissions()[before..],
            [TxPurpose::Attachment(AppendixKey::Document(
                DocumentKind::Certificate
            ))]
        );
        assert_eq!(sandbox.ledger.registration_count(), 1);
    }

    #[tokio::test]
    async fn test_resume_without_stored_draft_is_none() {
        let sandbox = Sandbox::new();
        assert!(sandbox
            .pipeline
            .resume(PipelineKind::Tokenization)
            .await
            .is_none());
    }

    // =========================================================================
    // INTERRUPTED ATTACHMENTS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_attachment_receipt_timeout_then_resume_attaches_once() {
        let sandbox = Sandbox::new();
        sandbox
            .ledger
            .delay_attachment_receipts(Some(Duration::from_secs(10)));

        let first = sandbox.pipeline.submit(documented_manifest()).await;
        assert_eq!(
            first.status,
            PipelineStatus::Aborted {
                at: PipelineStage::AttachingAppendices,
                reason: AbortReason::Timeout,
            }
        );
        let stored = sandbox.store.load(PipelineKind::Manifest).expect("draft retained");
        assert!(stored.checkpoint.attached.is_empty());
        assert_eq!(stored.checkpoint.pending_attachments.len(), 1);
        assert!(stored.checkpoint.pending_attachments[0].tx_hash.is_some());

        sandbox.ledger.heal();
        let resumed = sandbox
            .pipeline
            .resume(PipelineKind::Manifest)
            .await
            .expect("draft retained");

        assert!(resumed.is_completed(), "{:?}", resumed.error);
        for key in document_keys() {
            assert_eq!(sandbox.ledger.attachment_count(key), 1, "{}", key);
        }
        let id = resumed.entity_id.expect("registered");
        assert_eq!(sandbox.ledger.attachments(id).len(), 3);
        assert_eq!(sandbox.ledger.registration_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_attaching_then_resume_attaches_once() {
        let sandbox = Sandbox::new();
        sandbox
            .ledger
            .delay_attachment_receipts(Some(Duration::from_secs(10)));
        let cancel = CancelHandle::new();
        let pipeline = sandbox.pipeline_with_cancel(cancel.clone());

        let (first, _) = tokio::join!(pipeline.submit(documented_manifest()), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        assert_eq!(
            first.status,
            PipelineStatus::Aborted {
                at: PipelineStage::AttachingAppendices,
                reason: AbortReason::Cancelled,
            }
        );
        assert!(first.entity_id.is_some());
        let stored = sandbox.store.load(PipelineKind::Manifest).expect("draft retained");
        assert_eq!(stored.checkpoint.pending_attachments.len(), 1);

        // cancellation is sticky; resume on a fresh pipeline
        sandbox.ledger.heal();
        let resumed = sandbox
            .pipeline_with_cancel(CancelHandle::new())
            .resume(PipelineKind::Manifest)
            .await
            .expect("draft retained");

        assert!(resumed.is_completed(), "{:?}", resumed.error);
        assert_eq!(resumed.entity_id, first.entity_id);
        for key in document_keys() {
            assert_eq!(sandbox.ledger.attachment_count(key), 1, "{}", key);
        }
    }

    #[tokio::test]
    async fn test_lost_attachment_receipt_is_adopted_from_registry() {
        let sandbox = Sandbox::new();
        sandbox.ledger.lose_attachment_receipts(true);
        let invoice = AppendixKey::Document(DocumentKind::Invoice);
        let draft = manifest_draft().with_document("invoice", pdf("invoice.pdf"));

        let first = sandbox.pipeline.submit(draft).await;
        assert_eq!(first.abort_reason(), Some(AbortReason::AttachmentFailed(invoice)));

        // receipts are still lost; the registry settles it
        let resumed = sandbox
            .pipeline
            .resume(PipelineKind::Manifest)
            .await
            .expect("draft retained");

        assert!(resumed.is_completed(), "{:?}", resumed.error);
        assert_eq!(resumed.attachment_outcomes().count(), 0);
        assert_eq!(sandbox.ledger.attachment_count(invoice), 1);
        let id = resumed.entity_id.expect("registered");
        assert_eq!(sandbox.ledger.attachments(id).len(), 1);
    }

    // =========================================================================
    // COMPLETION
    // =========================================================================

    #[tokio::test]
    async fn test_completion_clears_stored_draft_once() {
        let sandbox = Sandbox::new();
        let result = sandbox.pipeline.submit(documented_manifest()).await;
        assert!(result.is_completed());
        assert_eq!(sandbox.store.clear_count(), 1);
        assert!(!sandbox.store.exists(PipelineKind::Manifest));
    }

    #[tokio::test]
    async fn test_file_store_draft_removed_on_completion() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::with_store(FileDraftStore::new(dir.path()));
        let result = sandbox.pipeline.submit(tokenization_draft()).await;

        assert!(result.is_completed(), "{:?}", result.error);
        assert_eq!(result.entity_id, Some(EntityId::from(1)));
        assert!(!sandbox.store.path_for(PipelineKind::Tokenization).exists());
    }

    #[tokio::test]
    async fn test_file_store_survives_failed_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::with_store(FileDraftStore::new(dir.path()));
        sandbox.ledger.revert_approval("token paused");

        let result = sandbox.pipeline.submit(tokenization_draft()).await;
        assert_eq!(result.abort_reason(), Some(AbortReason::ApprovalFailed));

        // a fresh store over the same directory sees the retained draft
        let reopened = FileDraftStore::new(dir.path());
        let stored = reopened
            .load(PipelineKind::Tokenization)
            .expect("draft on disk");
        assert_eq!(stored.text("name").as_deref(), Some("Edificio Sol"));
    }
}
