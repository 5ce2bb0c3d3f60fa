//! Shared drafts and sandbox wiring.

use std::sync::Arc;

use registration_pipeline::domain::{DocumentKind, DocumentRef, PendingDocument};
use registration_pipeline::{
    AssetDraft, CancelHandle, ContentAddressedUploader, DraftStore, InMemoryDraftStore, PipelineConfig,
    PipelineKind, RegistrationPipeline, SandboxLedger,
};

/// Pipeline wired to in-process collaborators, with handles kept for
/// fault injection and inspection.
pub struct Sandbox<S: DraftStore + 'static = InMemoryDraftStore> {
    pub ledger: Arc<SandboxLedger>,
    pub uploader: Arc<ContentAddressedUploader>,
    pub store: Arc<S>,
    pub pipeline: RegistrationPipeline,
}

impl Sandbox<InMemoryDraftStore> {
    pub fn new() -> Self {
        Self::with_store(InMemoryDraftStore::new())
    }
}

impl Default for Sandbox<InMemoryDraftStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DraftStore + 'static> Sandbox<S> {
    pub fn with_store(store: S) -> Self {
        let ledger = Arc::new(SandboxLedger::new());
        let uploader = Arc::new(ContentAddressedUploader::new());
        let store = Arc::new(store);
        let pipeline = RegistrationPipeline::new(
            PipelineConfig::for_testing(),
            ledger.clone(),
            uploader.clone(),
            store.clone(),
        );
        Self {
            ledger,
            uploader,
            store,
            pipeline,
        }
    }

    /// Another pipeline over the same ledger, uploader and store, observing
    /// `cancel`.
    pub fn pipeline_with_cancel(&self, cancel: CancelHandle) -> RegistrationPipeline {
        RegistrationPipeline::with_cancel(
            PipelineConfig::for_testing(),
            self.ledger.clone(),
            self.uploader.clone(),
            self.store.clone(),
            cancel,
        )
    }
}

/// Locally selected PDF whose content is its own name.
pub fn pdf(name: &str) -> DocumentRef {
    DocumentRef::Pending(PendingDocument::new(
        name,
        "application/pdf",
        name.as_bytes().to_vec(),
    ))
}

/// Manifest draft with every required field and no appendices.
pub fn manifest_draft() -> AssetDraft {
    AssetDraft::new(PipelineKind::Manifest)
        .with_field("containerId", "MSCU1234567")
        .with_field("commodityDescription", "Green coffee beans")
        .with_field("weightMT", "18.25")
        .with_field("consignee", format!("0x{}", "ab".repeat(20)))
        .with_field("originPort", "COBUN")
        .with_field("destinationPort", "ESVLC")
}

/// Manifest draft carrying all three supporting documents.
pub fn documented_manifest() -> AssetDraft {
    DocumentKind::ALL
        .iter()
        .fold(manifest_draft(), |draft, kind| {
            draft.with_document(kind.slot(), pdf(&format!("{}.pdf", kind.slot())))
        })
}

/// Tokenization draft with a legal document.
pub fn tokenization_draft() -> AssetDraft {
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
