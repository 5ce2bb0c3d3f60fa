//! # Outbound Ports
//!
//! Traits for external dependencies (ledger, document uploader, draft store).

use async_trait::async_trait;
use primitive_types::U256;

use crate::domain::{
    Address, AppendixKey, AssetDraft, AttachmentCall, DocumentMetadata, DraftStoreError, EntityId, FeeQuote,
    LedgerError, PipelineKind, RegistrationRequest, TxHash, TxReceipt, UploadError,
};

/// Ledger client - outbound port.
///
/// Submissions return as soon as the signer accepted the transaction;
/// confirmation is a separate [`LedgerClient::wait_for_receipt`] call.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Account that signs and pays.
    fn signer(&self) -> Address;

    /// Current registration fee for a pipeline kind.
    async fn fee_quote(&self, kind: PipelineKind) -> Result<FeeQuote, LedgerError>;

    /// Token balance of `owner`.
    async fn read_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError>;

    /// Token allowance granted by `owner` to `spender`.
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError>;

    /// Submit `approve(spender, amount)` on the token.
    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, LedgerError>;

    /// Submit the primary registration.
    async fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<TxHash, LedgerError>;

    /// Submit one appendix attachment.
    async fn submit_attachment(&self, call: &AttachmentCall) -> Result<TxHash, LedgerError>;

    /// Wait until a transaction is confirmed and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError>;

    /// Look up an entity already registered by `owner` under a natural key.
    async fn find_registration(
        &self,
        kind: PipelineKind,
        owner: Address,
        natural_key: &str,
    ) -> Result<Option<EntityId>, LedgerError>;

    /// Transaction that attached `key` to `entity_id`, if any confirmed.
    async fn find_attachment(
        &self,
        entity_id: EntityId,
        key: AppendixKey,
    ) -> Result<Option<TxHash>, LedgerError>;
}

/// Content-addressed document upload - outbound port.
#[async_trait]
pub trait DocumentUploader: Send + Sync {
    /// Upload content and return its locator.
    async fn upload(&self, bytes: &[u8], metadata: &DocumentMetadata)
        -> Result<String, UploadError>;
}

/// Durable draft staging keyed by pipeline kind - outbound port.
pub trait DraftStore: Send + Sync {
    /// Store a draft, replacing any previous draft of the same kind.
    fn save(&self, draft: &AssetDraft) -> Result<(), DraftStoreError>;

    /// Load the draft of `kind`. Absent and corrupt drafts are both `None`.
    fn load(&self, kind: PipelineKind) -> Option<AssetDraft>;

    /// Remove the draft of `kind`. Removing a missing draft is not an error.
    fn clear(&self, kind: PipelineKind) -> Result<(), DraftStoreError>;

    /// Whether a loadable draft of `kind` exists.
    fn exists(&self, kind: PipelineKind) -> bool {
        self.load(kind).is_some()
    }
}
