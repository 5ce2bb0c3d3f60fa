//! # Domain Entities
//!
//! Requests, receipts and outcomes exchanged between the pipeline and the
//! ledger.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::errors::{AbortReason, PipelineError};
use super::value_objects::{
    Address, AppendixKey, BlockRef, DocumentKind, EntityId, PipelineKind, PipelineStage, TxHash,
};

/// Fee required by a fee-gated registration. Fetched fresh for every run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    /// Fee in token base units.
    pub amount: U256,
    /// Payment token contract.
    pub token: Address,
    /// Contract that pulls the fee (allowance spender).
    pub spender: Address,
}

/// Decoded event from a transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Event name, e.g. `ManifestRegistered`.
    pub name: String,
    /// Named parameters rendered as strings.
    pub params: BTreeMap<String, String>,
}

impl LedgerEvent {
    /// Create an event with the given parameters.
    pub fn new<I, K, V>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Final status of a confirmed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Executed successfully.
    Success,
    /// Reverted on-chain.
    Reverted {
        /// Revert reason, when the ledger exposes one.
        reason: Option<String>,
    },
}

/// Confirmation record for a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Including block.
    pub block: BlockRef,
    /// Execution status.
    pub status: ReceiptStatus,
    /// Decoded events.
    pub events: Vec<LedgerEvent>,
}

impl TxReceipt {
    /// Whether the transaction executed successfully.
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Revert reason, or a generic description.
    pub fn revert_reason(&self) -> String {
        match &self.status {
            ReceiptStatus::Success => String::new(),
            ReceiptStatus::Reverted { reason } => reason
                .clone()
                .unwrap_or_else(|| "execution reverted".to_string()),
        }
    }
}

/// What a transaction was for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxPurpose {
    /// Payment token allowance approval.
    Approval,
    /// Primary registration.
    Registration,
    /// Dependent appendix attachment.
    Attachment(AppendixKey),
}

/// Result of one pipeline transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    /// What the transaction was for.
    pub purpose: TxPurpose,
    /// Whether it confirmed successfully.
    pub success: bool,
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Including block (absent if never confirmed).
    pub block: Option<BlockRef>,
    /// New entity id; only set for the primary registration.
    pub emitted_id: Option<EntityId>,
    /// Failure description.
    pub error: Option<String>,
}

impl TransactionOutcome {
    /// Outcome for a receipt, without an emitted id.
    pub fn from_receipt(purpose: TxPurpose, receipt: &TxReceipt) -> Self {
        let success = receipt.succeeded();
        Self {
            purpose,
            success,
            tx_hash: receipt.tx_hash,
            block: Some(receipt.block),
            emitted_id: None,
            error: (!success).then(|| receipt.revert_reason()),
        }
    }

    /// Attach the emitted id.
    pub fn with_emitted_id(mut self, id: EntityId) -> Self {
        self.emitted_id = Some(id);
        self
    }
}

/// Raw document content waiting for upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocument {
    /// Original file name.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
    /// File content.
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

impl PendingDocument {
    /// Create a pending document.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Metadata sent to the uploader.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
        }
    }
}

/// Document reference held by a draft.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DocumentRef {
    /// Selected locally, not yet uploaded.
    Pending(PendingDocument),
    /// Uploaded; the locator is embedded verbatim in ledger calls.
    Uploaded {
        /// Content-addressed locator.
        locator: String,
    },
}

impl DocumentRef {
    /// Reference an already uploaded document.
    pub fn uploaded(locator: impl Into<String>) -> Self {
        DocumentRef::Uploaded {
            locator: locator.into(),
        }
    }

    /// Locator if already uploaded.
    pub fn locator(&self) -> Option<&str> {
        match self {
            DocumentRef::Uploaded { locator } => Some(locator),
            DocumentRef::Pending(_) => None,
        }
    }

    /// Whether there is anything to reference.
    pub fn is_empty(&self) -> bool {
        match self {
            DocumentRef::Pending(doc) => doc.bytes.is_empty(),
            DocumentRef::Uploaded { locator } => locator.trim().is_empty(),
        }
    }
}

/// Metadata accompanying an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name.
    pub file_name: String,
    /// MIME type.
    pub content_type: String,
}

impl DocumentMetadata {
    /// JSON record generated by the pipeline itself.
    pub fn json(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/json".to_string(),
        }
    }
}

/// Arguments of the real-world-asset `tokenizeAsset` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizeAsset {
    /// Asset name.
    pub name: String,
    /// Asset category (0..=7).
    pub category: u8,
    /// Legal documentation locator.
    pub legal_uri: String,
    /// Image set locator (may be empty).
    pub images_uri: String,
    /// Number of fractions minted.
    pub total_supply: U256,
    /// Valuation in whole USD.
    pub valuation_usd: U256,
    /// Price per fraction in 18-decimal token base units.
    pub price_per_fraction: U256,
    /// Estimated yield in basis points.
    pub estimated_yield_bps: U256,
    /// Location or identifying descriptor.
    pub location: String,
}

/// Arguments of the cargo `registerManifest` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterManifest {
    /// Container number.
    pub container_id: String,
    /// Maritime, air, road, rail.
    pub transport_mode: String,
    /// Goods description.
    pub commodity_description: String,
    /// Gross weight in metric tonnes scaled by 1000.
    pub weight_milli_tonnes: U256,
    /// Vessel and voyage number (may be empty).
    pub vessel_voyage: String,
    /// Harmonized System code (may be empty).
    pub hs_code: String,
    /// Consignee account.
    pub consignee: Address,
    /// Origin port code.
    pub origin_port: String,
    /// Destination port code.
    pub destination_port: String,
    /// Manifest metadata locator.
    pub manifest_uri: String,
    /// Dangerous goods declared.
    pub is_hazardous: bool,
    /// Temperature control declared.
    pub is_reefered: bool,
    /// Out-of-gauge declared.
    pub is_oversized: bool,
}

/// Validated payload for the primary registration call.
///
/// Built once per submission attempt and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationRequest {
    /// Tokenize a real-world asset.
    TokenizeAsset(TokenizeAsset),
    /// Register a cargo manifest.
    RegisterManifest(RegisterManifest),
}

impl RegistrationRequest {
    /// Pipeline kind this request belongs to.
    pub fn kind(&self) -> PipelineKind {
        match self {
            RegistrationRequest::TokenizeAsset(_) => PipelineKind::Tokenization,
            RegistrationRequest::RegisterManifest(_) => PipelineKind::Manifest,
        }
    }

    /// Natural key used to find an existing registration on the ledger.
    pub fn natural_key(&self) -> String {
        match self {
            RegistrationRequest::TokenizeAsset(asset) => {
                format!("{}@{}", asset.name, asset.location)
            }
            RegistrationRequest::RegisterManifest(manifest) => manifest.container_id.clone(),
        }
    }
}

/// One declared appendix, ready to attach.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AppendixRequest {
    /// Dangerous goods declaration with its safety data sheet.
    Hazardous {
        /// UN hazard class, e.g. "3" or "2.1".
        un_class: String,
        /// Material safety data sheet.
        sheet: DocumentRef,
    },
    /// Temperature-controlled cargo reading.
    ReeferTemp {
        /// Set-point temperature in Celsius.
        temp_c: f64,
        /// Relative humidity percentage.
        humidity: Option<f64>,
        /// Sensor log, if provided.
        sensor: Option<DocumentRef>,
    },
    /// Out-of-gauge cargo dimensions in metres.
    Oversized {
        /// Length.
        length: f64,
        /// Width.
        width: f64,
        /// Height.
        height: f64,
        /// Special handling instructions.
        handling_notes: String,
    },
    /// Supporting commercial document.
    Document {
        /// Document kind.
        kind: DocumentKind,
        /// Document content or locator.
        doc: DocumentRef,
    },
}

impl AppendixRequest {
    /// Step identity of this request.
    pub fn key(&self) -> AppendixKey {
        match self {
            AppendixRequest::Hazardous { .. } => AppendixKey::Hazardous,
            AppendixRequest::ReeferTemp { .. } => AppendixKey::Reefer,
            AppendixRequest::Oversized { .. } => AppendixKey::Oversized,
            AppendixRequest::Document { kind, .. } => AppendixKey::Document(*kind),
        }
    }
}

/// Fully resolved attachment call submitted to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentCall {
    /// `attachHazardousAppendix(tokenId, msdsURI, unClass)`
    Hazardous {
        /// Target entity.
        entity_id: EntityId,
        /// MSDS locator.
        msds_uri: String,
        /// UN hazard class.
        un_class: String,
    },
    /// `attachReeferAppendix(tokenId, tempDataURI)`
    Reefer {
        /// Target entity.
        entity_id: EntityId,
        /// Temperature record locator.
        temp_data_uri: String,
    },
    /// `attachOOGAppendix(tokenId, dimensionsURI)`
    Oversized {
        /// Target entity.
        entity_id: EntityId,
        /// Dimensions record locator.
        dimensions_uri: String,
    },
    /// `attachCommercialInvoice` / `attachPackingList` / `attachCertificateOfOrigin`
    Document {
        /// Target entity.
        entity_id: EntityId,
        /// Document kind.
        kind: DocumentKind,
        /// Document locator.
        uri: String,
    },
}

impl AttachmentCall {
    /// Step identity of this call.
    pub fn key(&self) -> AppendixKey {
        match self {
            AttachmentCall::Hazardous { .. } => AppendixKey::Hazardous,
            AttachmentCall::Reefer { .. } => AppendixKey::Reefer,
            AttachmentCall::Oversized { .. } => AppendixKey::Oversized,
            AttachmentCall::Document { kind, .. } => AppendixKey::Document(*kind),
        }
    }

    /// Entity the call attaches to.
    pub fn entity_id(&self) -> EntityId {
        match self {
            AttachmentCall::Hazardous { entity_id, .. }
            | AttachmentCall::Reefer { entity_id, .. }
            | AttachmentCall::Oversized { entity_id, .. }
            | AttachmentCall::Document { entity_id, .. } => *entity_id,
        }
    }
}

/// Terminal status of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    /// Registration and every declared appendix succeeded.
    Completed,
    /// The run stopped early; the draft is retained.
    Aborted {
        /// Stage that was active when the run stopped.
        at: PipelineStage,
        /// Classified cause.
        reason: AbortReason,
    },
}

/// Result of `submit`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Correlation id of this attempt.
    pub attempt_id: Uuid,
    /// Terminal status.
    pub status: PipelineStatus,
    /// Entity id, when registered (now or in a previous attempt).
    pub entity_id: Option<EntityId>,
    /// Hashes of every transaction that succeeded in this attempt, in order.
    pub tx_hashes: Vec<TxHash>,
    /// Outcomes of every transaction in this attempt, in order.
    pub outcomes: Vec<TransactionOutcome>,
    /// Failure detail for aborted runs.
    pub error: Option<PipelineError>,
}

impl PipelineResult {
    /// Whether the run completed.
    pub fn is_completed(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// Abort reason, if aborted.
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self.status {
            PipelineStatus::Completed => None,
            PipelineStatus::Aborted { reason, .. } => Some(reason),
        }
    }

    /// Outcomes of appendix attachments only.
    pub fn attachment_outcomes(&self) -> impl Iterator<Item = &TransactionOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.purpose, TxPurpose::Attachment(_)))
    }
}
