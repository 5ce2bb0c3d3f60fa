//! # Domain Value Objects
//!
//! Immutable value types for the registration pipeline.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account or contract address (20-byte).
pub type Address = [u8; 20];

/// Transaction hash (32-byte).
pub type TxHash = [u8; 32];

/// Render the first bytes of a hash for log lines.
pub fn short_hex(bytes: &[u8]) -> String {
    let head = &bytes[..bytes.len().min(4)];
    format!("0x{}...", hex::encode(head))
}

/// Which registration flow a draft belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Real-world-asset tokenization (fractional asset tokens).
    Tokenization,
    /// Cargo-manifest NFT registration.
    Manifest,
}

impl PipelineKind {
    /// All kinds.
    pub const ALL: [PipelineKind; 2] = [PipelineKind::Tokenization, PipelineKind::Manifest];

    /// Stable key used by draft stores.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Tokenization => "tokenization",
            PipelineKind::Manifest => "manifest",
        }
    }

    /// Event emitted by the ledger when the primary record is created.
    pub fn registration_event(&self) -> &'static str {
        match self {
            PipelineKind::Tokenization => "AssetTokenized",
            PipelineKind::Manifest => "ManifestRegistered",
        }
    }

    /// Event parameter carrying the new entity identifier.
    pub fn id_param(&self) -> &'static str {
        match self {
            PipelineKind::Tokenization => "assetId",
            PipelineKind::Manifest => "tokenId",
        }
    }

    /// Fields whose presence makes a draft worth auto-saving.
    pub fn significant_fields(&self) -> &'static [&'static str] {
        match self {
            PipelineKind::Tokenization => &["name", "location", "valuationUsd"],
            PipelineKind::Manifest => &["containerId", "commodityDescription", "consignee"],
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokenization" | "rwa" => Ok(PipelineKind::Tokenization),
            "manifest" | "cargo" => Ok(PipelineKind::Manifest),
            other => Err(format!("unknown pipeline kind: {other}")),
        }
    }
}

/// How much allowance to grant when the current one is insufficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowancePolicy {
    /// Approve exactly the required fee.
    Exact,
    /// Approve `U256::MAX` so later fee-gated actions need no approval.
    Unbounded,
}

impl AllowancePolicy {
    /// Amount to pass to the token's `approve`.
    pub fn approval_amount(&self, required: U256) -> U256 {
        match self {
            AllowancePolicy::Exact => required,
            AllowancePolicy::Unbounded => U256::MAX,
        }
    }
}

impl FromStr for AllowancePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(AllowancePolicy::Exact),
            "unbounded" | "max" => Ok(AllowancePolicy::Unbounded),
            other => Err(format!("unknown allowance policy: {other}")),
        }
    }
}

/// Pipeline state machine.
///
/// ```text
/// Idle → Validating → ApprovingFee → Registering → AttachingAppendices → Completed
///   └──────────┴────────────┴─────────────┴──────────────┴──→ Aborted
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Nothing started.
    #[default]
    Idle,
    /// Required-field check, no chain interaction.
    Validating,
    /// Fee quote, balance check and allowance approval.
    ApprovingFee,
    /// Primary registration transaction.
    Registering,
    /// Dependent appendix transactions.
    AttachingAppendices,
    /// Every step succeeded; draft cleared.
    Completed,
    /// Run ended early; draft retained.
    Aborted,
}

impl PipelineStage {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        if next == Self::Aborted {
            return !self.is_terminal();
        }
        match (self, next) {
            (Self::Idle, Self::Validating) => true,
            (Self::Validating, Self::ApprovingFee) => true,
            // Resume with a cached entity id
            (Self::Validating, Self::AttachingAppendices) => true,
            (Self::ApprovingFee, Self::Registering) => true,
            (Self::Registering, Self::AttachingAppendices) => true,
            (Self::AttachingAppendices, Self::Completed) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::ApprovingFee => "ApprovingFee",
            Self::Registering => "Registering",
            Self::AttachingAppendices => "AttachingAppendices",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Supporting commercial document kinds, in canonical attachment order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    /// Commercial invoice.
    Invoice,
    /// Packing list.
    PackingList,
    /// Certificate of origin.
    Certificate,
}

impl DocumentKind {
    /// Canonical order.
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Invoice,
        DocumentKind::PackingList,
        DocumentKind::Certificate,
    ];

    /// Draft document slot holding this kind.
    pub fn slot(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::PackingList => "packingList",
            DocumentKind::Certificate => "certificate",
        }
    }
}

/// Identity of one appendix step.
///
/// The derived ordering is the canonical attachment order:
/// hazardous → reefer → oversized → invoice → packing list → certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppendixKey {
    /// Dangerous-goods declaration.
    Hazardous,
    /// Temperature-controlled cargo.
    Reefer,
    /// Out-of-gauge cargo.
    Oversized,
    /// Supporting document.
    Document(DocumentKind),
}

impl AppendixKey {
    /// Every appendix step in canonical order.
    pub const CANONICAL: [AppendixKey; 6] = [
        AppendixKey::Hazardous,
        AppendixKey::Reefer,
        AppendixKey::Oversized,
        AppendixKey::Document(DocumentKind::Invoice),
        AppendixKey::Document(DocumentKind::PackingList),
        AppendixKey::Document(DocumentKind::Certificate),
    ];

    /// Draft flag that declares this appendix, if any.
    pub fn governing_flag(&self) -> Option<&'static str> {
        match self {
            AppendixKey::Hazardous => Some("hazardous"),
            AppendixKey::Reefer => Some("reefer"),
            AppendixKey::Oversized => Some("oversized"),
            AppendixKey::Document(_) => None,
        }
    }
}

impl fmt::Display for AppendixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendixKey::Hazardous => f.write_str("hazardous"),
            AppendixKey::Reefer => f.write_str("reefer"),
            AppendixKey::Oversized => f.write_str("oversized"),
            AppendixKey::Document(kind) => write!(f, "document:{}", kind.slot()),
        }
    }
}

/// Identifier assigned by the ledger to a newly registered entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub U256);

impl EntityId {
    /// Parse a decimal or `0x`-prefixed hex identifier from an event parameter.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let value = match raw.strip_prefix("0x") {
            Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok()?,
            None => U256::from_dec_str(raw).ok()?,
        };
        Some(EntityId(value))
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId(U256::from(value))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block in which a transaction was confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: [u8; 32],
}
