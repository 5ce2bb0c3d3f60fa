//! # Asset Draft
//!
//! In-progress multi-step form state plus the pipeline resume checkpoint.
//!
//! The draft is the only state the pipeline persists. Form navigation only
//! moves forward unless the user explicitly rewinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::entities::DocumentRef;
use super::value_objects::{AppendixKey, EntityId, PipelineKind, TxHash};

/// Resume record written after every pipeline stage transition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCheckpoint {
    /// Entity id once registration has been confirmed and parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Registration submitted but not yet resolved to an entity id.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex32")]
    pub pending_registration_tx: Option<TxHash>,
    /// A registration submission was started; its hash may never have come back.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub registration_in_flight: bool,
    /// Appendices already attached to `entity_id`.
    #[serde(default)]
    pub attached: BTreeSet<AppendixKey>,
    /// Attachments submitted without a known outcome.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_attachments: Vec<PendingAttachment>,
    /// Every confirmed transaction across attempts.
    #[serde(default)]
    pub tx_hashes: Vec<String>,
}

impl DraftCheckpoint {
    /// Whether a previous run left any ledger trace.
    pub fn is_empty(&self) -> bool {
        self.entity_id.is_none()
            && self.pending_registration_tx.is_none()
            && !self.registration_in_flight
            && self.attached.is_empty()
            && self.pending_attachments.is_empty()
            && self.tx_hashes.is_empty()
    }

    /// Outstanding attachment of `key`, if any.
    pub fn pending_attachment(&self, key: AppendixKey) -> Option<&PendingAttachment> {
        self.pending_attachments.iter().find(|p| p.key == key)
    }

    /// Note that an attachment of `key` is being submitted, or was submitted
    /// as `tx_hash`.
    pub fn mark_attachment_pending(&mut self, key: AppendixKey, tx_hash: Option<TxHash>) {
        match self.pending_attachments.iter_mut().find(|p| p.key == key) {
            Some(pending) => pending.tx_hash = tx_hash.or(pending.tx_hash),
            None => self.pending_attachments.push(PendingAttachment { key, tx_hash }),
        }
    }

    /// Forget the outstanding attachment of `key`.
    pub fn settle_attachment(&mut self, key: AppendixKey) {
        self.pending_attachments.retain(|p| p.key != key);
    }

    /// Record a confirmed transaction.
    pub fn record_tx(&mut self, tx_hash: &TxHash) {
        self.tx_hashes.push(format!("0x{}", hex::encode(tx_hash)));
    }
}

/// Attachment whose receipt was never observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAttachment {
    /// Appendix being attached.
    pub key: AppendixKey,
    /// Submitted transaction; absent when the submission itself was interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_hex32")]
    pub tx_hash: Option<TxHash>,
}

mod opt_hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&format!("0x{}", hex::encode(bytes))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| {
            let mut out = [0u8; 32];
            hex::decode_to_slice(s.trim_start_matches("0x"), &mut out)
                .map_err(serde::de::Error::custom)?;
            Ok(out)
        })
        .transpose()
    }
}

/// Step navigation errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// Tried to move backwards without an explicit rewind.
    #[error("Cannot move from step {from} back to {to} without a rewind")]
    Backwards {
        /// Current step
        from: u32,
        /// Requested step
        to: u32,
    },
    /// Rewind target is ahead of the current step.
    #[error("Cannot rewind from step {from} forward to {to}")]
    NotARewind {
        /// Current step
        from: u32,
        /// Requested step
        to: u32,
    },
}

/// Locally persisted, in-progress registration form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDraft {
    /// Pipeline this draft feeds.
    pub kind: PipelineKind,
    /// Current form step (1-based).
    pub step_index: u32,
    /// Field values keyed by form field name.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Boolean declarations (e.g. `hazardous`, `reefer`, `oversized`).
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Document slots (e.g. `legal`, `msds`, `invoice`).
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentRef>,
    /// Resume record.
    #[serde(default)]
    pub checkpoint: DraftCheckpoint,
    /// Last persisted at.
    pub last_saved_at: DateTime<Utc>,
}

impl AssetDraft {
    /// Fresh draft at step 1.
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            step_index: 1,
            fields: BTreeMap::new(),
            flags: BTreeSet::new(),
            documents: BTreeMap::new(),
            checkpoint: DraftCheckpoint::default(),
            last_saved_at: Utc::now(),
        }
    }

    /// Set a field value (builder style).
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Raise a flag (builder style).
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.set_flag(flag, true);
        self
    }

    /// Put a document into a slot (builder style).
    pub fn with_document(mut self, slot: impl Into<String>, doc: DocumentRef) -> Self {
        self.documents.insert(slot.into(), doc);
        self
    }

    /// Set a field value.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Raise or clear a flag.
    pub fn set_flag(&mut self, flag: impl Into<String>, on: bool) {
        let flag = flag.into();
        if on {
            self.flags.insert(flag);
        } else {
            self.flags.remove(&flag);
        }
    }

    /// Whether a flag is raised.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Field rendered as trimmed text; `None` when missing, null or blank.
    pub fn text(&self, key: &str) -> Option<String> {
        let rendered = match self.fields.get(key)? {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => other.to_string(),
        };
        (!rendered.is_empty()).then_some(rendered)
    }

    /// Whether a field holds a non-blank value.
    pub fn is_filled(&self, key: &str) -> bool {
        self.text(key).is_some()
    }

    /// Whether any significant field for this kind is filled.
    pub fn has_significant_content(&self) -> bool {
        self.kind
            .significant_fields()
            .iter()
            .any(|field| self.is_filled(field))
    }

    /// Non-empty document in a slot.
    pub fn document(&self, slot: &str) -> Option<&DocumentRef> {
        self.documents.get(slot).filter(|doc| !doc.is_empty())
    }

    /// Move forward to `step`. Staying on the current step is allowed.
    pub fn advance_to(&mut self, step: u32) -> Result<(), StepError> {
        if step < self.step_index {
            return Err(StepError::Backwards {
                from: self.step_index,
                to: step,
            });
        }
        self.step_index = step;
        Ok(())
    }

    /// Explicit user-initiated rewind.
    pub fn rewind_to(&mut self, step: u32) -> Result<(), StepError> {
        if step > self.step_index {
            return Err(StepError::NotARewind {
                from: self.step_index,
                to: step,
            });
        }
        self.step_index = step.max(1);
        Ok(())
    }

    /// Entity id cached by a previous partial run.
    pub fn entity_id(&self) -> Option<EntityId> {
        self.checkpoint.entity_id
    }
}
