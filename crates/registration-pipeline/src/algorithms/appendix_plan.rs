//! # Appendix Planning
//!
//! Derives the ordered appendix requests from a draft's flags, fields and
//! document slots. Skipped appendices are reported with a reason.
//!
//! Field keys:
//! - `hazardous.unClass` plus the `msds` document slot
//! - `reefer.temperature`, optional `reefer.humidity` and `sensorData` slot
//! - `oversized.length`, `oversized.width`, `oversized.height`, optional
//!   `oversized.handlingNotes`
//! - document slots `invoice`, `packingList`, `certificate`

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{
    AppendixKey, AppendixRequest, AssetDraft, DocumentKind, FieldIssue, PipelineKind,
};

/// Draft slot of the material safety data sheet.
pub const MSDS_SLOT: &str = "msds";
/// Draft slot of the reefer sensor log.
pub const SENSOR_SLOT: &str = "sensorData";

/// Why a declared-or-not appendix will not be attached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Governing flag is off, or the document slot is empty.
    NotDeclared,
    /// Flag is on but required sub-fields are empty.
    Incomplete {
        /// Missing field or slot names.
        missing: Vec<String>,
    },
}

/// An appendix that will not be attempted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAppendix {
    /// Which appendix.
    pub key: AppendixKey,
    /// Why.
    pub reason: SkipReason,
}

/// Appendices to attach, in canonical order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppendixPlan {
    /// Requests in canonical order.
    pub requests: Vec<AppendixRequest>,
    /// Appendices not attempted.
    pub skipped: Vec<SkippedAppendix>,
}

impl AppendixPlan {
    /// Keys of the planned requests.
    pub fn keys(&self) -> Vec<AppendixKey> {
        self.requests.iter().map(AppendixRequest::key).collect()
    }

    /// Drop requests already attached in a previous run.
    pub fn without_attached(mut self, attached: &std::collections::BTreeSet<AppendixKey>) -> Self {
        self.requests.retain(|r| !attached.contains(&r.key()));
        self
    }
}

/// Build the appendix plan for a draft.
///
/// Malformed values in non-empty fields are reported as issues instead of
/// silently skipping the appendix. Tokenization drafts have no appendices.
pub fn plan_appendices(draft: &AssetDraft) -> Result<AppendixPlan, Vec<FieldIssue>> {
    let mut plan = AppendixPlan::default();
    if draft.kind == PipelineKind::Tokenization {
        return Ok(plan);
    }

    let mut issues = Vec::new();
    for key in AppendixKey::CANONICAL {
        if let Some(flag) = key.governing_flag() {
            if !draft.has_flag(flag) {
                plan.skipped.push(SkippedAppendix {
                    key,
                    reason: SkipReason::NotDeclared,
                });
                continue;
            }
        }

        match build_request(draft, key, &mut issues) {
            Ok(request) => plan.requests.push(request),
            Err(reason) => plan.skipped.push(SkippedAppendix { key, reason }),
        }
    }

    if issues.is_empty() {
        Ok(plan)
    } else {
        Err(issues)
    }
}

fn build_request(
    draft: &AssetDraft,
    key: AppendixKey,
    issues: &mut Vec<FieldIssue>,
) -> Result<AppendixRequest, SkipReason> {
    match key {
        AppendixKey::Hazardous => {
            let un_class = draft.text("hazardous.unClass");
            let sheet = draft.document(MSDS_SLOT).cloned();
            match (un_class, sheet) {
                (Some(un_class), Some(sheet)) => Ok(AppendixRequest::Hazardous { un_class, sheet }),
                (un_class, sheet) => {
                    let mut missing = Vec::new();
                    if un_class.is_none() {
                        missing.push("hazardous.unClass".to_string());
                    }
                    if sheet.is_none() {
                        missing.push(MSDS_SLOT.to_string());
                    }
                    Err(SkipReason::Incomplete { missing })
                }
            }
        }
        AppendixKey::Reefer => {
            let temp_c = read_number(draft, "reefer.temperature", issues, |_| true);
            let humidity = read_number(draft, "reefer.humidity", issues, |h| {
                (0.0..=100.0).contains(&h)
            });
            match temp_c {
                Some(temp_c) => Ok(AppendixRequest::ReeferTemp {
                    temp_c,
                    humidity,
                    sensor: draft.document(SENSOR_SLOT).cloned(),
                }),
                None => Err(SkipReason::Incomplete {
                    missing: vec!["reefer.temperature".to_string()],
                }),
            }
        }
        AppendixKey::Oversized => {
            let positive = |v: f64| v > 0.0;
            let length = read_number(draft, "oversized.length", issues, positive);
            let width = read_number(draft, "oversized.width", issues, positive);
            let height = read_number(draft, "oversized.height", issues, positive);
            match (length, width, height) {
                (Some(length), Some(width), Some(height)) => Ok(AppendixRequest::Oversized {
                    length,
                    width,
                    height,
                    handling_notes: draft.text("oversized.handlingNotes").unwrap_or_default(),
                }),
                _ => {
                    let missing = [
                        ("oversized.length", length),
                        ("oversized.width", width),
                        ("oversized.height", height),
                    ]
                    .into_iter()
                    .filter(|(field, value)| value.is_none() && !draft.is_filled(field))
                    .map(|(field, _)| field.to_string())
                    .collect();
                    Err(SkipReason::Incomplete { missing })
                }
            }
        }
        AppendixKey::Document(kind) => match draft.document(kind.slot()) {
            Some(doc) => Ok(AppendixRequest::Document {
                kind,
                doc: doc.clone(),
            }),
            None => Err(SkipReason::NotDeclared),
        },
    }
}

/// Read an optional numeric field. Blank is `None`; malformed or
/// out-of-range values are recorded as issues.
fn read_number(
    draft: &AssetDraft,
    field: &str,
    issues: &mut Vec<FieldIssue>,
    accept: impl Fn(f64) -> bool,
) -> Option<f64> {
    let raw = draft.text(field)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && accept(value) => Some(value),
        Ok(_) => {
            issues.push(FieldIssue::new(field, format!("out of range: {raw}")));
            None
        }
        Err(_) => {
            issues.push(FieldIssue::new(field, format!("not a number: {raw}")));
            None
        }
    }
}

/// JSON record referenced by the reefer attachment.
pub fn reefer_record(temp_c: f64, humidity: Option<f64>, sensor_uri: Option<&str>) -> Vec<u8> {
    let record = json!({
        "temperature": temp_c,
        "humidity": humidity,
        "sensorData": sensor_uri,
        "unit": "celsius",
    });
    serde_json::to_vec(&record).unwrap_or_default()
}

/// JSON record referenced by the out-of-gauge attachment.
pub fn dimensions_record(length: f64, width: f64, height: f64, handling_notes: &str) -> Vec<u8> {
    let record = json!({
        "length": length,
        "width": width,
        "height": height,
        "unit": "m",
        "handlingNotes": handling_notes,
    });
    serde_json::to_vec(&record).unwrap_or_default()
}

/// Document kinds whose slot is filled.
pub fn filled_document_kinds(draft: &AssetDraft) -> Vec<DocumentKind> {
    DocumentKind::ALL
        .into_iter()
        .filter(|kind| draft.document(kind.slot()).is_some())
        .collect()
}
