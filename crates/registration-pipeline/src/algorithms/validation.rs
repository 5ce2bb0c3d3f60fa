//! # Draft Validation
//!
//! Turns a draft into a registration template plus the documents that must
//! be uploaded before the registration call. Pure: no ledger, no uploader.

use primitive_types::U256;
use serde_json::json;
use std::collections::BTreeMap;

use super::units::{parse_positive_integer, parse_units, percent_to_bps};
use crate::domain::{
    Address, AssetDraft, DocumentMetadata, DocumentRef, FieldIssue, PipelineError, PipelineKind,
    RegisterManifest, RegistrationRequest, TokenizeAsset, MAX_ASSET_CATEGORY, TOKEN_DECIMALS,
    WEIGHT_DECIMALS,
};

/// Draft slot holding the legal documentation of a tokenized asset.
pub const LEGAL_SLOT: &str = "legal";
/// Draft slot holding the image set of a tokenized asset.
pub const IMAGES_SLOT: &str = "images";
/// Upload slot of the generated manifest metadata record.
pub const MANIFEST_SLOT: &str = "manifest";

/// Where the bytes of a registration document come from.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadSource {
    /// A document slot of the draft.
    Draft(DocumentRef),
    /// A record rendered from draft fields; never cached in the draft.
    Generated {
        /// Record content.
        bytes: Vec<u8>,
        /// Upload metadata.
        metadata: DocumentMetadata,
    },
}

/// A document the registration call references.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistrationUpload {
    /// Slot name; also the key used to finalize the request.
    pub slot: String,
    /// Content source.
    pub source: UploadSource,
}

/// Validated registration whose document locators are still unresolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedRegistration {
    template: RegistrationRequest,
    /// Documents to resolve, in upload order.
    pub uploads: Vec<RegistrationUpload>,
}

impl ValidatedRegistration {
    /// Pipeline kind.
    pub fn kind(&self) -> PipelineKind {
        self.template.kind()
    }

    /// Natural key for ledger reconciliation.
    pub fn natural_key(&self) -> String {
        self.template.natural_key()
    }

    /// Build the final request from resolved locators keyed by slot.
    /// Slots without a locator stay empty.
    pub fn finalize(&self, locators: &BTreeMap<String, String>) -> RegistrationRequest {
        let locator = |slot: &str| locators.get(slot).cloned().unwrap_or_default();
        match &self.template {
            RegistrationRequest::TokenizeAsset(asset) => {
                RegistrationRequest::TokenizeAsset(TokenizeAsset {
                    legal_uri: locator(LEGAL_SLOT),
                    images_uri: locator(IMAGES_SLOT),
                    ..asset.clone()
                })
            }
            RegistrationRequest::RegisterManifest(manifest) => {
                RegistrationRequest::RegisterManifest(RegisterManifest {
                    manifest_uri: locator(MANIFEST_SLOT),
                    ..manifest.clone()
                })
            }
        }
    }
}

/// Parse a `0x`-prefixed 20-byte hex address.
pub fn parse_address(raw: &str) -> Option<Address> {
    let raw = raw.trim();
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.len() != 40 {
        return None;
    }
    let mut out = [0u8; 20];
    hex::decode_to_slice(digits, &mut out).ok()?;
    Some(out)
}

/// Collects field issues while reading a draft.
struct FieldReader<'a> {
    draft: &'a AssetDraft,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(draft: &'a AssetDraft) -> Self {
        Self {
            draft,
            issues: Vec::new(),
        }
    }

    fn required(&mut self, field: &str) -> String {
        match self.draft.text(field) {
            Some(value) => value,
            None => {
                self.issues.push(FieldIssue::new(field, "required"));
                String::new()
            }
        }
    }

    fn optional(&self, field: &str) -> String {
        self.draft.text(field).unwrap_or_default()
    }

    fn parsed<T, F>(&mut self, field: &str, parse: F) -> T
    where
        T: Default,
        F: FnOnce(&str) -> Result<T, String>,
    {
        let Some(raw) = self.draft.text(field) else {
            self.issues.push(FieldIssue::new(field, "required"));
            return T::default();
        };
        parse(&raw).unwrap_or_else(|problem| {
            self.issues.push(FieldIssue::new(field, problem));
            T::default()
        })
    }

    fn finish<T>(self, value: T) -> Result<T, PipelineError> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(PipelineError::Validation(self.issues))
        }
    }
}

/// Validate a draft's registration fields.
///
/// All problems are reported together. Appendix fields are checked by
/// [`crate::algorithms::plan_appendices`].
pub fn validate_draft(draft: &AssetDraft) -> Result<ValidatedRegistration, PipelineError> {
    match draft.kind {
        PipelineKind::Tokenization => validate_tokenization(draft),
        PipelineKind::Manifest => validate_manifest(draft),
    }
}

fn validate_tokenization(draft: &AssetDraft) -> Result<ValidatedRegistration, PipelineError> {
    let mut reader = FieldReader::new(draft);

    let category = reader.parsed("category", |raw| {
        raw.parse::<u8>()
            .ok()
            .filter(|c| *c <= MAX_ASSET_CATEGORY)
            .ok_or_else(|| format!("must be a category code 0..={MAX_ASSET_CATEGORY}"))
    });
    let name = reader.required("name");
    let location = reader.required("location");
    let valuation_usd = reader.parsed("valuationUsd", parse_positive_integer);
    let total_supply = reader.parsed("totalSupply", parse_positive_integer);
    let price_per_fraction = reader.parsed("pricePerFraction", |raw| {
        parse_units(raw, TOKEN_DECIMALS).and_then(|v| {
            if v.is_zero() {
                Err("must be greater than zero".to_string())
            } else {
                Ok(v)
            }
        })
    });
    let estimated_yield_bps = reader.parsed("estimatedYield", percent_to_bps);

    let mut uploads = Vec::new();
    match draft.document(LEGAL_SLOT) {
        Some(doc) => uploads.push(RegistrationUpload {
            slot: LEGAL_SLOT.to_string(),
            source: UploadSource::Draft(doc.clone()),
        }),
        None => reader
            .issues
            .push(FieldIssue::new(LEGAL_SLOT, "legal documentation is required")),
    }
    if let Some(doc) = draft.document(IMAGES_SLOT) {
        uploads.push(RegistrationUpload {
            slot: IMAGES_SLOT.to_string(),
            source: UploadSource::Draft(doc.clone()),
        });
    }

    let template = RegistrationRequest::TokenizeAsset(TokenizeAsset {
        name,
        category,
        legal_uri: String::new(),
        images_uri: String::new(),
        total_supply,
        valuation_usd,
        price_per_fraction,
        estimated_yield_bps,
        location,
    });
    reader.finish(ValidatedRegistration { template, uploads })
}

fn validate_manifest(draft: &AssetDraft) -> Result<ValidatedRegistration, PipelineError> {
    let mut reader = FieldReader::new(draft);

    let container_id = reader.required("containerId");
    let transport_mode = draft
        .text("transportMode")
        .unwrap_or_else(|| "Maritime".to_string());
    let commodity_description = reader.required("commodityDescription");
    let weight_milli_tonnes: U256 = reader.parsed("weightMT", |raw| {
        parse_units(raw, WEIGHT_DECIMALS).and_then(|v| {
            if v.is_zero() {
                Err("must be greater than zero".to_string())
            } else {
                Ok(v)
            }
        })
    });
    let vessel_voyage = reader.optional("vesselVoyage");
    let hs_code = reader.optional("hsCode");
    let consignee = reader.parsed("consignee", |raw| {
        parse_address(raw)
            .map(Some)
            .ok_or_else(|| "not a 0x-prefixed 20-byte hex address".to_string())
    });
    let origin_port = reader.required("originPort");
    let destination_port = reader.required("destinationPort");

    let is_hazardous = draft.has_flag("hazardous");
    let is_reefered = draft.has_flag("reefer");
    let is_oversized = draft.has_flag("oversized");

    let metadata = json!({
        "containerId": container_id,
        "transportMode": transport_mode,
        "commodityDescription": commodity_description,
        "weightMT": draft.text("weightMT").unwrap_or_default(),
        "vesselVoyage": vessel_voyage,
        "hsCode": hs_code,
        "consignee": draft.text("consignee").unwrap_or_default(),
        "originPort": origin_port,
        "destinationPort": destination_port,
        "isHazardous": is_hazardous,
        "isReefered": is_reefered,
        "isOOG": is_oversized,
    });
    let bytes = serde_json::to_vec(&metadata).unwrap_or_default();

    let template = RegistrationRequest::RegisterManifest(RegisterManifest {
        container_id,
        transport_mode,
        commodity_description,
        weight_milli_tonnes,
        vessel_voyage,
        hs_code,
        consignee: consignee.unwrap_or_default(),
        origin_port,
        destination_port,
        manifest_uri: String::new(),
        is_hazardous,
        is_reefered,
        is_oversized,
    });
    let uploads = vec![RegistrationUpload {
        slot: MANIFEST_SLOT.to_string(),
        source: UploadSource::Generated {
            bytes,
            metadata: DocumentMetadata::json("manifest.json"),
        },
    }];
    reader.finish(ValidatedRegistration { template, uploads })
}
