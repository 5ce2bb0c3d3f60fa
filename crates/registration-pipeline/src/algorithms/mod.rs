//! # Algorithms Module
//!
//! Pure planning steps of the registration pipeline: draft validation,
//! appendix planning, allowance planning and receipt parsing.

pub mod allowance;
pub mod appendix_plan;
pub mod receipt;
pub mod units;
pub mod validation;

pub use allowance::plan_approval;
pub use appendix_plan::{
    dimensions_record, filled_document_kinds, plan_appendices, reefer_record, AppendixPlan,
    SkipReason, SkippedAppendix, MSDS_SLOT, SENSOR_SLOT,
};
pub use receipt::extract_entity_id;
pub use units::{parse_positive_integer, parse_units, percent_to_bps};
pub use validation::{
    parse_address, validate_draft, RegistrationUpload, UploadSource, ValidatedRegistration,
    IMAGES_SLOT, LEGAL_SLOT, MANIFEST_SLOT,
};
