//! # Receipt Parsing
//!
//! Locates the registration event in a confirmed receipt.

use crate::domain::{EntityId, PipelineKind, TxReceipt};

/// Extract the new entity id from a registration receipt.
///
/// Returns `None` when the receipt has no matching event or the id parameter
/// does not parse. Callers treat that as an ambiguous outcome, never as a
/// revert.
pub fn extract_entity_id(kind: PipelineKind, receipt: &TxReceipt) -> Option<EntityId> {
    receipt
        .events
        .iter()
        .filter(|event| event.name == kind.registration_event())
        .find_map(|event| event.params.get(kind.id_param()))
        .and_then(|raw| EntityId::parse(raw))
}
