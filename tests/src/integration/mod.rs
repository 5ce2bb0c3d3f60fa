//! Cross-component tests: pipeline, sandbox ledger, uploader and draft stores.

pub mod fixtures;

mod properties;
mod scenarios;
