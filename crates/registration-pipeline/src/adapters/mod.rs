//! # Adapters Module
//!
//! Implementations of the outbound ports: draft stores, the sandbox ledger
//! and the content-addressed uploader.

pub mod content_uploader;
pub mod file_draft_store;
pub mod memory_draft_store;
pub mod sandbox_ledger;

pub use content_uploader::{content_locator, ContentAddressedUploader, LOCATOR_SCHEME};
pub use file_draft_store::FileDraftStore;
pub use memory_draft_store::InMemoryDraftStore;
pub use sandbox_ledger::{registry_address, SandboxLedger, SANDBOX_SIGNER, SANDBOX_TOKEN};
