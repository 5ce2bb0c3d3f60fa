//! In-memory draft store for tests and embedding.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{AssetDraft, DraftStoreError, PipelineKind};
use crate::ports::DraftStore;

/// In-memory draft store.
///
/// Counts saves and clears so tests can assert how often the pipeline
/// touched the store. Save failures can be injected.
#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<PipelineKind, AssetDraft>>,
    saves: AtomicUsize,
    clears: AtomicUsize,
    fail_saves: RwLock<Option<String>>,
}

impl InMemoryDraftStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Number of `clear` calls.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Make every subsequent save fail with `message` (`None` to heal).
    pub fn fail_saves(&self, message: Option<&str>) {
        *self.fail_saves.write() = message.map(str::to_string);
    }
}

impl DraftStore for InMemoryDraftStore {
    fn save(&self, draft: &AssetDraft) -> Result<(), DraftStoreError> {
        if let Some(message) = self.fail_saves.read().clone() {
            return Err(DraftStoreError::Io { message });
        }
        self.drafts.write().insert(draft.kind, draft.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, kind: PipelineKind) -> Option<AssetDraft> {
        self.drafts.read().get(&kind).cloned()
    }

    fn clear(&self, kind: PipelineKind) -> Result<(), DraftStoreError> {
        self.drafts.write().remove(&kind);
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
