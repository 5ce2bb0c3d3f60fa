//! File-backed draft store: one JSON document per pipeline kind.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::{AssetDraft, DraftStoreError, PipelineKind};
use crate::ports::DraftStore;

/// Draft store persisting each kind as `<dir>/<kind>.draft.json`.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous draft intact.
pub struct FileDraftStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDraftStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the draft file for `kind`.
    pub fn path_for(&self, kind: PipelineKind) -> PathBuf {
        self.dir.join(format!("{}.draft.json", kind.as_str()))
    }

    fn io(e: std::io::Error) -> DraftStoreError {
        DraftStoreError::Io {
            message: e.to_string(),
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, draft: &AssetDraft) -> Result<(), DraftStoreError> {
        use std::io::Write;

        let bytes = serde_json::to_vec_pretty(draft)
            .map_err(|e| DraftStoreError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(&self.dir).map_err(Self::io)?;

        let path = self.path_for(draft.kind);
        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(Self::io)?;
        file.write_all(&bytes).map_err(Self::io)?;
        file.sync_all().map_err(Self::io)?;
        std::fs::rename(&temp_path, &path).map_err(Self::io)?;

        debug!(
            "[drafts] 💾 Saved {} draft at step {} ({} bytes)",
            draft.kind,
            draft.step_index,
            bytes.len()
        );
        Ok(())
    }

    fn load(&self, kind: PipelineKind) -> Option<AssetDraft> {
        let path = self.path_for(kind);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice::<AssetDraft>(&bytes) {
            Ok(draft) if draft.kind == kind => Some(draft),
            Ok(draft) => {
                warn!(
                    "[drafts] Ignoring {}: holds a {} draft",
                    path.display(),
                    draft.kind
                );
                None
            }
            Err(e) => {
                warn!("[drafts] Ignoring corrupt draft {}: {}", path.display(), e);
                None
            }
        }
    }

    fn clear(&self, kind: PipelineKind) -> Result<(), DraftStoreError> {
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(self.path_for(kind)) {
            Ok(()) => {
                debug!("[drafts] 🗑️ Cleared {} draft", kind);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AppendixKey, DocumentRef, EntityId, PendingDocument};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileDraftStore) {
        let dir = TempDir::new().unwrap();
        let store = FileDraftStore::new(dir.path().join("drafts"));
        (dir, store)
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = store();
        let mut draft = AssetDraft::new(PipelineKind::Manifest)
            .with_field("containerId", "MSCU1234567")
            .with_flag("reefer")
            .with_document(
                "invoice",
                DocumentRef::Pending(PendingDocument::new("inv.pdf", "application/pdf", vec![9; 16])),
            );
        draft.checkpoint.entity_id = Some(EntityId::from(12));
        draft.checkpoint.attached.insert(AppendixKey::Reefer);

        store.save(&draft).unwrap();
        assert!(store.exists(PipelineKind::Manifest));
        assert!(!store.exists(PipelineKind::Tokenization));
        assert_eq!(store.load(PipelineKind::Manifest), Some(draft));
    }

    #[test]
    fn test_save_overwrites_same_kind() {
        let (_dir, store) = store();
        store
            .save(&AssetDraft::new(PipelineKind::Manifest).with_field("containerId", "A"))
            .unwrap();
        store
            .save(&AssetDraft::new(PipelineKind::Manifest).with_field("containerId", "B"))
            .unwrap();
        let loaded = store.load(PipelineKind::Manifest).unwrap();
        assert_eq!(loaded.text("containerId").as_deref(), Some("B"));
    }

    #[test]
    fn test_partial_draft_saves() {
        let (_dir, store) = store();
        store.save(&AssetDraft::new(PipelineKind::Tokenization)).unwrap();
        assert!(store.exists(PipelineKind::Tokenization));
    }

    #[test]
    fn test_corrupt_file_loads_as_none() {
        let (_dir, store) = store();
        store.save(&AssetDraft::new(PipelineKind::Manifest)).unwrap();
        std::fs::write(store.path_for(PipelineKind::Manifest), b"{not json").unwrap();
        assert_eq!(store.load(PipelineKind::Manifest), None);
        assert!(!store.exists(PipelineKind::Manifest));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (_dir, store) = store();
        store.save(&AssetDraft::new(PipelineKind::Manifest)).unwrap();
        store.clear(PipelineKind::Manifest).unwrap();
        store.clear(PipelineKind::Manifest).unwrap();
        assert_eq!(store.load(PipelineKind::Manifest), None);
    }
}
