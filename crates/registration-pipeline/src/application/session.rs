//! # Draft Session
//!
//! Editing handle over one draft plus the periodic auto-save task.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::guard::CancelHandle;
use crate::config::PipelineConfig;
use crate::domain::{
    AssetDraft, DocumentRef, DraftStoreError, PendingDocument, PipelineKind, StepError,
};
use crate::ports::DraftStore;

/// An open draft of one pipeline kind.
///
/// Every edit stays in memory until [`DraftSession::save`] or the
/// [`AutoSaver`] writes it out.
#[derive(Clone)]
pub struct DraftSession {
    store: Arc<dyn DraftStore>,
    draft: Arc<Mutex<AssetDraft>>,
}

impl DraftSession {
    /// Open the stored draft of `kind`, or start a fresh one.
    pub fn open(store: Arc<dyn DraftStore>, kind: PipelineKind) -> Self {
        let draft = match store.load(kind) {
            Some(draft) => {
                debug!(
                    "[session] Restored {} draft at step {}",
                    kind, draft.step_index
                );
                draft
            }
            None => AssetDraft::new(kind),
        };
        Self {
            store,
            draft: Arc::new(Mutex::new(draft)),
        }
    }

    /// Copy of the current draft.
    pub fn snapshot(&self) -> AssetDraft {
        self.draft.lock().clone()
    }

    /// Pipeline kind.
    pub fn kind(&self) -> PipelineKind {
        self.draft.lock().kind
    }

    /// Current form step.
    pub fn step(&self) -> u32 {
        self.draft.lock().step_index
    }

    /// Move forward to `step`.
    pub fn advance_to(&self, step: u32) -> Result<(), StepError> {
        self.draft.lock().advance_to(step)
    }

    /// Explicitly go back to `step`.
    pub fn rewind_to(&self, step: u32) -> Result<(), StepError> {
        self.draft.lock().rewind_to(step)
    }

    /// Set a field value.
    pub fn set_field(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.draft.lock().set_field(key, value);
    }

    /// Raise or clear a flag.
    pub fn set_flag(&self, flag: impl Into<String>, on: bool) {
        self.draft.lock().set_flag(flag, on);
    }

    /// Put a locally selected file into a document slot.
    pub fn attach_document(&self, slot: impl Into<String>, doc: PendingDocument) {
        self.draft
            .lock()
            .documents
            .insert(slot.into(), DocumentRef::Pending(doc));
    }

    /// Manual save. Always writes, even a blank draft.
    pub fn save(&self) -> Result<(), DraftStoreError> {
        let snapshot = {
            let mut draft = self.draft.lock();
            draft.last_saved_at = Utc::now();
            draft.clone()
        };
        self.store.save(&snapshot)
    }

    /// Auto-save: writes only when a significant field is filled.
    /// Returns whether anything was written.
    pub fn autosave(&self) -> Result<bool, DraftStoreError> {
        if !self.draft.lock().has_significant_content() {
            return Ok(false);
        }
        self.save().map(|_| true)
    }

    /// Drop the stored draft and start over at step 1.
    pub fn discard(&self) -> Result<(), DraftStoreError> {
        let kind = {
            let mut draft = self.draft.lock();
            *draft = AssetDraft::new(draft.kind);
            draft.kind
        };
        self.store.clear(kind)
    }
}

/// Background task saving a session every interval until stopped.
pub struct AutoSaver {
    stop: CancelHandle,
    task: JoinHandle<usize>,
}

impl AutoSaver {
    /// Start auto-saving `session` every `interval`. The first save happens
    /// one interval after spawning. Must be called within a tokio runtime.
    pub fn spawn(session: DraftSession, interval: Duration) -> Self {
        let stop = CancelHandle::new();
        let mut stopped = stop.subscribe();
        let task = tokio::spawn(async move {
            let mut saves = 0usize;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => match session.autosave() {
                        Ok(true) => saves += 1,
                        Ok(false) => debug!("[session] Auto-save skipped: no significant field"),
                        Err(e) => warn!("[session] Auto-save failed: {}", e),
                    },
                }
            }
            saves
        });
        Self { stop, task }
    }

    /// Start auto-saving `session` at the configured interval.
    pub fn from_config(session: DraftSession, config: &PipelineConfig) -> Self {
        Self::spawn(session, config.autosave_interval())
    }

    /// Handle that stops this task when cancelled.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.stop.clone()
    }

    /// Stop the task and return how many saves it performed.
    pub async fn stop(self) -> usize {
        self.stop.cancel();
        self.task.await.unwrap_or_default()
    }
}
