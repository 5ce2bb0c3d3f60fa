//! # Pipeline Configuration
//!
//! Timeouts, draft location, auto-save cadence and the per-kind allowance
//! policy. Environment variables (`RP_*`) override the defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::domain::{
    AllowancePolicy, PipelineKind, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_CONFIRMATION_TIMEOUT_MS,
};

/// Registration pipeline configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bound on every ledger and uploader await, in milliseconds.
    pub confirmation_timeout_ms: u64,

    /// Directory of the file draft store.
    pub draft_dir: PathBuf,

    /// Period of the draft auto-save task, in seconds.
    pub autosave_interval_secs: u64,

    /// Approval amount policy for asset tokenization.
    pub tokenization_allowance: AllowancePolicy,

    /// Approval amount policy for manifest registration.
    pub manifest_allowance: AllowancePolicy,

    /// Resolve a pending registration against the ledger before
    /// resubmitting. When off, a pending registration aborts the run.
    pub reconcile: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT_MS,
            draft_dir: PathBuf::from(".drafts"),
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            tokenization_allowance: AllowancePolicy::Unbounded,
            manifest_allowance: AllowancePolicy::Exact,
            reconcile: true,
        }
    }
}

impl PipelineConfig {
    /// Create a config for testing (short timeouts).
    pub fn for_testing() -> Self {
        Self {
            confirmation_timeout_ms: 500,
            draft_dir: std::env::temp_dir().join("registration-pipeline-drafts"),
            autosave_interval_secs: 1,
            ..Self::default()
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Unparseable values are
    /// ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("RP_CONFIRMATION_TIMEOUT_MS") {
            match raw.trim().parse() {
                Ok(ms) => config.confirmation_timeout_ms = ms,
                Err(_) => warn!("RP_CONFIRMATION_TIMEOUT_MS is not a number: {}", raw),
            }
        }
        if let Some(dir) = lookup("RP_DRAFT_DIR") {
            config.draft_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("RP_AUTOSAVE_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.autosave_interval_secs = secs,
                _ => warn!("RP_AUTOSAVE_INTERVAL_SECS must be a positive number: {}", raw),
            }
        }
        if let Some(raw) = lookup("RP_TOKENIZATION_ALLOWANCE") {
            match raw.parse() {
                Ok(policy) => config.tokenization_allowance = policy,
                Err(e) => warn!("RP_TOKENIZATION_ALLOWANCE: {}", e),
            }
        }
        if let Some(raw) = lookup("RP_MANIFEST_ALLOWANCE") {
            match raw.parse() {
                Ok(policy) => config.manifest_allowance = policy,
                Err(e) => warn!("RP_MANIFEST_ALLOWANCE: {}", e),
            }
        }
        if let Some(raw) = lookup("RP_RECONCILE") {
            config.reconcile = raw == "1" || raw.to_lowercase() == "true";
        }

        config
    }

    /// Allowance policy for a pipeline kind.
    pub fn allowance_policy(&self, kind: PipelineKind) -> AllowancePolicy {
        match kind {
            PipelineKind::Tokenization => self.tokenization_allowance,
            PipelineKind::Manifest => self.manifest_allowance,
        }
    }

    /// Confirmation timeout as a duration.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    /// Auto-save period as a duration.
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }
}
