//! # Domain Invariants
//!
//! Rules that every pipeline run must satisfy. Checked in the services and
//! asserted by the test suites.

use primitive_types::U256;

use super::entities::TransactionOutcome;
use super::value_objects::AppendixKey;

/// Default bound on every ledger await.
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 120_000;

/// Default period of the draft auto-save task.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Highest real-world-asset category code.
pub const MAX_ASSET_CATEGORY: u8 = 7;

/// Decimals of the payment token and of fraction prices.
pub const TOKEN_DECIMALS: u32 = 18;

/// Decimals applied to manifest weights (metric tonnes → thousandths).
pub const WEIGHT_DECIMALS: u32 = 3;

/// Invariant: an approval is needed only when the allowance is short.
pub fn invariant_approval_needed(allowance: U256, required: U256) -> bool {
    allowance < required
}

/// Invariant: appendix steps appear in strictly increasing canonical order.
pub fn invariant_canonical_order(keys: &[AppendixKey]) -> bool {
    keys.windows(2).all(|pair| pair[0] < pair[1])
}

/// Invariant: no outcome follows a failed one (fail-fast).
pub fn invariant_fail_fast(outcomes: &[TransactionOutcome]) -> bool {
    match outcomes.iter().position(|o| !o.success) {
        Some(index) => index == outcomes.len() - 1,
        None => true,
    }
}
