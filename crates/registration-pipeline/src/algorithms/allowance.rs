//! # Allowance Planning

use primitive_types::U256;

use crate::domain::{invariant_approval_needed, AllowancePolicy};

/// Amount to approve, or `None` when the current allowance already covers
/// the fee. Never decides to approve when `allowance >= required`.
pub fn plan_approval(allowance: U256, required: U256, policy: AllowancePolicy) -> Option<U256> {
    invariant_approval_needed(allowance, required).then(|| policy.approval_amount(required))
}
