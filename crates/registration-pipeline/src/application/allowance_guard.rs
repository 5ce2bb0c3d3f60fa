//! # Allowance Guard
//!
//! Makes sure the payment token allowance covers a fee before a paid call.

use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info};

use super::guard::StageGuard;
use super::StepFailure;
use crate::algorithms::plan_approval;
use crate::domain::{
    short_hex, Address, AllowancePolicy, FeeQuote, LedgerError, PipelineError, PipelineStage,
    TransactionOutcome, TxPurpose,
};
use crate::ports::LedgerClient;

const STAGE: PipelineStage = PipelineStage::ApprovingFee;

/// Approves the fee spender only when the current allowance is short.
pub struct AllowanceGuard {
    ledger: Arc<dyn LedgerClient>,
    guard: StageGuard,
}

impl AllowanceGuard {
    /// Create a guard over `ledger`.
    pub fn new(ledger: Arc<dyn LedgerClient>, guard: StageGuard) -> Self {
        Self { ledger, guard }
    }

    /// Read the owner's token balance.
    pub async fn balance_of(&self, owner: Address, token: Address) -> Result<U256, PipelineError> {
        self.guard
            .bound(STAGE, self.ledger.read_balance(token, owner))
            .await?
            .map_err(ledger_read_error)
    }

    /// Ensure `owner` allows `quote.spender` to pull `quote.amount`.
    ///
    /// Returns `None` without submitting anything when the allowance already
    /// suffices; otherwise the confirmed approval outcome.
    pub async fn ensure_allowance(
        &self,
        owner: Address,
        quote: &FeeQuote,
        policy: AllowancePolicy,
    ) -> Result<Option<TransactionOutcome>, StepFailure> {
        let allowance = self
            .guard
            .bound(
                STAGE,
                self.ledger.read_allowance(quote.token, owner, quote.spender),
            )
            .await?
            .map_err(ledger_read_error)?;

        let Some(amount) = plan_approval(allowance, quote.amount, policy) else {
            debug!(
                "[allowance] Allowance {} covers fee {}; no approval needed",
                allowance, quote.amount
            );
            return Ok(None);
        };

        info!(
            "[allowance] Approving {} for spender {} (allowance {} < fee {})",
            amount,
            short_hex(&quote.spender),
            allowance,
            quote.amount
        );
        let tx_hash = self
            .guard
            .bound(
                STAGE,
                self.ledger.submit_approval(quote.token, quote.spender, amount),
            )
            .await?
            .map_err(|e| PipelineError::ApprovalFailed {
                tx_hash: None,
                reason: e.to_string(),
            })?;

        let receipt = self
            .guard
            .bound(STAGE, self.ledger.wait_for_receipt(tx_hash))
            .await?
            .map_err(|e| PipelineError::ApprovalFailed {
                tx_hash: Some(tx_hash),
                reason: e.to_string(),
            })?;

        let outcome = TransactionOutcome::from_receipt(TxPurpose::Approval, &receipt);
        if !receipt.succeeded() {
            return Err(StepFailure::with_outcome(
                PipelineError::ApprovalFailed {
                    tx_hash: Some(tx_hash),
                    reason: receipt.revert_reason(),
                },
                outcome,
            ));
        }
        Ok(Some(outcome))
    }
}

fn ledger_read_error(e: LedgerError) -> PipelineError {
    PipelineError::Ledger {
        stage: STAGE,
        message: e.to_string(),
    }
}
