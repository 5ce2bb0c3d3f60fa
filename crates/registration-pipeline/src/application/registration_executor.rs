//! # Registration Executor
//!
//! Submits the primary registration and turns its receipt into an entity id.
//! Submission and confirmation are separate calls so the caller can record
//! the pending transaction in between.

use std::sync::Arc;
use tracing::{info, warn};

use super::guard::StageGuard;
use super::StepFailure;
use crate::algorithms::extract_entity_id;
use crate::domain::{
    short_hex, Address, EntityId, LedgerError, PipelineError, PipelineKind, PipelineStage,
    RegistrationRequest, TransactionOutcome, TxHash, TxPurpose, TxReceipt,
};
use crate::ports::LedgerClient;

/// Executes the primary registration transaction.
pub struct RegistrationExecutor {
    ledger: Arc<dyn LedgerClient>,
    guard: StageGuard,
}

/// What the ledger says about a previously submitted registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingResolution {
    /// The registration exists; adopt its id.
    Registered(EntityId),
    /// The pending transaction reverted; a new registration is safe.
    Reverted,
    /// Neither the receipt nor the registry settles it.
    Unresolved,
    /// The submission never returned a hash and the registry has no match;
    /// it did not land.
    Absent,
}

impl RegistrationExecutor {
    /// Create an executor over `ledger`.
    pub fn new(ledger: Arc<dyn LedgerClient>, guard: StageGuard) -> Self {
        Self { ledger, guard }
    }

    /// Submit `request`. Exactly one transaction.
    pub async fn submit(&self, request: &RegistrationRequest) -> Result<TxHash, PipelineError> {
        let stage = PipelineStage::Registering;
        let tx_hash = self
            .guard
            .bound(stage, self.ledger.submit_registration(request))
            .await?
            .map_err(|e| match e {
                LedgerError::Rejected(reason) => PipelineError::RegistrationReverted {
                    tx_hash: None,
                    reason,
                },
                other => PipelineError::Ledger {
                    stage,
                    message: other.to_string(),
                },
            })?;
        info!(
            "[registration] Submitted {} for {} as {}",
            request.kind(),
            request.natural_key(),
            short_hex(&tx_hash)
        );
        Ok(tx_hash)
    }

    /// Wait for `tx_hash` and extract the entity id.
    ///
    /// A reverted receipt is `RegistrationReverted`; a successful receipt
    /// without the creation event is `RegistrationUnparseable`.
    pub async fn confirm(
        &self,
        kind: PipelineKind,
        tx_hash: TxHash,
    ) -> Result<TransactionOutcome, StepFailure> {
        let stage = PipelineStage::Registering;
        let receipt = self
            .guard
            .bound(stage, self.ledger.wait_for_receipt(tx_hash))
            .await?
            .map_err(|e| PipelineError::Ledger {
                stage,
                message: e.to_string(),
            })?;
        interpret_receipt(kind, &receipt)
    }

    /// Submit and confirm in one call.
    pub async fn register(
        &self,
        request: &RegistrationRequest,
    ) -> Result<TransactionOutcome, StepFailure> {
        let tx_hash = self.submit(request).await?;
        self.confirm(request.kind(), tx_hash).await
    }

    /// Settle a registration left pending by an earlier attempt.
    ///
    /// Reads are attributed to `stage`. Without a hash, or when the receipt
    /// is lost or lacks the creation event, the registry is searched by
    /// natural key.
    pub async fn resolve_pending(
        &self,
        stage: PipelineStage,
        kind: PipelineKind,
        owner: Address,
        natural_key: &str,
        tx_hash: Option<TxHash>,
    ) -> Result<PendingResolution, PipelineError> {
        if let Some(tx_hash) = tx_hash {
            let receipt = self
                .guard
                .bound(stage, self.ledger.wait_for_receipt(tx_hash))
                .await?;
            match receipt {
                Ok(receipt) if !receipt.succeeded() => return Ok(PendingResolution::Reverted),
                Ok(receipt) => {
                    if let Some(id) = extract_entity_id(kind, &receipt) {
                        return Ok(PendingResolution::Registered(id));
                    }
                }
                Err(LedgerError::UnknownTransaction(_)) => {}
                Err(e) => {
                    return Err(PipelineError::Ledger {
                        stage,
                        message: e.to_string(),
                    })
                }
            }
        }

        let found = self
            .guard
            .bound(
                stage,
                self.ledger.find_registration(kind, owner, natural_key),
            )
            .await?
            .map_err(|e| PipelineError::Ledger {
                stage,
                message: e.to_string(),
            })?;
        match (found, tx_hash) {
            (Some(id), _) => Ok(PendingResolution::Registered(id)),
            (None, Some(tx_hash)) => {
                warn!(
                    "[registration] Pending {} for {} is unresolved",
                    short_hex(&tx_hash),
                    natural_key
                );
                Ok(PendingResolution::Unresolved)
            }
            (None, None) => Ok(PendingResolution::Absent),
        }
    }
}

fn interpret_receipt(
    kind: PipelineKind,
    receipt: &TxReceipt,
) -> Result<TransactionOutcome, StepFailure> {
    let outcome = TransactionOutcome::from_receipt(TxPurpose::Registration, receipt);
    if !receipt.succeeded() {
        return Err(StepFailure::with_outcome(
            PipelineError::RegistrationReverted {
                tx_hash: Some(receipt.tx_hash),
                reason: receipt.revert_reason(),
            },
            outcome,
        ));
    }
    match extract_entity_id(kind, receipt) {
        Some(id) => {
            info!(
                "[registration] ✅ {} confirmed in block {}: {} #{}",
                short_hex(&receipt.tx_hash),
                receipt.block.number,
                kind.id_param(),
                id
            );
            Ok(outcome.with_emitted_id(id))
        }
        None => Err(StepFailure::with_outcome(
            PipelineError::RegistrationUnparseable {
                tx_hash: Some(receipt.tx_hash),
                expected_event: kind.registration_event().to_string(),
            },
            outcome,
        )),
    }
}
