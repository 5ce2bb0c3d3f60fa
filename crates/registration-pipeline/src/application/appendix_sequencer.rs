//! # Appendix Sequencer
//!
//! Attaches the planned appendices to a registered entity one at a time, in
//! canonical order, stopping at the first failure.
//!
//! Each appendix's document is resolved right before its own transaction, so
//! an upload failure stops the sequence without submitting that step.
//!
//! Every submission is announced before it is sent and again once its hash
//! is known. An attachment left pending by an earlier run is settled from
//! its receipt, or from the registry, before anything is resubmitted.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::guard::StageGuard;
use crate::algorithms::{dimensions_record, reefer_record, MSDS_SLOT, SENSOR_SLOT};
use crate::domain::{
    short_hex, AppendixKey, AppendixRequest, AttachmentCall, DocumentMetadata, DocumentRef,
    EntityId, LedgerError, PendingAttachment, PipelineError, PipelineStage, TransactionOutcome,
    TxHash, TxPurpose,
};
use crate::ports::{DocumentUploader, LedgerClient};

const STAGE: PipelineStage = PipelineStage::AttachingAppendices;

/// Progress notifications, delivered synchronously as the sequence runs.
#[derive(Debug)]
pub enum SequenceEvent<'a> {
    /// A draft document was uploaded.
    Uploaded {
        /// Draft slot of the document.
        slot: &'a str,
        /// Locator returned by the uploader.
        locator: &'a str,
    },
    /// An appendix transaction is about to be sent.
    Submitting(AppendixKey),
    /// The ledger accepted an appendix transaction; its receipt is pending.
    Submitted {
        /// Appendix being attached.
        key: AppendixKey,
        /// Accepted transaction.
        tx_hash: TxHash,
    },
    /// An appendix transaction confirmed successfully.
    Attached(&'a TransactionOutcome),
    /// The registry already holds this appendix from an earlier run.
    Adopted {
        /// Appendix found on the ledger.
        key: AppendixKey,
        /// Transaction that attached it.
        tx_hash: TxHash,
    },
    /// The outstanding transaction for this appendix certainly did not
    /// attach it.
    Released(AppendixKey),
}

/// How a previously outstanding attachment turned out.
enum Recovered {
    Confirmed(TransactionOutcome),
    Found(TxHash),
    Absent,
}

/// Result of a sequence: outcomes in submission order plus the failure that
/// stopped it, if any. A failed transaction is the last outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceReport {
    /// Outcomes in order.
    pub outcomes: Vec<TransactionOutcome>,
    /// Failure that stopped the sequence.
    pub failure: Option<PipelineError>,
}

impl SequenceReport {
    /// Whether every request was attached.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    fn fail(mut self, error: PipelineError) -> Self {
        self.failure = Some(error);
        self
    }
}

/// Sequential, fail-fast appendix attachment.
pub struct AppendixSequencer {
    ledger: Arc<dyn LedgerClient>,
    uploader: Arc<dyn DocumentUploader>,
    guard: StageGuard,
}

impl AppendixSequencer {
    /// Create a sequencer.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        uploader: Arc<dyn DocumentUploader>,
        guard: StageGuard,
    ) -> Self {
        Self {
            ledger,
            uploader,
            guard,
        }
    }

    /// Attach `requests` to `entity_id` in the given order.
    ///
    /// `pending` lists attachments an earlier run submitted without seeing
    /// their outcome; those are settled before being submitted again.
    /// `on_progress` sees every upload, submission and settlement; an error
    /// from it stops the sequence.
    pub async fn attach_all<F>(
        &self,
        entity_id: EntityId,
        requests: &[AppendixRequest],
        pending: &[PendingAttachment],
        mut on_progress: F,
    ) -> SequenceReport
    where
        F: FnMut(SequenceEvent<'_>) -> Result<(), PipelineError> + Send,
    {
        let mut report = SequenceReport::default();
        for request in requests {
            let key = request.key();

            if let Some(outstanding) = pending.iter().find(|p| p.key == key) {
                let recovered = match self.recover(entity_id, outstanding).await {
                    Ok(recovered) => recovered,
                    Err(e) => {
                        warn!("[appendix] ❌ Outstanding {} unresolved: {}", key, e);
                        return report.fail(e);
                    }
                };
                let persisted = match recovered {
                    Recovered::Confirmed(outcome) => {
                        info!(
                            "[appendix] ✅ {} from an earlier run confirmed in {}",
                            key,
                            short_hex(&outcome.tx_hash)
                        );
                        let persisted = on_progress(SequenceEvent::Attached(&outcome));
                        report.outcomes.push(outcome);
                        persisted.map(|_| true)
                    }
                    Recovered::Found(tx_hash) => {
                        info!(
                            "[appendix] {} already attached to #{} in {}",
                            key,
                            entity_id,
                            short_hex(&tx_hash)
                        );
                        on_progress(SequenceEvent::Adopted { key, tx_hash }).map(|_| true)
                    }
                    Recovered::Absent => {
                        debug!("[appendix] Outstanding {} never landed; resubmitting", key);
                        on_progress(SequenceEvent::Released(key)).map(|_| false)
                    }
                };
                match persisted {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => return report.fail(e),
                }
            }

            debug!("[appendix] Preparing {} for #{}", key, entity_id);

            let call = match self.prepare(entity_id, request, &mut on_progress).await {
                Ok(call) => call,
                Err(e) => {
                    warn!("[appendix] ❌ {} not attempted: {}", key, e);
                    return report.fail(e);
                }
            };

            match self.submit(key, &call, &mut on_progress).await {
                Ok(outcome) => {
                    info!(
                        "[appendix] ✅ {} attached to #{} in {}",
                        key,
                        entity_id,
                        short_hex(&outcome.tx_hash)
                    );
                    let persisted = on_progress(SequenceEvent::Attached(&outcome));
                    report.outcomes.push(outcome);
                    if let Err(e) = persisted {
                        return report.fail(e);
                    }
                }
                Err((error, outcome)) => {
                    warn!("[appendix] ❌ {} failed: {}", key, error);
                    report.outcomes.extend(outcome);
                    return report.fail(error);
                }
            }
        }
        report
    }

    async fn prepare<F>(
        &self,
        entity_id: EntityId,
        request: &AppendixRequest,
        on_progress: &mut F,
    ) -> Result<AttachmentCall, PipelineError>
    where
        F: FnMut(SequenceEvent<'_>) -> Result<(), PipelineError> + Send,
    {
        let call = match request {
            AppendixRequest::Hazardous { un_class, sheet } => AttachmentCall::Hazardous {
                entity_id,
                msds_uri: self.resolve(MSDS_SLOT, sheet, on_progress).await?,
                un_class: un_class.clone(),
            },
            AppendixRequest::ReeferTemp {
                temp_c,
                humidity,
                sensor,
            } => {
                let sensor_uri = match sensor {
                    Some(doc) => Some(self.resolve(SENSOR_SLOT, doc, on_progress).await?),
                    None => None,
                };
                let record = reefer_record(*temp_c, *humidity, sensor_uri.as_deref());
                AttachmentCall::Reefer {
                    entity_id,
                    temp_data_uri: self
                        .upload("reefer", &record, &DocumentMetadata::json("reefer.json"))
                        .await?,
                }
            }
            AppendixRequest::Oversized {
                length,
                width,
                height,
                handling_notes,
            } => {
                let record = dimensions_record(*length, *width, *height, handling_notes);
                AttachmentCall::Oversized {
                    entity_id,
                    dimensions_uri: self
                        .upload("oversized", &record, &DocumentMetadata::json("dimensions.json"))
                        .await?,
                }
            }
            AppendixRequest::Document { kind, doc } => AttachmentCall::Document {
                entity_id,
                kind: *kind,
                uri: self.resolve(kind.slot(), doc, on_progress).await?,
            },
        };
        Ok(call)
    }

    /// Locator of a draft document, uploading it if still pending.
    async fn resolve<F>(
        &self,
        slot: &str,
        doc: &DocumentRef,
        on_progress: &mut F,
    ) -> Result<String, PipelineError>
    where
        F: FnMut(SequenceEvent<'_>) -> Result<(), PipelineError> + Send,
    {
        match doc {
            DocumentRef::Uploaded { locator } => Ok(locator.clone()),
            DocumentRef::Pending(pending) => {
                let locator = self
                    .upload(slot, &pending.bytes, &pending.metadata())
                    .await?;
                on_progress(SequenceEvent::Uploaded {
                    slot,
                    locator: &locator,
                })?;
                Ok(locator)
            }
        }
    }

    async fn upload(
        &self,
        slot: &str,
        bytes: &[u8],
        metadata: &DocumentMetadata,
    ) -> Result<String, PipelineError> {
        self.guard
            .bound(STAGE, self.uploader.upload(bytes, metadata))
            .await?
            .map_err(|e| PipelineError::UploadFailed {
                slot: slot.to_string(),
                stage: STAGE,
                reason: e.to_string(),
            })
    }

    async fn submit<F>(
        &self,
        key: AppendixKey,
        call: &AttachmentCall,
        on_progress: &mut F,
    ) -> Result<TransactionOutcome, (PipelineError, Option<TransactionOutcome>)>
    where
        F: FnMut(SequenceEvent<'_>) -> Result<(), PipelineError> + Send,
    {
        on_progress(SequenceEvent::Submitting(key)).map_err(|e| (e, None))?;

        let submitted = self
            .guard
            .bound(STAGE, self.ledger.submit_attachment(call))
            .await
            .map_err(|e| (e, None))?;
        let tx_hash = match submitted {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                // a rejected transaction never reached the ledger
                if matches!(e, LedgerError::Rejected(_)) {
                    on_progress(SequenceEvent::Released(key)).map_err(|e| (e, None))?;
                }
                return Err((
                    PipelineError::AttachmentFailed {
                        step: key,
                        tx_hash: None,
                        reason: e.to_string(),
                    },
                    None,
                ));
            }
        };
        on_progress(SequenceEvent::Submitted { key, tx_hash }).map_err(|e| (e, None))?;

        let receipt = self
            .guard
            .bound(STAGE, self.ledger.wait_for_receipt(tx_hash))
            .await
            .map_err(|e| (e, None))?
            .map_err(|e| {
                (
                    PipelineError::AttachmentFailed {
                        step: key,
                        tx_hash: Some(tx_hash),
                        reason: e.to_string(),
                    },
                    None,
                )
            })?;

        let outcome = TransactionOutcome::from_receipt(TxPurpose::Attachment(key), &receipt);
        if receipt.succeeded() {
            Ok(outcome)
        } else {
            let error = PipelineError::AttachmentFailed {
                step: key,
                tx_hash: Some(tx_hash),
                reason: receipt.revert_reason(),
            };
            if let Err(e) = on_progress(SequenceEvent::Released(key)) {
                warn!("[appendix] Could not record reverted {}: {}", key, e);
            }
            Err((error, Some(outcome)))
        }
    }

    /// Settle an attachment an earlier run left without an outcome.
    async fn recover(
        &self,
        entity_id: EntityId,
        outstanding: &PendingAttachment,
    ) -> Result<Recovered, PipelineError> {
        let key = outstanding.key;
        let ledger_error = |e: LedgerError| PipelineError::Ledger {
            stage: STAGE,
            message: e.to_string(),
        };

        if let Some(tx_hash) = outstanding.tx_hash {
            match self
                .guard
                .bound(STAGE, self.ledger.wait_for_receipt(tx_hash))
                .await?
            {
                Ok(receipt) if receipt.succeeded() => {
                    return Ok(Recovered::Confirmed(TransactionOutcome::from_receipt(
                        TxPurpose::Attachment(key),
                        &receipt,
                    )))
                }
                Ok(_) => return Ok(Recovered::Absent),
                Err(LedgerError::UnknownTransaction(_)) => {}
                Err(e) => return Err(ledger_error(e)),
            }
        }

        let found = self
            .guard
            .bound(STAGE, self.ledger.find_attachment(entity_id, key))
            .await?
            .map_err(ledger_error)?;
        Ok(match found {
            Some(tx_hash) => Recovered::Found(tx_hash),
            None => Recovered::Absent,
        })
    }
}
