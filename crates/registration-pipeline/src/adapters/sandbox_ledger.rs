//! # Sandbox Ledger
//!
//! In-process ledger with a payment token, the two registries and fault
//! injection. Used by the test suites and by the CLI dry run.

use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::U256;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

use crate::domain::{
    short_hex, Address, AppendixKey, AttachmentCall, BlockRef, EntityId, FeeQuote, LedgerError,
    LedgerEvent, PipelineKind, ReceiptStatus, RegistrationRequest, TxHash, TxPurpose, TxReceipt,
};
use crate::ports::LedgerClient;

/// Payment token contract.
pub const SANDBOX_TOKEN: Address = [0xB0; 20];
/// Default signing account.
pub const SANDBOX_SIGNER: Address = [0x5E; 20];

/// One whole payment token in base units.
fn whole_tokens(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

/// Registry contract that collects the fee for `kind`.
pub fn registry_address(kind: PipelineKind) -> Address {
    match kind {
        PipelineKind::Tokenization => [0xA1; 20],
        PipelineKind::Manifest => [0xC4; 20],
    }
}

/// Injected failures.
#[derive(Clone, Debug, Default)]
struct Faults {
    reject_approval: Option<String>,
    revert_approval: Option<String>,
    reject_registration: Option<String>,
    revert_registration: Option<String>,
    drop_registration_event: bool,
    failing_attachments: HashSet<AppendixKey>,
    receipt_delay: Option<Duration>,
    attachment_receipt_delay: Option<Duration>,
    lost_receipts: bool,
    lost_attachment_receipts: bool,
    slow_submissions: Option<Duration>,
}

#[derive(Debug, Default)]
struct LedgerState {
    block_number: u64,
    nonce: u64,
    fees: HashMap<PipelineKind, U256>,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    receipts: HashMap<TxHash, TxReceipt>,
    registrations: HashMap<(PipelineKind, Address, String), EntityId>,
    attachments: BTreeMap<EntityId, Vec<AttachmentCall>>,
    attachment_txs: HashMap<(EntityId, AppendixKey), TxHash>,
    purposes: HashMap<TxHash, TxPurpose>,
    submissions: Vec<TxPurpose>,
    next_entity: u64,
    faults: Faults,
}

impl LedgerState {
    fn next_tx_hash(&mut self, purpose: TxPurpose, label: &str) -> TxHash {
        self.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(label.as_bytes());
        let tx_hash: TxHash = hasher.finalize().into();
        self.submissions.push(purpose);
        self.purposes.insert(tx_hash, purpose);
        tx_hash
    }

    fn next_block(&mut self) -> BlockRef {
        self.block_number += 1;
        let hash: [u8; 32] = Sha256::digest(self.block_number.to_be_bytes()).into();
        BlockRef {
            number: self.block_number,
            hash,
        }
    }

    fn record(&mut self, tx_hash: TxHash, status: ReceiptStatus, events: Vec<LedgerEvent>) {
        let block = self.next_block();
        self.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block,
                status,
                events,
            },
        );
    }

    /// Pull the registration fee the way an ERC-20 `transferFrom` would.
    fn charge_fee(&mut self, owner: Address, spender: Address, fee: U256) -> Result<(), String> {
        let allowance = self
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        if allowance < fee {
            return Err("ERC20: insufficient allowance".to_string());
        }
        let balance = self.balances.get(&owner).copied().unwrap_or_default();
        if balance < fee {
            return Err("ERC20: transfer amount exceeds balance".to_string());
        }
        self.balances.insert(owner, balance - fee);
        if allowance != U256::MAX {
            self.allowances.insert((owner, spender), allowance - fee);
        }
        Ok(())
    }
}

/// In-process ledger.
pub struct SandboxLedger {
    signer: Address,
    state: RwLock<LedgerState>,
}

impl Default for SandboxLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxLedger {
    /// Sandbox with a signer holding 1000 tokens and fees of 50 (tokenization)
    /// and 10 (manifest) tokens.
    pub fn new() -> Self {
        let mut state = LedgerState {
            next_entity: 1,
            ..Default::default()
        };
        state
            .fees
            .insert(PipelineKind::Tokenization, whole_tokens(50));
        state.fees.insert(PipelineKind::Manifest, whole_tokens(10));
        state.balances.insert(SANDBOX_SIGNER, whole_tokens(1000));
        Self {
            signer: SANDBOX_SIGNER,
            state: RwLock::new(state),
        }
    }

    /// Set the fee of `kind`.
    pub fn set_fee(&self, kind: PipelineKind, fee: U256) {
        self.state.write().fees.insert(kind, fee);
    }

    /// Set the signer's token balance.
    pub fn set_balance(&self, balance: U256) {
        self.state.write().balances.insert(self.signer, balance);
    }

    /// Set the signer's allowance towards the registry of `kind`.
    pub fn set_allowance(&self, kind: PipelineKind, amount: U256) {
        self.state
            .write()
            .allowances
            .insert((self.signer, registry_address(kind)), amount);
    }

    /// Current signer allowance towards the registry of `kind`.
    pub fn allowance(&self, kind: PipelineKind) -> U256 {
        self.state
            .read()
            .allowances
            .get(&(self.signer, registry_address(kind)))
            .copied()
            .unwrap_or_default()
    }

    /// Current signer balance.
    pub fn balance(&self) -> U256 {
        self.state
            .read()
            .balances
            .get(&self.signer)
            .copied()
            .unwrap_or_default()
    }

    /// The signer declines approvals.
    pub fn reject_approval(&self, reason: &str) {
        self.state.write().faults.reject_approval = Some(reason.to_string());
    }

    /// Approvals are mined but revert.
    pub fn revert_approval(&self, reason: &str) {
        self.state.write().faults.revert_approval = Some(reason.to_string());
    }

    /// The signer declines registrations.
    pub fn reject_registration(&self, reason: &str) {
        self.state.write().faults.reject_registration = Some(reason.to_string());
    }

    /// Registrations are mined but revert.
    pub fn revert_registration(&self, reason: &str) {
        self.state.write().faults.revert_registration = Some(reason.to_string());
    }

    /// Registrations succeed but their receipt omits the creation event.
    pub fn drop_registration_event(&self, drop: bool) {
        self.state.write().faults.drop_registration_event = drop;
    }

    /// Attachments of `key` revert.
    pub fn fail_attachment(&self, key: AppendixKey) {
        self.state.write().faults.failing_attachments.insert(key);
    }

    /// Receipts arrive after `delay`.
    pub fn delay_receipts(&self, delay: Option<Duration>) {
        self.state.write().faults.receipt_delay = delay;
    }

    /// Receipts of attachment transactions arrive after `delay`.
    pub fn delay_attachment_receipts(&self, delay: Option<Duration>) {
        self.state.write().faults.attachment_receipt_delay = delay;
    }

    /// Receipts are never found (`UnknownTransaction`).
    pub fn lose_receipts(&self, lost: bool) {
        self.state.write().faults.lost_receipts = lost;
    }

    /// Receipts of attachment transactions are never found.
    pub fn lose_attachment_receipts(&self, lost: bool) {
        self.state.write().faults.lost_attachment_receipts = lost;
    }

    /// Registrations and attachments land immediately but the submission
    /// call only returns after `delay`.
    pub fn slow_submissions(&self, delay: Option<Duration>) {
        self.state.write().faults.slow_submissions = delay;
    }

    /// Remove every injected failure.
    pub fn heal(&self) {
        self.state.write().faults = Faults::default();
    }

    /// Purposes of every submitted transaction, in order.
    pub fn submissions(&self) -> Vec<TxPurpose> {
        self.state.read().submissions.clone()
    }

    /// Number of submitted registrations.
    pub fn registration_count(&self) -> usize {
        self.submissions()
            .iter()
            .filter(|p| **p == TxPurpose::Registration)
            .count()
    }

    /// Number of submitted attachments of `key`, confirmed or not.
    pub fn attachment_count(&self, key: AppendixKey) -> usize {
        self.submissions()
            .iter()
            .filter(|p| **p == TxPurpose::Attachment(key))
            .count()
    }

    /// Attachments confirmed for `entity_id`, in order.
    pub fn attachments(&self, entity_id: EntityId) -> Vec<AttachmentCall> {
        self.state
            .read()
            .attachments
            .get(&entity_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LedgerClient for SandboxLedger {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn fee_quote(&self, kind: PipelineKind) -> Result<FeeQuote, LedgerError> {
        let amount = self
            .state
            .read()
            .fees
            .get(&kind)
            .copied()
            .unwrap_or_default();
        Ok(FeeQuote {
            amount,
            token: SANDBOX_TOKEN,
            spender: registry_address(kind),
        })
    }

    async fn read_balance(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        if token != SANDBOX_TOKEN {
            return Err(LedgerError::Unsupported(format!(
                "unknown token {}",
                short_hex(&token)
            )));
        }
        Ok(self
            .state
            .read()
            .balances
            .get(&owner)
            .copied()
            .unwrap_or_default())
    }

    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, LedgerError> {
        if token != SANDBOX_TOKEN {
            return Err(LedgerError::Unsupported(format!(
                "unknown token {}",
                short_hex(&token)
            )));
        }
        Ok(self
            .state
            .read()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, LedgerError> {
        let mut state = self.state.write();
        if let Some(reason) = state.faults.reject_approval.clone() {
            return Err(LedgerError::Rejected(reason));
        }
        let tx_hash = state.next_tx_hash(TxPurpose::Approval, "approve");

        if token != SANDBOX_TOKEN {
            state.record(
                tx_hash,
                ReceiptStatus::Reverted {
                    reason: Some("not a token".to_string()),
                },
                vec![],
            );
        } else if let Some(reason) = state.faults.revert_approval.clone() {
            state.record(tx_hash, ReceiptStatus::Reverted { reason: Some(reason) }, vec![]);
        } else {
            state.allowances.insert((self.signer, spender), amount);
            let event = LedgerEvent::new(
                "Approval",
                [
                    ("owner", format!("0x{}", hex::encode(self.signer))),
                    ("spender", format!("0x{}", hex::encode(spender))),
                    ("value", amount.to_string()),
                ],
            );
            state.record(tx_hash, ReceiptStatus::Success, vec![event]);
        }
        debug!("[sandbox] approve({}, {}) -> {}", short_hex(&spender), amount, short_hex(&tx_hash));
        Ok(tx_hash)
    }

    async fn submit_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<TxHash, LedgerError> {
        let tx_hash = self.land_registration(request)?;
        self.respond().await;
        Ok(tx_hash)
    }

    async fn submit_attachment(&self, call: &AttachmentCall) -> Result<TxHash, LedgerError> {
        let tx_hash = self.land_attachment(call);
        self.respond().await;
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
        let (delay, lost) = {
            let state = self.state.read();
            let faults = &state.faults;
            match state.purposes.get(&tx_hash) {
                Some(TxPurpose::Attachment(_)) => (
                    faults.attachment_receipt_delay.or(faults.receipt_delay),
                    faults.lost_attachment_receipts || faults.lost_receipts,
                ),
                _ => (faults.receipt_delay, faults.lost_receipts),
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if lost {
            return Err(LedgerError::UnknownTransaction(tx_hash));
        }
        self.state
            .read()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(LedgerError::UnknownTransaction(tx_hash))
    }

    async fn find_registration(
        &self,
        kind: PipelineKind,
        owner: Address,
        natural_key: &str,
    ) -> Result<Option<EntityId>, LedgerError> {
        Ok(self
            .state
            .read()
            .registrations
            .get(&(kind, owner, natural_key.to_string()))
            .copied())
    }

    async fn find_attachment(
        &self,
        entity_id: EntityId,
        key: AppendixKey,
    ) -> Result<Option<TxHash>, LedgerError> {
        Ok(self
            .state
            .read()
            .attachment_txs
            .get(&(entity_id, key))
            .copied())
    }
}

impl SandboxLedger {
    /// Wait out `slow_submissions` after a transaction has landed.
    async fn respond(&self) {
        let delay = self.state.read().faults.slow_submissions;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn land_registration(&self, request: &RegistrationRequest) -> Result<TxHash, LedgerError> {
        let kind = request.kind();
        let mut state = self.state.write();
        if let Some(reason) = state.faults.reject_registration.clone() {
            return Err(LedgerError::Rejected(reason));
        }
        let tx_hash = state.next_tx_hash(TxPurpose::Registration, kind.as_str());

        if let Some(reason) = state.faults.revert_registration.clone() {
            state.record(tx_hash, ReceiptStatus::Reverted { reason: Some(reason) }, vec![]);
            return Ok(tx_hash);
        }

        let fee = state.fees.get(&kind).copied().unwrap_or_default();
        if let Err(reason) = state.charge_fee(self.signer, registry_address(kind), fee) {
            state.record(tx_hash, ReceiptStatus::Reverted { reason: Some(reason) }, vec![]);
            return Ok(tx_hash);
        }

        let entity_id = EntityId::from(state.next_entity);
        state.next_entity += 1;
        state
            .registrations
            .insert((kind, self.signer, request.natural_key()), entity_id);

        let events = if state.faults.drop_registration_event {
            vec![]
        } else {
            vec![LedgerEvent::new(
                kind.registration_event(),
                [
                    (kind.id_param().to_string(), entity_id.to_string()),
                    ("owner".to_string(), format!("0x{}", hex::encode(self.signer))),
                ],
            )]
        };
        state.record(tx_hash, ReceiptStatus::Success, events);
        debug!(
            "[sandbox] {} registered {} as #{}",
            kind,
            request.natural_key(),
            entity_id
        );
        Ok(tx_hash)
    }

    fn land_attachment(&self, call: &AttachmentCall) -> TxHash {
        let mut state = self.state.write();
        let key = call.key();
        let tx_hash = state.next_tx_hash(TxPurpose::Attachment(key), &key.to_string());

        let known = state
            .registrations
            .values()
            .any(|id| *id == call.entity_id());
        let status = if !known {
            ReceiptStatus::Reverted {
                reason: Some("nonexistent token".to_string()),
            }
        } else if state.faults.failing_attachments.contains(&key) {
            ReceiptStatus::Reverted {
                reason: Some(format!("{} rejected by registry", key)),
            }
        } else {
            ReceiptStatus::Success
        };

        if status == ReceiptStatus::Success {
            state
                .attachments
                .entry(call.entity_id())
                .or_default()
                .push(call.clone());
            state.attachment_txs.insert((call.entity_id(), key), tx_hash);
        }
        state.record(tx_hash, status, vec![]);
        tx_hash
    }
}
