//! In-memory ledger
//!
//! Implements [`LedgerClient`] without a node. It records every call in
//! order and enforces the settlement rules the workflow depends on:
//! - a bonded aggregate is refused unless lock funds for its hash are confirmed
//! - a cosignature is refused unless its aggregate was announced
//! - bonded aggregates only go through the bonded path
//!
//! A bonded aggregate counts as confirmed once it is accepted as pending
//! cosignature, which is what the sequencer waits for.

use crate::core::{
    Amount, Cosignature, CosignatureTransaction, LockFundsTransaction, SignedTransaction,
    TransactionType, TxHash,
};
use crate::ledger::{
    AccountInfo, Announcement, AssetHolding, AssetId, LedgerClient, LedgerError,
    TransactionStatus,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// One call made against the ledger, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    ResolveNamespace(String),
    AccountInfo(String),
    Announce { hash: TxHash, tx_type: TransactionType },
    AnnounceBonded(TxHash),
    AnnounceCosignature { parent: TxHash, signer: String },
    TransactionStatus(TxHash),
}

impl LedgerCall {
    /// Whether this call submitted something to the ledger
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            LedgerCall::Announce { .. }
                | LedgerCall::AnnounceBonded(_)
                | LedgerCall::AnnounceCosignature { .. }
        )
    }
}

#[derive(Debug)]
struct Tracked {
    tx_type: TransactionType,
    status: TransactionStatus,
    polls_remaining: u32,
    /// Aggregate hash backed by this transaction when it is lock funds
    lock_target: Option<TxHash>,
}

#[derive(Debug, Default)]
struct LedgerState {
    namespaces: HashMap<String, AssetId>,
    accounts: HashMap<String, AccountInfo>,
    transactions: HashMap<TxHash, Tracked>,
    confirmed_locks: HashSet<TxHash>,
    cosignatures: HashMap<TxHash, Vec<Cosignature>>,
    calls: Vec<LedgerCall>,
    confirm_after: u32,
    never_confirm: HashSet<TransactionType>,
    rejected_types: HashSet<TransactionType>,
    rejected_cosigners: HashSet<String>,
    failing_reads: u32,
    height: u64,
}

impl LedgerState {
    fn take_read_failure(&mut self) -> Result<(), LedgerError> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(LedgerError::ConnectionFailed("simulated outage".to_string()));
        }
        Ok(())
    }

    fn track(&mut self, tx: &SignedTransaction, lock_target: Option<TxHash>) {
        self.transactions.insert(
            tx.hash.clone(),
            Tracked {
                tx_type: tx.tx_type,
                status: TransactionStatus::Pending,
                polls_remaining: self.confirm_after,
                lock_target,
            },
        );
    }

    fn check_signed(&self, tx: &SignedTransaction) -> Result<(), LedgerError> {
        if self.rejected_types.contains(&tx.tx_type) {
            return Err(rejected(&tx.hash, "transaction type refused by ledger"));
        }
        if !tx.verify().unwrap_or(false) {
            return Err(rejected(&tx.hash, "Failure_Signature_Not_Verifiable"));
        }
        if self.transactions.contains_key(&tx.hash) {
            return Err(rejected(&tx.hash, "Failure_Hash_Exists"));
        }
        for cosignature in &tx.cosignatures {
            if !cosignature.verify(&tx.hash).unwrap_or(false) {
                return Err(rejected(&tx.hash, "Failure_Aggregate_Invalid_Cosignature"));
            }
        }
        Ok(())
    }
}

fn rejected(hash: &TxHash, reason: &str) -> LedgerError {
    LedgerError::Rejected {
        hash: hash.clone(),
        reason: reason.to_string(),
    }
}

fn accepted(hash: &TxHash) -> Announcement {
    Announcement {
        hash: hash.clone(),
        message: "packet 9 was pushed to the network via /transaction".to_string(),
    }
}

/// Recording fake of a ledger node
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace resolving to `asset_id`
    pub fn with_namespace(mut self, name: &str, asset_id: AssetId) -> Self {
        self.state
            .get_mut()
            .namespaces
            .insert(name.to_string(), asset_id);
        self
    }

    /// Give `address` a holding of `amount` in `asset_id`
    pub fn with_balance(mut self, address: &str, asset_id: AssetId, amount: Amount) -> Self {
        let info = self
            .state
            .get_mut()
            .accounts
            .entry(address.to_string())
            .or_insert_with(|| AccountInfo {
                address: address.to_string(),
                holdings: Vec::new(),
            });
        info.holdings.push(AssetHolding { asset_id, amount });
        self
    }

    /// Report announced transactions as pending for `polls` status queries
    pub fn confirm_after(mut self, polls: u32) -> Self {
        self.state.get_mut().confirm_after = polls;
        self
    }

    /// Never confirm transactions of this type
    pub fn never_confirm(mut self, tx_type: TransactionType) -> Self {
        self.state.get_mut().never_confirm.insert(tx_type);
        self
    }

    /// Reject every announcement of this type
    pub fn reject(mut self, tx_type: TransactionType) -> Self {
        self.state.get_mut().rejected_types.insert(tx_type);
        self
    }

    /// Reject cosignatures from this public key
    pub fn reject_cosigner(mut self, public_key: &str) -> Self {
        self.state
            .get_mut()
            .rejected_cosigners
            .insert(public_key.to_string());
        self
    }

    /// Fail the next `count` reads with a transient error
    pub fn fail_reads(mut self, count: u32) -> Self {
        self.state.get_mut().failing_reads = count;
        self
    }

    pub async fn calls(&self) -> Vec<LedgerCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn submissions(&self) -> Vec<LedgerCall> {
        self.calls()
            .await
            .into_iter()
            .filter(LedgerCall::is_submission)
            .collect()
    }

    /// Cosignatures received for an aggregate, embedded and standalone
    pub async fn cosignatures_for(&self, hash: &TxHash) -> Vec<Cosignature> {
        self.state
            .lock()
            .await
            .cosignatures
            .get(hash)
            .cloned()
            .unwrap_or_default()
    }
}

impl LedgerClient for InMemoryLedger {
    async fn resolve_namespace(&self, name: &str) -> Result<AssetId, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::ResolveNamespace(name.to_string()));
        state.take_read_failure()?;

        state
            .namespaces
            .get(name)
            .copied()
            .ok_or_else(|| LedgerError::NotFound(format!("namespace {}", name)))
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::AccountInfo(address.to_string()));
        state.take_read_failure()?;

        state
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", address)))
    }

    async fn announce(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::Announce {
            hash: tx.hash.clone(),
            tx_type: tx.tx_type,
        });

        if tx.tx_type == TransactionType::AggregateBonded {
            return Err(rejected(
                &tx.hash,
                "bonded aggregates must be announced through the bonded path",
            ));
        }
        state.check_signed(tx)?;

        let lock_target = if tx.tx_type == TransactionType::LockFunds {
            let lock: LockFundsTransaction = tx
                .body()
                .map_err(|e| rejected(&tx.hash, &e.to_string()))?;
            Some(lock.aggregate_hash)
        } else {
            None
        };

        state.track(tx, lock_target);
        Ok(accepted(&tx.hash))
    }

    async fn announce_bonded(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::AnnounceBonded(tx.hash.clone()));

        if tx.tx_type != TransactionType::AggregateBonded {
            return Err(rejected(&tx.hash, "only bonded aggregates use the bonded path"));
        }
        state.check_signed(tx)?;
        if !state.confirmed_locks.contains(&tx.hash) {
            return Err(rejected(&tx.hash, "Failure_LockHash_Inactive_Hash"));
        }

        state.track(tx, None);
        state
            .cosignatures
            .insert(tx.hash.clone(), tx.cosignatures.clone());
        Ok(accepted(&tx.hash))
    }

    async fn announce_cosignature(
        &self,
        tx: &CosignatureTransaction,
    ) -> Result<Announcement, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::AnnounceCosignature {
            parent: tx.parent_hash.clone(),
            signer: tx.cosignature.signer.clone(),
        });

        let announced = state
            .transactions
            .get(&tx.parent_hash)
            .map(|t| t.tx_type == TransactionType::AggregateBonded)
            .unwrap_or(false);
        if !announced {
            return Err(rejected(&tx.parent_hash, "Failure_Aggregate_Missing_Parent"));
        }
        if state.rejected_cosigners.contains(&tx.cosignature.signer) {
            return Err(rejected(&tx.parent_hash, "cosigner refused by ledger"));
        }
        if !tx.verify().unwrap_or(false) {
            return Err(rejected(&tx.parent_hash, "Failure_Signature_Not_Verifiable"));
        }

        let received = state.cosignatures.entry(tx.parent_hash.clone()).or_default();
        if received.iter().any(|c| c.signer == tx.cosignature.signer) {
            return Err(rejected(&tx.parent_hash, "Failure_Aggregate_Redundant_Cosignatures"));
        }
        received.push(tx.cosignature.clone());

        Ok(accepted(&tx.parent_hash))
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TransactionStatus, LedgerError> {
        let mut state = self.state.lock().await;
        state.calls.push(LedgerCall::TransactionStatus(hash.clone()));
        state.take_read_failure()?;

        let never_confirm = state.never_confirm.clone();
        let next_height = state.height + 1;
        let Some(tracked) = state.transactions.get_mut(hash) else {
            return Ok(TransactionStatus::Unknown);
        };

        if tracked.status != TransactionStatus::Pending || never_confirm.contains(&tracked.tx_type)
        {
            return Ok(tracked.status.clone());
        }

        if tracked.polls_remaining > 0 {
            tracked.polls_remaining -= 1;
            return Ok(TransactionStatus::Pending);
        }

        tracked.status = TransactionStatus::Confirmed {
            height: next_height,
        };
        let status = tracked.status.clone();
        let lock_target = tracked.lock_target.clone();

        state.height = next_height;
        if let Some(aggregate_hash) = lock_target {
            state.confirmed_locks.insert(aggregate_hash);
        }

        Ok(status)
    }
}
