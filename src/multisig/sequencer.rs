//! Settlement sequencer
//!
//! Drives one signed bonded aggregate through the ledger:
//!
//! ```text
//! Built -> BondSubmitted -> BondSettled -> AggregateAnnounced
//!       -> AggregateSettled -> CosignaturesSubmitted -> Done
//! ```
//!
//! The bonded aggregate is never announced before its bond has been observed
//! as confirmed. A failure abandons the instance where it stands; nothing
//! already submitted is rolled back or resubmitted.

use crate::core::{sign_transaction, TransactionBuilder, TxHash};
use crate::crypto::Account;
use crate::ledger::{await_confirmation, LedgerClient, PollPolicy, SubmissionGate};
use crate::multisig::cosign::SignedBondedAggregate;
use crate::multisig::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a workflow instance currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkflowState {
    Built,
    BondSubmitted,
    BondSettled,
    AggregateAnnounced,
    AggregateSettled,
    CosignaturesSubmitted,
    Done,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Built => "BUILT",
            WorkflowState::BondSubmitted => "BOND_SUBMITTED",
            WorkflowState::BondSettled => "BOND_SETTLED",
            WorkflowState::AggregateAnnounced => "AGGREGATE_ANNOUNCED",
            WorkflowState::AggregateSettled => "AGGREGATE_SETTLED",
            WorkflowState::CosignaturesSubmitted => "COSIGNATURES_SUBMITTED",
            WorkflowState::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}

/// Settlement tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SettlementConfig {
    #[serde(flatten)]
    pub poll: PollPolicy,
    /// Attach cosignatures to the bonded announcement instead of sending
    /// them one by one afterwards
    pub embed_cosignatures: bool,
}

/// What happened to a settled instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub aggregate_hash: TxHash,
    pub lock_hash: TxHash,
    pub state: WorkflowState,
    pub cosignatures_submitted: usize,
    pub lock_height: u64,
    pub aggregate_height: u64,
}

/// How far settlement got without an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Completed(SettlementReport),
    /// The aggregate is on the ledger but some cosignatures were not
    /// accepted; they must be supplied by hand before the bond expires.
    PartiallyCompleted {
        report: SettlementReport,
        /// Public keys whose cosignature is still outstanding
        missing: Vec<String>,
        reason: String,
    },
}

impl SettlementOutcome {
    /// Get the report whichever way settlement ended
    pub fn report(&self) -> &SettlementReport {
        match self {
            SettlementOutcome::Completed(report) => report,
            SettlementOutcome::PartiallyCompleted { report, .. } => report,
        }
    }

    /// Whether every cosignature was accepted
    pub fn is_complete(&self) -> bool {
        matches!(self, SettlementOutcome::Completed(_))
    }
}

/// Runs the bonded settlement steps for one aggregate at a time
pub struct SettlementSequencer<'a, C> {
    client: &'a C,
    builder: &'a TransactionBuilder,
    config: SettlementConfig,
    gate: &'a SubmissionGate,
}

impl<'a, C: LedgerClient> SettlementSequencer<'a, C> {
    /// Create a sequencer over borrowed services
    pub fn new(
        client: &'a C,
        builder: &'a TransactionBuilder,
        config: SettlementConfig,
        gate: &'a SubmissionGate,
    ) -> Self {
        Self {
            client,
            builder,
            config,
            gate,
        }
    }

    fn policy(&self) -> &PollPolicy {
        &self.config.poll
    }

    /// Bond, wait, announce, wait, then submit the remaining cosignatures
    pub async fn run(
        &self,
        signed: &SignedBondedAggregate,
        bond_payer: &Account,
    ) -> Result<SettlementOutcome, WorkflowError> {
        let aggregate_hash = signed.hash().clone();
        let mut state = WorkflowState::Built;

        // 1. Bond keyed to the aggregate hash
        let lock = self.builder.lock_funds(&aggregate_hash);
        let signed_lock = sign_transaction(&lock, bond_payer)?;
        {
            let _slot = self.gate.acquire(bond_payer.public_key_hex()).await;
            self.client
                .announce(&signed_lock)
                .await
                .map_err(|source| WorkflowError::Submission {
                    state,
                    lock_hash: None,
                    source,
                })?;
        }
        state = WorkflowState::BondSubmitted;
        log::info!(
            "Lock funds {} announced for aggregate {}",
            signed_lock.hash,
            aggregate_hash
        );

        // 2. Bond must be observed as confirmed
        let lock_height = await_confirmation(self.client, &signed_lock.hash, self.policy())
            .await
            .map_err(|source| WorkflowError::Settlement {
                state,
                lock_hash: Some(signed_lock.hash.clone()),
                source,
            })?;
        state = WorkflowState::BondSettled;

        // 3. Bonded announcement
        let embed = self.config.embed_cosignatures;
        let announced = if embed {
            signed.transaction.clone().with_cosignatures(signed.cosignatures.clone())
        } else {
            signed.transaction.clone()
        };
        {
            let _slot = self.gate.acquire(&signed.initiator().public_key).await;
            self.client
                .announce_bonded(&announced)
                .await
                .map_err(|source| WorkflowError::Submission {
                    state,
                    lock_hash: Some(signed_lock.hash.clone()),
                    source,
                })?;
        }
        state = WorkflowState::AggregateAnnounced;
        log::info!("Bonded aggregate {} announced", aggregate_hash);

        // 4. Accepted as pending cosignature
        let aggregate_height = await_confirmation(self.client, &aggregate_hash, self.policy())
            .await
            .map_err(|source| WorkflowError::Settlement {
                state,
                lock_hash: Some(signed_lock.hash.clone()),
                source,
            })?;
        state = WorkflowState::AggregateSettled;

        let mut report = SettlementReport {
            aggregate_hash: aggregate_hash.clone(),
            lock_hash: signed_lock.hash.clone(),
            state,
            cosignatures_submitted: if embed { signed.cosignatures.len() } else { 0 },
            lock_height,
            aggregate_height,
        };

        // 5. Standalone cosignatures
        if !embed {
            for (index, cosignature) in signed.cosignatures.iter().enumerate() {
                let tx = self
                    .builder
                    .cosignature(&aggregate_hash, cosignature.clone());
                let result = {
                    let _slot = self.gate.acquire(&cosignature.signer).await;
                    self.client.announce_cosignature(&tx).await
                };

                if let Err(e) = result {
                    let missing: Vec<String> = signed.cosignatures[index..]
                        .iter()
                        .map(|c| c.signer.clone())
                        .collect();
                    log::warn!(
                        "Cosignature from {} refused for {}: {} ({} outstanding)",
                        cosignature.signer,
                        aggregate_hash,
                        e,
                        missing.len()
                    );
                    return Ok(SettlementOutcome::PartiallyCompleted {
                        report,
                        missing,
                        reason: e.to_string(),
                    });
                }
                report.cosignatures_submitted += 1;
            }
        }
        report.state = WorkflowState::CosignaturesSubmitted;
        log::debug!(
            "{} cosignature(s) submitted for {}",
            report.cosignatures_submitted,
            aggregate_hash
        );

        // 6. Nothing retained
        report.state = WorkflowState::Done;
        Ok(SettlementOutcome::Completed(report))
    }
}
