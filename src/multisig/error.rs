//! Workflow errors
//!
//! Insufficient balance and partial completion are outcomes, not errors;
//! see [`BatchOutcome`](super::BatchOutcome) and
//! [`SettlementOutcome`](super::SettlementOutcome).

use crate::core::{TransactionError, TxHash};
use crate::crypto::KeyError;
use crate::ledger::{ConfirmationError, LedgerError};
use crate::multisig::sequencer::WorkflowState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Batch has no target accounts")]
    EmptyBatch,
    #[error("Only bonded aggregates go through cosignature collection")]
    NotBonded,
    #[error("Cosigner listed twice: {0}")]
    DuplicateCosigner(String),
    #[error("Initiator {0} cannot cosign its own aggregate")]
    InitiatorAsCosigner(String),
    #[error("No cosigner supplied for inner signer {0}")]
    MissingCosigner(String),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Submission failed at {state}: {source}")]
    Submission {
        state: WorkflowState,
        /// Bond announced for this instance, if any
        lock_hash: Option<TxHash>,
        #[source]
        source: LedgerError,
    },
    #[error("Settlement failed at {state}: {source}")]
    Settlement {
        state: WorkflowState,
        lock_hash: Option<TxHash>,
        #[source]
        source: ConfirmationError,
    },
}

impl WorkflowError {
    /// State the workflow instance was abandoned in, if it got that far
    pub fn state(&self) -> Option<WorkflowState> {
        match self {
            WorkflowError::Submission { state, .. } | WorkflowError::Settlement { state, .. } => {
                Some(*state)
            }
            _ => None,
        }
    }

    /// Bond announced before the instance was abandoned
    pub fn lock_hash(&self) -> Option<&TxHash> {
        match self {
            WorkflowError::Submission { lock_hash, .. }
            | WorkflowError::Settlement { lock_hash, .. } => lock_hash.as_ref(),
            _ => None,
        }
    }

    /// Whether a bond may be sitting in escrow until it expires
    pub fn bond_escrowed(&self) -> bool {
        self.state()
            .map(|s| s >= WorkflowState::BondSubmitted)
            .unwrap_or(false)
    }
}
