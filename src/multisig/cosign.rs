//! Cosignature collection
//!
//! The initiator signs the bonded aggregate first, which fixes its hash.
//! Every other required signer then signs that hash. All keys are held
//! locally; there is no interactive signing round.

use crate::core::{sign_transaction, AggregateTransaction, Cosignature, SignedTransaction, TxHash};
use crate::crypto::{Account, PublicAccount};
use crate::multisig::error::WorkflowError;
use std::collections::HashSet;

/// Bonded aggregate signed by its initiator, with every cosignature collected
#[derive(Clone, Debug)]
pub struct SignedBondedAggregate {
    /// Initiator-signed aggregate, without embedded cosignatures
    pub transaction: SignedTransaction,
    /// Cosignatures over [`Self::hash`], in the order cosigners were supplied
    pub cosignatures: Vec<Cosignature>,
}

impl SignedBondedAggregate {
    pub fn hash(&self) -> &TxHash {
        &self.transaction.hash
    }

    pub fn initiator(&self) -> &PublicAccount {
        &self.transaction.signer
    }

    /// Public keys of the cosigners, in collection order
    pub fn cosigners(&self) -> Vec<&str> {
        self.cosignatures.iter().map(|c| c.signer.as_str()).collect()
    }

    /// Check every cosignature against the aggregate hash
    pub fn verify_cosignatures(&self) -> Result<bool, WorkflowError> {
        for cosignature in &self.cosignatures {
            if !cosignature.verify(self.hash())? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Sign `aggregate` as `initiator` and collect a cosignature from each cosigner
///
/// Every inner signer other than the initiator must appear among the
/// cosigners; additional cosigners (such as a cosignatory being added that
/// must opt in) are allowed.
pub fn cosign(
    aggregate: &AggregateTransaction,
    initiator: &Account,
    cosigners: &[Account],
) -> Result<SignedBondedAggregate, WorkflowError> {
    if !aggregate.is_bonded() {
        return Err(WorkflowError::NotBonded);
    }

    let mut seen = HashSet::new();
    for cosigner in cosigners {
        if cosigner == initiator {
            return Err(WorkflowError::InitiatorAsCosigner(
                initiator.address().to_string(),
            ));
        }
        if !seen.insert(cosigner.public_key_hex()) {
            return Err(WorkflowError::DuplicateCosigner(
                cosigner.address().to_string(),
            ));
        }
    }

    for signer in aggregate.inner_signers() {
        if signer.public_key != initiator.public_key_hex()
            && !seen.contains(signer.public_key.as_str())
        {
            return Err(WorkflowError::MissingCosigner(signer.address.clone()));
        }
    }

    let transaction = sign_transaction(aggregate, initiator)?;
    let cosignatures = cosigners
        .iter()
        .map(|cosigner| Cosignature::create(cosigner, &transaction.hash))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Collected {} cosignature(s) for {}",
        cosignatures.len(),
        transaction.hash
    );

    Ok(SignedBondedAggregate {
        transaction,
        cosignatures,
    })
}
