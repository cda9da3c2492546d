//! Transaction model for multisig conversion and asset creation
//!
//! Covers the transactions this tool sends to the ledger:
//! - multisig policy changes (always wrapped in an aggregate)
//! - bonded and complete aggregates
//! - lock funds (the bond backing a bonded aggregate)
//! - cosignatures over a bonded aggregate's hash

use crate::core::fee::Amount;
use crate::core::mosaic::{MosaicDefinition, MosaicSupplyChange};
use crate::crypto::{sha256, Account, KeyError, PublicAccount};
use chrono::{DateTime, Duration, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction construction and signing errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Aggregate must contain at least one inner transaction")]
    EmptyAggregate,
    #[error("Policy change has no modifications and no threshold change")]
    EmptyPolicyChange,
    #[error("Cosignatory listed twice in one policy change: {0}")]
    DuplicateCosignatory(String),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

// =============================================================================
// Hash and Deadline
// =============================================================================

/// Hash identifying a signed transaction
///
/// Always 32 bytes; serialized as upper-case hex and validated on the way in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// SHA-256 of `data`
    pub fn digest(data: &[u8]) -> Self {
        Self::digest_parts(&[data])
    }

    /// SHA-256 of `parts` hashed as one contiguous buffer
    pub fn digest_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TransactionError::InvalidHash(hex::encode_upper(bytes)))?;
        Ok(Self(bytes))
    }

    /// Parse a 32-byte hex hash
    pub fn parse(hex_hash: &str) -> Result<Self, TransactionError> {
        let bytes =
            hex::decode(hex_hash).map_err(|_| TransactionError::InvalidHash(hex_hash.into()))?;
        Self::from_bytes(&bytes).map_err(|_| TransactionError::InvalidHash(hex_hash.into()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        TxHash::parse(&text).map_err(de::Error::custom)
    }
}

/// Absolute instant after which the ledger refuses a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(DateTime<Utc>);

impl Deadline {
    /// Deadline `horizon` after now
    pub fn after(horizon: Duration) -> Self {
        Self(Utc::now() + horizon)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.0
    }
}

// =============================================================================
// Transaction Types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    ModifyMultisig,
    AggregateBonded,
    AggregateComplete,
    LockFunds,
    MosaicDefinition,
    MosaicSupplyChange,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::ModifyMultisig => "modify-multisig",
            TransactionType::AggregateBonded => "aggregate-bonded",
            TransactionType::AggregateComplete => "aggregate-complete",
            TransactionType::LockFunds => "lock-funds",
            TransactionType::MosaicDefinition => "mosaic-definition",
            TransactionType::MosaicSupplyChange => "mosaic-supply-change",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Multisig Policy Change
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationType {
    Add,
    Remove,
}

/// Add or remove one cosignatory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignatoryModification {
    pub kind: ModificationType,
    pub cosignatory: PublicAccount,
}

/// Change to an account's signing policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyChange {
    /// Change in signatures required to approve a transaction
    pub min_approval_delta: i8,
    /// Change in signatures required to remove a cosignatory
    pub min_removal_delta: i8,
    pub modifications: Vec<CosignatoryModification>,
}

impl PolicyChange {
    /// Add one cosignatory and require it for approval and removal
    pub fn add_cosignatory(cosignatory: &PublicAccount) -> Self {
        Self {
            min_approval_delta: 1,
            min_removal_delta: 1,
            modifications: vec![CosignatoryModification {
                kind: ModificationType::Add,
                cosignatory: cosignatory.clone(),
            }],
        }
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.modifications.is_empty()
            && self.min_approval_delta == 0
            && self.min_removal_delta == 0
        {
            return Err(TransactionError::EmptyPolicyChange);
        }

        let mut seen = HashSet::new();
        for modification in &self.modifications {
            if !seen.insert(&modification.cosignatory.public_key) {
                return Err(TransactionError::DuplicateCosignatory(
                    modification.cosignatory.public_key.clone(),
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Inner Transactions
// =============================================================================

/// Body of a transaction that can be embedded in an aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum InnerBody {
    ModifyMultisig(PolicyChange),
    MosaicDefinition(MosaicDefinition),
    MosaicSupplyChange(MosaicSupplyChange),
}

impl InnerBody {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            InnerBody::ModifyMultisig(_) => TransactionType::ModifyMultisig,
            InnerBody::MosaicDefinition(_) => TransactionType::MosaicDefinition,
            InnerBody::MosaicSupplyChange(_) => TransactionType::MosaicSupplyChange,
        }
    }
}

impl From<PolicyChange> for InnerBody {
    fn from(change: PolicyChange) -> Self {
        InnerBody::ModifyMultisig(change)
    }
}

impl From<MosaicDefinition> for InnerBody {
    fn from(definition: MosaicDefinition) -> Self {
        InnerBody::MosaicDefinition(definition)
    }
}

impl From<MosaicSupplyChange> for InnerBody {
    fn from(change: MosaicSupplyChange) -> Self {
        InnerBody::MosaicSupplyChange(change)
    }
}

/// An unsigned standalone transaction; never announced on its own
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsigned<B> {
    pub deadline: Deadline,
    pub body: B,
}

impl<B: Into<InnerBody>> Unsigned<B> {
    /// Wrap for inclusion in an aggregate, with `signer` as the affected account
    pub fn to_aggregate(self, signer: &PublicAccount) -> InnerTransaction {
        InnerTransaction {
            signer: signer.clone(),
            body: self.body.into(),
        }
    }
}

pub type ModifyMultisigTransaction = Unsigned<PolicyChange>;
pub type MosaicDefinitionTransaction = Unsigned<MosaicDefinition>;
pub type MosaicSupplyChangeTransaction = Unsigned<MosaicSupplyChange>;

/// A transaction embedded in an aggregate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerTransaction {
    pub signer: PublicAccount,
    pub body: InnerBody,
}

// =============================================================================
// Aggregate and Lock Funds
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateKind {
    /// Needs cosignatures from every inner signer; must be backed by lock funds
    Bonded,
    /// Fully signed at announce time
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTransaction {
    pub kind: AggregateKind,
    pub deadline: Deadline,
    pub max_fee: Amount,
    pub inner: Vec<InnerTransaction>,
}

impl AggregateTransaction {
    /// Distinct inner signers in first-appearance order
    pub fn inner_signers(&self) -> Vec<&PublicAccount> {
        let mut seen = HashSet::new();
        let mut signers = Vec::new();
        for tx in &self.inner {
            if seen.insert(tx.signer.public_key.as_str()) {
                signers.push(&tx.signer);
            }
        }
        signers
    }

    pub fn is_bonded(&self) -> bool {
        self.kind == AggregateKind::Bonded
    }
}

/// Bond escrowed for a bonded aggregate until it is fully cosigned
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFundsTransaction {
    pub deadline: Deadline,
    pub max_fee: Amount,
    /// Namespace of the escrowed currency
    pub currency: String,
    pub amount: Amount,
    /// Blocks until the bond is released or forfeited
    pub duration: u64,
    pub aggregate_hash: TxHash,
}

/// Anything that can be signed into a [`SignedTransaction`]
pub trait Signable: Serialize {
    fn transaction_type(&self) -> TransactionType;
    fn deadline(&self) -> Deadline;
}

impl Signable for AggregateTransaction {
    fn transaction_type(&self) -> TransactionType {
        match self.kind {
            AggregateKind::Bonded => TransactionType::AggregateBonded,
            AggregateKind::Complete => TransactionType::AggregateComplete,
        }
    }

    fn deadline(&self) -> Deadline {
        self.deadline
    }
}

impl Signable for LockFundsTransaction {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::LockFunds
    }

    fn deadline(&self) -> Deadline {
        self.deadline
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// A signer's attestation over a bonded aggregate hash
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cosignature {
    /// Public key of the cosigner (hex)
    pub signer: String,
    /// Compact signature over the aggregate hash (hex)
    pub signature: String,
}

impl Cosignature {
    pub fn create(account: &Account, hash: &TxHash) -> Result<Self, KeyError> {
        let signature = account.sign(hash.as_bytes())?;
        Ok(Self {
            signer: account.public_key_hex().to_string(),
            signature: hex::encode(signature),
        })
    }

    pub fn verify(&self, hash: &TxHash) -> Result<bool, KeyError> {
        let signer = PublicAccount::from_public_key_hex(&self.signer)?;
        let signature = hex::decode(&self.signature).map_err(|_| KeyError::InvalidSignature)?;
        signer.verify(hash.as_bytes(), &signature)
    }
}

/// Standalone cosignature announced after its aggregate is on-chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignatureTransaction {
    pub parent_hash: TxHash,
    pub cosignature: Cosignature,
}

impl CosignatureTransaction {
    pub fn new(parent_hash: TxHash, cosignature: Cosignature) -> Self {
        Self {
            parent_hash,
            cosignature,
        }
    }

    pub fn verify(&self) -> Result<bool, KeyError> {
        self.cosignature.verify(&self.parent_hash)
    }
}

/// A transaction signed and ready to announce
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx_type: TransactionType,
    pub deadline: Deadline,
    /// Serialized body (hex)
    pub payload: String,
    pub hash: TxHash,
    pub signer: PublicAccount,
    /// Signature over SHA-256 of the body (hex)
    pub signature: String,
    /// Cosignatures embedded at announce time
    #[serde(default)]
    pub cosignatures: Vec<Cosignature>,
}

impl SignedTransaction {
    /// Decode the body back into its typed form
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, TransactionError> {
        let bytes = hex::decode(&self.payload)
            .map_err(|e| TransactionError::InvalidPayload(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Check the signer's signature and that the hash matches the content
    pub fn verify(&self) -> Result<bool, TransactionError> {
        let body = hex::decode(&self.payload)
            .map_err(|e| TransactionError::InvalidPayload(e.to_string()))?;
        let signature =
            hex::decode(&self.signature).map_err(|_| KeyError::InvalidSignature)?;

        if !self.signer.verify(&sha256(&body), &signature)? {
            return Ok(false);
        }

        Ok(transaction_hash(&signature, &self.signer, &body) == self.hash)
    }

    pub fn with_cosignatures(mut self, cosignatures: Vec<Cosignature>) -> Self {
        self.cosignatures = cosignatures;
        self
    }
}

/// Hash = SHA-256(signature || signer public key || body)
fn transaction_hash(signature: &[u8], signer: &PublicAccount, body: &[u8]) -> TxHash {
    TxHash::digest_parts(&[
        signature,
        signer.public_key.as_bytes(),
        body,
    ])
}

/// Sign a transaction with `signer`, producing its canonical hash
pub fn sign_transaction<T: Signable>(
    tx: &T,
    signer: &Account,
) -> Result<SignedTransaction, TransactionError> {
    let body = serde_json::to_vec(tx)?;
    let signature = signer.sign(&sha256(&body))?;
    let hash = transaction_hash(&signature, signer.public_account(), &body);

    Ok(SignedTransaction {
        tx_type: tx.transaction_type(),
        deadline: tx.deadline(),
        payload: hex::encode(&body),
        hash,
        signer: signer.public_account().clone(),
        signature: hex::encode(signature),
        cosignatures: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_aggregate(signers: &[&Account]) -> AggregateTransaction {
        let cosignatory = Account::generate();
        AggregateTransaction {
            kind: AggregateKind::Bonded,
            deadline: Deadline::after(Duration::hours(1)),
            max_fee: Amount(100),
            inner: signers
                .iter()
                .map(|a| InnerTransaction {
                    signer: a.public_account().clone(),
                    body: PolicyChange::add_cosignatory(cosignatory.public_account()).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_policy_change_validation() {
        let a = Account::generate();
        assert!(PolicyChange::add_cosignatory(a.public_account())
            .validate()
            .is_ok());

        let empty = PolicyChange {
            min_approval_delta: 0,
            min_removal_delta: 0,
            modifications: vec![],
        };
        assert!(matches!(
            empty.validate(),
            Err(TransactionError::EmptyPolicyChange)
        ));

        let threshold_only = PolicyChange {
            min_approval_delta: -1,
            min_removal_delta: 0,
            modifications: vec![],
        };
        assert!(threshold_only.validate().is_ok());

        let mut duplicated = PolicyChange::add_cosignatory(a.public_account());
        duplicated
            .modifications
            .push(duplicated.modifications[0].clone());
        assert!(matches!(
            duplicated.validate(),
            Err(TransactionError::DuplicateCosignatory(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let a = Account::generate();
        let aggregate = sample_aggregate(&[&a]);

        let signed = sign_transaction(&aggregate, &a).unwrap();
        assert_eq!(signed.tx_type, TransactionType::AggregateBonded);
        assert!(signed.verify().unwrap());

        let decoded: AggregateTransaction = signed.body().unwrap();
        assert_eq!(decoded, aggregate);
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let a = Account::generate();
        let mut signed = sign_transaction(&sample_aggregate(&[&a]), &a).unwrap();
        signed.payload = hex::encode(b"{}");
        assert!(!signed.verify().unwrap());
    }

    #[test]
    fn test_hash_ignores_embedded_cosignatures() {
        let a = Account::generate();
        let b = Account::generate();
        let signed = sign_transaction(&sample_aggregate(&[&a, &b]), &a).unwrap();
        let cosig = Cosignature::create(&b, &signed.hash).unwrap();

        let hash = signed.hash.clone();
        let with_cosig = signed.with_cosignatures(vec![cosig]);
        assert_eq!(with_cosig.hash, hash);
        assert!(with_cosig.verify().unwrap());
    }

    #[test]
    fn test_cosignature_verifies_against_hash() {
        let a = Account::generate();
        let b = Account::generate();
        let signed = sign_transaction(&sample_aggregate(&[&a, &b]), &a).unwrap();

        let cosig = Cosignature::create(&b, &signed.hash).unwrap();
        assert!(cosig.verify(&signed.hash).unwrap());

        let other = TxHash::digest(b"other");
        assert!(!cosig.verify(&other).unwrap());

        let tx = CosignatureTransaction::new(signed.hash.clone(), cosig);
        assert!(tx.verify().unwrap());
    }

    #[test]
    fn test_inner_signers_deduplicated() {
        let a = Account::generate();
        let b = Account::generate();
        let aggregate = sample_aggregate(&[&a, &b, &a]);
        let signers = aggregate.inner_signers();
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0], a.public_account());
        assert_eq!(signers[1], b.public_account());
    }

    #[test]
    fn test_tx_hash_parse() {
        let hash = TxHash::digest(b"x");
        assert_eq!(TxHash::parse(&hash.to_hex()).unwrap(), hash);
        assert_eq!(TxHash::parse(&hash.to_hex().to_lowercase()).unwrap(), hash);
        assert!(TxHash::parse("abcd").is_err());
        assert!(TxHash::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_tx_hash_rejects_malformed_json() {
        let hash = TxHash::digest(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash));
        assert_eq!(serde_json::from_str::<TxHash>(&json).unwrap(), hash);

        assert!(serde_json::from_str::<TxHash>("\"\"").is_err());
        assert!(serde_json::from_str::<TxHash>("\"not hex\"").is_err());
        assert!(serde_json::from_str::<TxHash>("\"ABCD\"").is_err());
    }

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::after(Duration::hours(1));
        assert!(!deadline.is_expired_at(Utc::now()));
        assert!(deadline.is_expired_at(Utc::now() + Duration::hours(2)));
    }
}
