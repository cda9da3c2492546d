//! Multisig provisioner: account conversion and asset creation for a ledger
//!
//! This crate provides:
//! - secp256k1 accounts, signing and Base58Check addresses
//! - Policy-change, bonded/complete aggregate, lock funds and cosignature transactions
//! - A ledger client boundary with a TCP JSON-RPC client and an in-memory ledger
//! - Balance checks that fail closed before anything is submitted
//! - The bond, announce and cosign settlement workflow for multisig batches
//! - Asset creation in a single complete aggregate
//!
//! # Example
//!
//! ```rust
//! use multisig_provisioner::core::{PolicyChange, TransactionBuilder};
//! use multisig_provisioner::crypto::Account;
//! use multisig_provisioner::multisig::cosign;
//!
//! let builder = TransactionBuilder::default();
//! let (sponsor, other, cosigner) = (Account::generate(), Account::generate(), Account::generate());
//!
//! let inner = [&sponsor, &other]
//!     .iter()
//!     .map(|target| {
//!         builder
//!             .policy_change(PolicyChange::add_cosignatory(cosigner.public_account()))
//!             .unwrap()
//!             .to_aggregate(target.public_account())
//!     })
//!     .collect();
//! let aggregate = builder.bonded_aggregate(inner).unwrap();
//!
//! let signed = cosign(&aggregate, &sponsor, &[other]).unwrap();
//! assert_eq!(signed.cosignatures.len(), 1);
//! println!("Aggregate hash: {}", signed.hash());
//! ```

pub mod asset;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod keyfile;
pub mod ledger;
pub mod multisig;

// Re-export commonly used types
pub use asset::{AssetIssuer, IssueOutcome};
pub use config::Config;
pub use self::core::{Amount, FeeSchedule, TransactionBuilder, TxHash};
pub use crypto::{Account, PublicAccount};
pub use ledger::{BalanceOracle, InMemoryLedger, LedgerClient, RpcClient};
pub use multisig::{
    cosign, BatchDriver, BatchOutcome, SettlementOutcome, SettlementSequencer, WorkflowContext,
};
