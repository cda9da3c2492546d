//! Multisig conversion workflow
//!
//! Converts ordinary accounts into multisig accounts through one bonded
//! aggregate:
//!
//! 1. [`BatchDriver`] plans the aggregate and checks the sponsor's balance
//! 2. [`cosign`] signs it as the sponsor and collects every cosignature
//! 3. [`SettlementSequencer`] escrows the bond, waits for it, announces the
//!    aggregate and submits the cosignatures
//!
//! # Example
//!
//! ```ignore
//! let context = WorkflowContext::from_config(client, &config);
//! match BatchDriver::new(&context).run(&targets, cosigner.public_account(), &[]).await? {
//!     BatchOutcome::Aborted(check) => println!("short by {}", check.shortfall()),
//!     BatchOutcome::Settled(outcome) => println!("{}", outcome.report().aggregate_hash),
//! }
//! ```

pub mod batch;
pub mod context;
pub mod cosign;
pub mod error;
pub mod sequencer;

pub use batch::{BatchDriver, BatchOutcome, BatchPlan};
pub use context::WorkflowContext;
pub use cosign::{cosign, SignedBondedAggregate};
pub use error::WorkflowError;
pub use sequencer::{
    SettlementConfig, SettlementOutcome, SettlementReport, SettlementSequencer, WorkflowState,
};
