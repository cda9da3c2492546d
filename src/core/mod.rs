//! Core transaction components
//!
//! This module contains the building blocks every tool shares:
//! - Amounts and the fee schedule
//! - Transactions (policy changes, aggregates, lock funds, cosignatures)
//! - Asset (mosaic) definitions
//! - The transaction builder

pub mod builder;
pub mod fee;
pub mod mosaic;
pub mod transaction;

pub use builder::{TransactionBuilder, DEFAULT_DEADLINE_HOURS, DEFAULT_FEE_CURRENCY};
pub use fee::{Amount, FeeSchedule, DIVISIBILITY, UNIT};
pub use mosaic::{
    MosaicDefinition, MosaicFlags, MosaicId, MosaicProperties, MosaicSupplyChange,
    SupplyDirection,
};
pub use transaction::{
    sign_transaction, AggregateKind, AggregateTransaction, Cosignature,
    CosignatoryModification, CosignatureTransaction, Deadline, InnerBody, InnerTransaction,
    LockFundsTransaction, ModificationType, ModifyMultisigTransaction, PolicyChange, Signable,
    SignedTransaction, TransactionError, TransactionType, TxHash, Unsigned,
};
