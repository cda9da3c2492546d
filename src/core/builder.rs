//! Transaction builder
//!
//! Turns typed parameters into unsigned transactions. Nothing here touches
//! the network; every transaction gets a deadline fixed when it is built.

use crate::core::fee::{Amount, FeeSchedule};
use crate::core::mosaic::{
    MosaicDefinition, MosaicProperties, MosaicSupplyChange, SupplyDirection,
};
use crate::core::transaction::{
    AggregateKind, AggregateTransaction, CosignatureTransaction, Cosignature, Deadline,
    InnerTransaction, LockFundsTransaction, ModifyMultisigTransaction,
    MosaicDefinitionTransaction, MosaicSupplyChangeTransaction, PolicyChange, TransactionError,
    TxHash, Unsigned,
};
use crate::crypto::PublicAccount;
use chrono::Duration;

/// Default deadline horizon in hours
pub const DEFAULT_DEADLINE_HOURS: i64 = 1;

/// Namespace of the ledger's fee currency
pub const DEFAULT_FEE_CURRENCY: &str = "prx.xpx";

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    fees: FeeSchedule,
    currency: String,
    horizon: Duration,
}

impl TransactionBuilder {
    pub fn new(fees: FeeSchedule, currency: impl Into<String>) -> Self {
        Self {
            fees,
            currency: currency.into(),
            horizon: Duration::hours(DEFAULT_DEADLINE_HOURS),
        }
    }

    /// Override how far in the future deadlines are placed
    pub fn with_deadline_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.horizon)
    }

    /// Multisig policy change, to be wrapped with [`Unsigned::to_aggregate`]
    pub fn policy_change(
        &self,
        change: PolicyChange,
    ) -> Result<ModifyMultisigTransaction, TransactionError> {
        change.validate()?;
        Ok(Unsigned {
            deadline: self.deadline(),
            body: change,
        })
    }

    /// Aggregate that stays pending until every inner signer has cosigned
    pub fn bonded_aggregate(
        &self,
        inner: Vec<InnerTransaction>,
    ) -> Result<AggregateTransaction, TransactionError> {
        self.aggregate(AggregateKind::Bonded, inner)
    }

    /// Aggregate signed entirely by its announcer
    pub fn complete_aggregate(
        &self,
        inner: Vec<InnerTransaction>,
    ) -> Result<AggregateTransaction, TransactionError> {
        self.aggregate(AggregateKind::Complete, inner)
    }

    fn aggregate(
        &self,
        kind: AggregateKind,
        inner: Vec<InnerTransaction>,
    ) -> Result<AggregateTransaction, TransactionError> {
        if inner.is_empty() {
            return Err(TransactionError::EmptyAggregate);
        }

        Ok(AggregateTransaction {
            kind,
            deadline: self.deadline(),
            max_fee: self.fees.aggregate_fee(inner.len()),
            inner,
        })
    }

    /// Bond keyed to the hash of a signed bonded aggregate
    pub fn lock_funds(&self, aggregate_hash: &TxHash) -> LockFundsTransaction {
        LockFundsTransaction {
            deadline: self.deadline(),
            max_fee: self.fees.lock_fund_tx_fee,
            currency: self.currency.clone(),
            amount: self.fees.lock_fund,
            duration: self.fees.lock_duration,
            aggregate_hash: aggregate_hash.clone(),
        }
    }

    pub fn cosignature(
        &self,
        aggregate_hash: &TxHash,
        cosignature: Cosignature,
    ) -> CosignatureTransaction {
        CosignatureTransaction::new(aggregate_hash.clone(), cosignature)
    }

    pub fn mosaic_definition(
        &self,
        owner: &PublicAccount,
        nonce: u32,
        properties: MosaicProperties,
    ) -> MosaicDefinitionTransaction {
        Unsigned {
            deadline: self.deadline(),
            body: MosaicDefinition::new(nonce, owner, properties),
        }
    }

    pub fn mosaic_supply_increase(
        &self,
        definition: &MosaicDefinition,
        delta: Amount,
    ) -> MosaicSupplyChangeTransaction {
        Unsigned {
            deadline: self.deadline(),
            body: MosaicSupplyChange {
                mosaic_id: definition.mosaic_id,
                direction: SupplyDirection::Increase,
                delta,
            },
        }
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new(FeeSchedule::default(), DEFAULT_FEE_CURRENCY)
    }
}
