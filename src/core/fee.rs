//! Amounts and fee schedule
//!
//! Every fee this tool has to budget for before submitting:
//! - the aggregate's max fee (per inner transaction)
//! - the bond escrowed by lock funds, and the lock funds transaction fee
//! - the rental fee charged per created asset

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

// =============================================================================
// Constants
// =============================================================================

/// Decimal places of the fee currency
pub const DIVISIBILITY: u32 = 6;

/// Micro-units per whole unit of the fee currency
pub const UNIT: u64 = 10u64.pow(DIVISIBILITY);

/// Bond escrowed by lock funds (10 units)
pub const DEFAULT_LOCK_FUND: u64 = 10 * UNIT;

/// Fee paid for announcing the lock funds transaction (26.7 units)
pub const DEFAULT_LOCK_FUND_TX_FEE: u64 = 26_700_000;

/// Lock duration in blocks
pub const DEFAULT_LOCK_DURATION: u64 = 100;

/// Max fee budgeted per inner transaction of an aggregate (18.15 units)
pub const DEFAULT_INNER_TX_FEE: u64 = 18_150_000;

/// Rental fee charged by the ledger per asset definition (1000 units)
pub const DEFAULT_ASSET_RENTAL_FEE: u64 = 1000 * UNIT;

// =============================================================================
// Amount
// =============================================================================

/// Quantity of an asset in its smallest unit
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Create from whole units of the fee currency
    pub fn from_whole(whole: u64) -> Self {
        Self(whole.saturating_mul(UNIT))
    }

    /// Multiply by a count, saturating at the maximum
    pub fn times(&self, count: usize) -> Self {
        Self(self.0.saturating_mul(count as u64))
    }

    /// How many times `per_item` fits into this amount
    pub fn fits(&self, per_item: Amount) -> u64 {
        if per_item.0 == 0 {
            u64::MAX
        } else {
            self.0 / per_item.0
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            let frac = format!("{:06}", frac);
            write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
        }
    }
}

// =============================================================================
// Fee Schedule
// =============================================================================

/// Fixed costs used to size transactions and balance checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Max fee budgeted per inner transaction of an aggregate
    pub inner_tx_fee: Amount,
    /// Bond escrowed by lock funds
    pub lock_fund: Amount,
    /// Fee for the lock funds transaction itself
    pub lock_fund_tx_fee: Amount,
    /// Lock duration in blocks
    pub lock_duration: u64,
    /// Rental fee per created asset
    pub asset_rental_fee: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            inner_tx_fee: Amount(DEFAULT_INNER_TX_FEE),
            lock_fund: Amount(DEFAULT_LOCK_FUND),
            lock_fund_tx_fee: Amount(DEFAULT_LOCK_FUND_TX_FEE),
            lock_duration: DEFAULT_LOCK_DURATION,
            asset_rental_fee: Amount(DEFAULT_ASSET_RENTAL_FEE),
        }
    }
}

impl FeeSchedule {
    /// Max fee for an aggregate carrying `inner_count` transactions
    pub fn aggregate_fee(&self, inner_count: usize) -> Amount {
        self.inner_tx_fee.times(inner_count)
    }

    /// Bond plus the fee for announcing it
    pub fn bond_total(&self) -> Amount {
        self.lock_fund + self.lock_fund_tx_fee
    }

    /// Everything a sponsor needs to hold to announce a bonded aggregate
    pub fn bonded_total(&self, aggregate_fee: Amount) -> Amount {
        aggregate_fee + self.bond_total()
    }

    /// Cost of creating one asset (rental plus definition and supply change)
    pub fn per_asset(&self) -> Amount {
        self.asset_rental_fee + self.aggregate_fee(2)
    }

    /// Everything an owner needs to hold to create `count` assets
    pub fn asset_total(&self, count: usize) -> Amount {
        self.per_asset().times(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_display() {
        assert_eq!(Amount(DEFAULT_LOCK_FUND).to_string(), "10");
        assert_eq!(Amount(DEFAULT_LOCK_FUND_TX_FEE).to_string(), "26.7");
        assert_eq!(Amount(1).to_string(), "0.000001");
    }

    #[test]
    fn test_amount_arithmetic_saturates() {
        assert_eq!(Amount(u64::MAX) + Amount(1), Amount(u64::MAX));
        assert_eq!(Amount(u64::MAX).times(2), Amount(u64::MAX));
        let total: Amount = vec![Amount(1), Amount(2), Amount(3)].into_iter().sum();
        assert_eq!(total, Amount(6));
    }

    #[test]
    fn test_bonded_total() {
        let fees = FeeSchedule {
            inner_tx_fee: Amount(100),
            lock_fund: Amount(10),
            lock_fund_tx_fee: Amount(10),
            ..Default::default()
        };

        assert_eq!(fees.aggregate_fee(10), Amount(1000));
        assert_eq!(fees.bonded_total(fees.aggregate_fee(10)), Amount(1020));
    }

    #[test]
    fn test_asset_total() {
        let fees = FeeSchedule::default();
        // 1000 rental + 2 * 18.15 = 1036.3 per asset
        assert_eq!(fees.per_asset(), Amount(1_036_300_000));
        assert_eq!(fees.asset_total(3), Amount(3_108_900_000));
        assert_eq!(Amount::from_whole(2100).fits(fees.per_asset()), 2);
    }
}
