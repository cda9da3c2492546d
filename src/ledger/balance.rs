//! Balance oracle
//!
//! Reads an account's fee-currency holding and decides whether it covers a
//! required total. The check fails closed: any lookup failure counts as
//! insufficient. Balances are read fresh on every check.

use crate::core::Amount;
use crate::ledger::{with_read_retries, AssetId, LedgerClient, LedgerError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Default number of retries for a transient read failure
pub const DEFAULT_READ_RETRIES: u32 = 3;

/// One read of an account's fee-currency holding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub address: String,
    pub asset_id: AssetId,
    pub amount: Amount,
    pub taken_at: DateTime<Utc>,
}

/// Outcome of a sufficiency check, kept for operator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceCheck {
    pub address: String,
    pub required: Amount,
    /// `None` when the balance could not be read
    pub snapshot: Option<BalanceSnapshot>,
}

impl BalanceCheck {
    pub fn balance(&self) -> Amount {
        self.snapshot
            .as_ref()
            .map(|s| s.amount)
            .unwrap_or(Amount::ZERO)
    }

    pub fn is_sufficient(&self) -> bool {
        self.snapshot
            .as_ref()
            .map(|s| covers(s.amount, self.required))
            .unwrap_or(false)
    }

    /// How much more the account needs to hold
    pub fn shortfall(&self) -> Amount {
        Amount(self.required.0.saturating_sub(self.balance().0))
    }
}

/// Equality counts as sufficient
pub fn covers(balance: Amount, required: Amount) -> bool {
    balance >= required
}

pub struct BalanceOracle<'a, C> {
    client: &'a C,
    fee_currency: &'a str,
    read_retries: u32,
    retry_delay: Duration,
}

impl<'a, C: LedgerClient> BalanceOracle<'a, C> {
    pub fn new(client: &'a C, fee_currency: &'a str) -> Self {
        Self {
            client,
            fee_currency,
            read_retries: DEFAULT_READ_RETRIES,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.read_retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Read the current fee-currency balance of `address`
    pub async fn snapshot(&self, address: &str) -> Result<BalanceSnapshot, LedgerError> {
        let asset_id = with_read_retries(self.read_retries, self.retry_delay, || {
            self.client.resolve_namespace(self.fee_currency)
        })
        .await?;

        let info = with_read_retries(self.read_retries, self.retry_delay, || {
            self.client.account_info(address)
        })
        .await?;

        Ok(BalanceSnapshot {
            address: address.to_string(),
            asset_id,
            amount: info.balance_of(asset_id),
            taken_at: Utc::now(),
        })
    }

    /// Check `address` against `required`, keeping the details
    pub async fn check(&self, required: Amount, address: &str) -> BalanceCheck {
        let snapshot = match self.snapshot(address).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::warn!(
                    "Could not read {} balance of {}: {}",
                    self.fee_currency,
                    address,
                    e
                );
                None
            }
        };

        let check = BalanceCheck {
            address: address.to_string(),
            required,
            snapshot,
        };

        log::info!(
            "Balance of {}: {} {}, required {} ({})",
            address,
            check.balance(),
            self.fee_currency,
            required,
            if check.is_sufficient() {
                "sufficient"
            } else {
                "insufficient"
            }
        );

        check
    }

    /// Whether `address` holds at least `required`; false when unknown
    pub async fn sufficient_balance(&self, required: Amount, address: &str) -> bool {
        self.check(required, address).await.is_sufficient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    const XPX: AssetId = AssetId(0x0DC6_7FBE_1CAD_29E3);
    const OTHER: AssetId = AssetId(0x1234);

    fn oracle(ledger: &InMemoryLedger) -> BalanceOracle<'_, InMemoryLedger> {
        BalanceOracle::new(ledger, "prx.xpx").with_retries(2, Duration::from_millis(1))
    }

    #[test]
    fn test_covers_equality_is_sufficient() {
        for (balance, fee) in [(0u64, 0u64), (5, 5), (1100, 1020), (1, 0), (u64::MAX, u64::MAX)] {
            assert!(covers(Amount(balance), Amount(fee)));
        }
        for (balance, fee) in [(0u64, 1u64), (500, 1020), (1019, 1020)] {
            assert!(!covers(Amount(balance), Amount(fee)));
        }
    }

    #[tokio::test]
    async fn test_sufficient_balance() {
        let ledger = InMemoryLedger::new()
            .with_namespace("prx.xpx", XPX)
            .with_balance("sponsor", XPX, Amount(1020))
            .with_balance("sponsor", OTHER, Amount(1_000_000));
        let oracle = oracle(&ledger);

        assert!(oracle.sufficient_balance(Amount(1020), "sponsor").await);
        assert!(oracle.sufficient_balance(Amount(1), "sponsor").await);
        assert!(!oracle.sufficient_balance(Amount(1021), "sponsor").await);
    }

    #[tokio::test]
    async fn test_no_fee_currency_holding_is_zero() {
        let ledger = InMemoryLedger::new()
            .with_namespace("prx.xpx", XPX)
            .with_balance("poor", OTHER, Amount(99));
        let check = oracle(&ledger).check(Amount(1), "poor").await;

        assert_eq!(check.balance(), Amount::ZERO);
        assert_eq!(check.shortfall(), Amount(1));
        assert!(!check.is_sufficient());
        assert!(oracle(&ledger).sufficient_balance(Amount::ZERO, "poor").await);
    }

    #[tokio::test]
    async fn test_fails_closed_on_unresolved_currency() {
        let ledger = InMemoryLedger::new().with_balance("sponsor", XPX, Amount(1_000));
        let check = oracle(&ledger).check(Amount(1), "sponsor").await;

        assert!(check.snapshot.is_none());
        assert!(!check.is_sufficient());
    }

    #[tokio::test]
    async fn test_fails_closed_on_unknown_account() {
        let ledger = InMemoryLedger::new().with_namespace("prx.xpx", XPX);
        assert!(!oracle(&ledger).sufficient_balance(Amount::ZERO, "nobody").await);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let ledger = InMemoryLedger::new()
            .with_namespace("prx.xpx", XPX)
            .with_balance("sponsor", XPX, Amount(10))
            .fail_reads(2);

        assert!(oracle(&ledger).sufficient_balance(Amount(10), "sponsor").await);
    }
}
