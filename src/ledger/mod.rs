//! Ledger client boundary
//!
//! Everything this crate needs from the ledger goes through [`LedgerClient`]:
//! - resolving the fee currency and reading account holdings
//! - announcing plain, bonded and cosignature transactions
//! - polling the confirmation status of an announced hash ([`await_confirmation`])
//!
//! [`RpcClient`] speaks to a node over TCP; [`InMemoryLedger`] is a
//! recording fake used by tests.

pub mod balance;
pub mod confirm;
pub mod gate;
pub mod memory;
pub mod message;
pub mod rpc;

use crate::core::{Amount, CosignatureTransaction, SignedTransaction, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub use balance::{covers, BalanceCheck, BalanceOracle, BalanceSnapshot};
pub use confirm::{await_confirmation, ConfirmationError, PollPolicy};
pub use gate::SubmissionGate;
pub use memory::{InMemoryLedger, LedgerCall};
pub use message::{RpcCodec, RpcRequest, RpcResponse};
pub use rpc::RpcClient;

/// Errors at the ledger boundary
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transaction {hash} rejected: {reason}")]
    Rejected { hash: TxHash, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether repeating the same read could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::ConnectionFailed(_) | LedgerError::Timeout(_) | LedgerError::IoError(_)
        )
    }
}

/// Canonical identifier of an asset on the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub asset_id: AssetId,
    pub amount: Amount,
}

/// Account state as reported by the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
    pub holdings: Vec<AssetHolding>,
}

impl AccountInfo {
    /// Amount held of `asset_id`, zero when absent
    pub fn balance_of(&self, asset_id: AssetId) -> Amount {
        self.holdings
            .iter()
            .filter(|h| h.asset_id == asset_id)
            .map(|h| h.amount)
            .sum()
    }
}

/// Ledger's acknowledgement of an announced transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub hash: TxHash,
    pub message: String,
}

/// Confirmation state of an announced hash
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// The ledger has not seen this hash
    Unknown,
    /// Accepted, waiting to be included
    Pending,
    Confirmed { height: u64 },
    Failed { reason: String },
}

/// Operations the ledger must expose
#[allow(async_fn_in_trait)]
pub trait LedgerClient {
    /// Resolve a namespace name (e.g. `prx.xpx`) to its asset id
    async fn resolve_namespace(&self, name: &str) -> Result<AssetId, LedgerError>;

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LedgerError>;

    /// Announce a fully signed transaction
    async fn announce(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError>;

    /// Announce a bonded aggregate awaiting cosignatures
    async fn announce_bonded(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError>;

    /// Announce a cosignature for a bonded aggregate already on the ledger
    async fn announce_cosignature(
        &self,
        tx: &CosignatureTransaction,
    ) -> Result<Announcement, LedgerError>;

    async fn transaction_status(&self, hash: &TxHash) -> Result<TransactionStatus, LedgerError>;
}

impl<C: LedgerClient> LedgerClient for &C {
    async fn resolve_namespace(&self, name: &str) -> Result<AssetId, LedgerError> {
        (**self).resolve_namespace(name).await
    }

    async fn account_info(&self, address: &str) -> Result<AccountInfo, LedgerError> {
        (**self).account_info(address).await
    }

    async fn announce(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        (**self).announce(tx).await
    }

    async fn announce_bonded(&self, tx: &SignedTransaction) -> Result<Announcement, LedgerError> {
        (**self).announce_bonded(tx).await
    }

    async fn announce_cosignature(
        &self,
        tx: &CosignatureTransaction,
    ) -> Result<Announcement, LedgerError> {
        (**self).announce_cosignature(tx).await
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TransactionStatus, LedgerError> {
        (**self).transaction_status(hash).await
    }
}

/// Run an idempotent read, retrying transient failures
///
/// Never use this for announcements: a signed transaction is sent once.
pub async fn with_read_retries<T, F, Fut>(
    retries: u32,
    delay: Duration,
    mut read: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 0;
    loop {
        match read().await {
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                log::debug!("Read failed ({}), retry {}/{}", e, attempt, retries);
                tokio::time::sleep(delay).await;
            }
            result => return result,
        }
    }
}
