//! Waiting for a hash to settle
//!
//! Polls [`LedgerClient::transaction_status`] at a fixed interval up to a
//! maximum poll count. Settlement is an observed status, never an elapsed
//! amount of time.

use crate::core::TxHash;
use crate::ledger::{with_read_retries, LedgerClient, LedgerError, TransactionStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfirmationError {
    #[error("{hash} not confirmed after {polls} polls")]
    Timeout { hash: TxHash, polls: u32 },
    #[error("{hash} failed: {reason}")]
    Failed { hash: TxHash, reason: String },
    #[error("status of {hash} unavailable: {source}")]
    Unavailable {
        hash: TxHash,
        #[source]
        source: LedgerError,
    },
}

/// How long and how often to poll for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Delay between status queries, in milliseconds
    pub interval_ms: u64,
    /// Status queries before giving up
    pub max_polls: u32,
    /// Retries for a status query that failed in transit
    pub read_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            max_polls: 60,
            read_retries: 3,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on time spent waiting (ignoring request latency)
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_polls
    }
}

/// Block until `hash` is confirmed, returning the confirmation height
pub async fn await_confirmation<C: LedgerClient>(
    client: &C,
    hash: &TxHash,
    policy: &PollPolicy,
) -> Result<u64, ConfirmationError> {
    for poll in 1..=policy.max_polls {
        let status = with_read_retries(policy.read_retries, policy.interval(), || {
            client.transaction_status(hash)
        })
        .await
        .map_err(|source| ConfirmationError::Unavailable {
            hash: hash.clone(),
            source,
        })?;

        match status {
            TransactionStatus::Confirmed { height } => {
                log::info!("{} confirmed at height {}", hash, height);
                return Ok(height);
            }
            TransactionStatus::Failed { reason } => {
                return Err(ConfirmationError::Failed {
                    hash: hash.clone(),
                    reason,
                });
            }
            TransactionStatus::Pending | TransactionStatus::Unknown => {
                log::debug!(
                    "{} not confirmed yet ({:?}, poll {}/{})",
                    hash,
                    status,
                    poll,
                    policy.max_polls
                );
                if poll < policy.max_polls {
                    tokio::time::sleep(policy.interval()).await;
                }
            }
        }
    }

    Err(ConfirmationError::Timeout {
        hash: hash.clone(),
        polls: policy.max_polls,
    })
}
