//! Per-account submission serialization
//!
//! The ledger sequences outgoing transactions per signing account, so two
//! workflow instances must not submit for the same account at once.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct SubmissionGate {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `address`'s submission slot
    pub async fn acquire(&self, address: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(address.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_account_is_serialized() {
        let gate = SubmissionGate::new();
        let held = gate.acquire("addr").await;

        let contender = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let _guard = gate.acquire("addr").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_accounts_do_not_block() {
        let gate = SubmissionGate::new();
        let _a = gate.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), gate.acquire("b")).await;
        assert!(b.is_ok());
    }
}
