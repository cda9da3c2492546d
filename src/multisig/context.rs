//! Per-run workflow context
//!
//! Owns everything a workflow instance needs: the ledger client, the
//! transaction builder (which carries the fee schedule and fee currency),
//! settlement tuning and the shared submission gate.

use crate::config::Config;
use crate::core::TransactionBuilder;
use crate::ledger::{BalanceOracle, LedgerClient, SubmissionGate};
use crate::multisig::sequencer::{SettlementConfig, SettlementSequencer};

/// Services shared by every workflow run against one ledger
pub struct WorkflowContext<C> {
    client: C,
    builder: TransactionBuilder,
    settlement: SettlementConfig,
    gate: SubmissionGate,
}

impl<C: LedgerClient> WorkflowContext<C> {
    /// Create a context with a fresh submission gate
    pub fn new(client: C, builder: TransactionBuilder, settlement: SettlementConfig) -> Self {
        Self {
            client,
            builder,
            settlement,
            gate: SubmissionGate::new(),
        }
    }

    /// Create a context from loaded configuration
    pub fn from_config(client: C, config: &Config) -> Self {
        Self::new(client, config.transaction_builder(), config.settlement)
    }

    /// Get the ledger client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get the transaction builder
    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    /// Get the settlement tuning
    pub fn settlement(&self) -> &SettlementConfig {
        &self.settlement
    }

    /// Get the submission gate
    pub fn gate(&self) -> &SubmissionGate {
        &self.gate
    }

    /// Balance oracle reading through this context's client
    pub fn oracle(&self) -> BalanceOracle<'_, C> {
        BalanceOracle::new(&self.client, self.builder.currency()).with_retries(
            self.settlement.poll.read_retries,
            self.settlement.poll.interval(),
        )
    }

    /// Settlement sequencer sharing this context's gate
    pub fn sequencer(&self) -> SettlementSequencer<'_, C> {
        SettlementSequencer::new(&self.client, &self.builder, self.settlement, &self.gate)
    }
}
