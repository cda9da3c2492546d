//! Batch driver
//!
//! Adds one cosignatory to many accounts with a single bonded aggregate.
//! The first target is the sponsor: it initiates the aggregate, pays every
//! fee and the bond, and is the only account whose balance is checked.

use crate::core::{AggregateTransaction, Amount, PolicyChange};
use crate::crypto::{Account, PublicAccount};
use crate::ledger::{BalanceCheck, LedgerClient};
use crate::multisig::context::WorkflowContext;
use crate::multisig::cosign::cosign;
use crate::multisig::error::WorkflowError;
use crate::multisig::sequencer::SettlementOutcome;
use std::collections::HashSet;

/// Everything decided before touching the ledger
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// First target: initiator, bond payer and only balance checked
    pub sponsor: Account,
    pub aggregate: AggregateTransaction,
    /// Everyone except the sponsor who must cosign, in order
    pub cosigners: Vec<Account>,
    /// Total the sponsor must hold: aggregate fee, bond and bond fee
    pub required: Amount,
}

/// Result of one batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The sponsor could not cover the batch; nothing was signed or submitted
    Aborted(BalanceCheck),
    Settled(SettlementOutcome),
}

/// Adds a cosignatory to a list of accounts in one bonded aggregate
pub struct BatchDriver<'a, C> {
    context: &'a WorkflowContext<C>,
}

impl<'a, C: LedgerClient> BatchDriver<'a, C> {
    /// Create a driver over a workflow context
    pub fn new(context: &'a WorkflowContext<C>) -> Self {
        Self { context }
    }

    /// Build the aggregate adding `cosignatory` to every target
    ///
    /// `extra_cosigners` are appended after the targets; duplicates and the
    /// sponsor are dropped, first occurrence wins.
    pub fn plan(
        &self,
        targets: &[Account],
        cosignatory: &PublicAccount,
        extra_cosigners: &[Account],
    ) -> Result<BatchPlan, WorkflowError> {
        let sponsor = targets.first().ok_or(WorkflowError::EmptyBatch)?;
        let builder = self.context.builder();

        let mut inner = Vec::with_capacity(targets.len());
        for target in targets {
            let change = builder.policy_change(PolicyChange::add_cosignatory(cosignatory))?;
            inner.push(change.to_aggregate(target.public_account()));
        }
        let aggregate = builder.bonded_aggregate(inner)?;

        let mut seen = HashSet::new();
        seen.insert(sponsor.public_key_hex().to_string());
        let mut cosigners = Vec::new();
        for account in targets[1..].iter().chain(extra_cosigners) {
            if seen.insert(account.public_key_hex().to_string()) {
                cosigners.push(account.clone());
            }
        }

        let required = builder.fees().bonded_total(aggregate.max_fee);

        Ok(BatchPlan {
            sponsor: sponsor.clone(),
            aggregate,
            cosigners,
            required,
        })
    }

    /// Plan, then execute
    pub async fn run(
        &self,
        targets: &[Account],
        cosignatory: &PublicAccount,
        extra_cosigners: &[Account],
    ) -> Result<BatchOutcome, WorkflowError> {
        let plan = self.plan(targets, cosignatory, extra_cosigners)?;
        self.execute(&plan).await
    }

    /// Check the sponsor, then cosign and settle the whole batch
    pub async fn execute(&self, plan: &BatchPlan) -> Result<BatchOutcome, WorkflowError> {
        let sponsor = &plan.sponsor;

        log::info!(
            "Batch of {} account(s) sponsored by {}, requires {} {}",
            plan.aggregate.inner.len(),
            sponsor.address(),
            plan.required,
            self.context.builder().currency()
        );

        let check = self
            .context
            .oracle()
            .check(plan.required, sponsor.address())
            .await;
        if !check.is_sufficient() {
            log::warn!(
                "Batch aborted: {} short by {}",
                sponsor.address(),
                check.shortfall()
            );
            return Ok(BatchOutcome::Aborted(check));
        }

        let signed = cosign(&plan.aggregate, sponsor, &plan.cosigners)?;
        let outcome = self.context.sequencer().run(&signed, sponsor).await?;

        Ok(BatchOutcome::Settled(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeeSchedule, TransactionBuilder, TransactionType};
    use crate::ledger::{AssetId, InMemoryLedger, LedgerCall, PollPolicy};
    use crate::multisig::sequencer::{SettlementConfig, WorkflowState};

    const XPX: AssetId = AssetId(0x0DC6_7FBE_1CAD_29E3);

    fn fees() -> FeeSchedule {
        FeeSchedule {
            inner_tx_fee: Amount(100),
            lock_fund: Amount(10),
            lock_fund_tx_fee: Amount(10),
            lock_duration: 100,
            asset_rental_fee: Amount(1000),
        }
    }

    fn context(ledger: InMemoryLedger) -> WorkflowContext<InMemoryLedger> {
        WorkflowContext::new(
            ledger,
            TransactionBuilder::new(fees(), "prx.xpx"),
            SettlementConfig {
                poll: PollPolicy {
                    interval_ms: 1,
                    max_polls: 5,
                    read_retries: 1,
                },
                embed_cosignatures: false,
            },
        )
    }

    fn accounts(n: usize) -> Vec<Account> {
        (0..n).map(|_| Account::generate()).collect()
    }

    fn funded(sponsor: &Account, balance: u64) -> InMemoryLedger {
        InMemoryLedger::new()
            .with_namespace("prx.xpx", XPX)
            .with_balance(sponsor.address(), XPX, Amount(balance))
            .confirm_after(1)
    }

    #[tokio::test]
    async fn test_ten_targets_settle() {
        let targets = accounts(10);
        let cosignatory = Account::generate();
        let ctx = context(funded(&targets[0], 1100));
        let driver = BatchDriver::new(&ctx);

        let plan = driver.plan(&targets, cosignatory.public_account(), &[]).unwrap();
        assert_eq!(plan.required, Amount(1020));
        assert_eq!(plan.aggregate.inner.len(), 10);
        assert_eq!(plan.cosigners.len(), 9);

        let outcome = driver
            .run(&targets, cosignatory.public_account(), &[])
            .await
            .unwrap();
        let settled = match outcome {
            BatchOutcome::Settled(settled) => settled,
            other => panic!("expected settlement, got {:?}", other),
        };
        assert!(settled.is_complete());
        assert_eq!(settled.report().state, WorkflowState::Done);

        let submissions = ctx.client().submissions().await;
        let bonded: Vec<_> = submissions
            .iter()
            .filter(|c| matches!(c, LedgerCall::AnnounceBonded(_)))
            .collect();
        let cosigs = submissions
            .iter()
            .filter(|c| matches!(c, LedgerCall::AnnounceCosignature { .. }))
            .count();
        assert_eq!(bonded.len(), 1);
        assert_eq!(cosigs, 9);
        assert_eq!(
            ctx.client()
                .cosignatures_for(&settled.report().aggregate_hash)
                .await
                .len(),
            9
        );
    }

    #[tokio::test]
    async fn test_insufficient_sponsor_aborts_without_submissions() {
        let targets = accounts(10);
        let ctx = context(funded(&targets[0], 500));
        let driver = BatchDriver::new(&ctx);

        let outcome = driver
            .run(&targets, Account::generate().public_account(), &[])
            .await
            .unwrap();

        match outcome {
            BatchOutcome::Aborted(check) => {
                assert_eq!(check.balance(), Amount(500));
                assert_eq!(check.required, Amount(1020));
                assert_eq!(check.shortfall(), Amount(520));
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(ctx.client().submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_exact_balance_for_k_proceeds_and_k_minus_one_aborts() {
        let k = 4;
        // Exactly K inner fees plus bond and bond fee
        let exact = 100 * k as u64 + 20;

        let targets = accounts(k);
        let ctx = context(funded(&targets[0], exact));
        let outcome = BatchDriver::new(&ctx)
            .run(&targets, Account::generate().public_account(), &[])
            .await
            .unwrap();
        assert!(matches!(outcome, BatchOutcome::Settled(_)));

        let targets = accounts(k);
        let ctx = context(funded(&targets[0], exact - 100));
        let outcome = BatchDriver::new(&ctx)
            .run(&targets, Account::generate().public_account(), &[])
            .await
            .unwrap();
        assert!(matches!(outcome, BatchOutcome::Aborted(_)));
        assert!(ctx.client().submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_sponsor_aborts() {
        let targets = accounts(2);
        let ctx = context(InMemoryLedger::new().with_namespace("prx.xpx", XPX));
        let outcome = BatchDriver::new(&ctx)
            .run(&targets, Account::generate().public_account(), &[])
            .await
            .unwrap();

        assert!(matches!(outcome, BatchOutcome::Aborted(ref c) if c.snapshot.is_none()));
        assert!(ctx.client().submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_bond_paid_by_sponsor_before_bonded_announce() {
        let targets = accounts(3);
        let ctx = context(funded(&targets[0], 10_000));
        BatchDriver::new(&ctx)
            .run(&targets, Account::generate().public_account(), &[])
            .await
            .unwrap();

        let submissions = ctx.client().submissions().await;
        assert!(matches!(
            submissions[0],
            LedgerCall::Announce {
                tx_type: TransactionType::LockFunds,
                ..
            }
        ));
        assert!(matches!(submissions[1], LedgerCall::AnnounceBonded(_)));
    }

    #[test]
    fn test_extra_cosigners_deduplicated() {
        let targets = accounts(3);
        let cosignatory = Account::generate();
        let ctx = context(InMemoryLedger::new());

        let extras = vec![
            cosignatory.clone(),
            targets[0].clone(),
            targets[2].clone(),
            cosignatory.clone(),
        ];
        let plan = BatchDriver::new(&ctx)
            .plan(&targets, cosignatory.public_account(), &extras)
            .unwrap();

        let keys: Vec<&str> = plan.cosigners.iter().map(|a| a.public_key_hex()).collect();
        assert_eq!(
            keys,
            vec![
                targets[1].public_key_hex(),
                targets[2].public_key_hex(),
                cosignatory.public_key_hex()
            ]
        );
    }

    #[test]
    fn test_empty_batch_rejected() {
        let ctx = context(InMemoryLedger::new());
        let result = BatchDriver::new(&ctx).plan(&[], Account::generate().public_account(), &[]);
        assert!(matches!(result, Err(WorkflowError::EmptyBatch)));
    }
}
