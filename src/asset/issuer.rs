//! Asset issuer
//!
//! Creates `n` assets owned by one account in a single complete aggregate:
//! each asset contributes a definition and a supply increase of one unit.
//! The owner signs alone, so there is no bond and no cosignature round.

use crate::core::{
    sign_transaction, AggregateTransaction, Amount, MosaicDefinition, MosaicId,
    MosaicProperties, TransactionError, TxHash,
};
use crate::crypto::{Account, KeyError};
use crate::ledger::{await_confirmation, BalanceCheck, ConfirmationError, LedgerClient, LedgerError};
use crate::multisig::WorkflowContext;
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Announcement failed: {0}")]
    Submission(#[from] LedgerError),
    #[error("Announced but not confirmed: {0}")]
    Confirmation(#[from] ConfirmationError),
    #[error("Nonce {0} used twice")]
    DuplicateNonce(u32),
}

#[derive(Debug, Clone)]
pub struct AssetPlan {
    pub aggregate: AggregateTransaction,
    pub definitions: Vec<MosaicDefinition>,
    /// Rental fees plus the aggregate fee
    pub required: Amount,
}

impl AssetPlan {
    /// Ids of the assets this plan creates
    pub fn mosaic_ids(&self) -> Vec<MosaicId> {
        self.definitions.iter().map(|d| d.mosaic_id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Zero assets requested
    Nothing,
    Aborted {
        check: BalanceCheck,
        /// How many assets the current balance would pay for
        max_affordable: u64,
    },
    Announced {
        hash: TxHash,
        mosaic_ids: Vec<MosaicId>,
        height: u64,
    },
}

/// Creates assets for one owner in a single complete aggregate
pub struct AssetIssuer<'a, C> {
    context: &'a WorkflowContext<C>,
}

impl<'a, C: LedgerClient> AssetIssuer<'a, C> {
    /// Create an issuer over a workflow context
    pub fn new(context: &'a WorkflowContext<C>) -> Self {
        Self { context }
    }

    /// Plan `count` assets with random nonces
    pub fn plan(&self, owner: &Account, count: usize) -> Result<AssetPlan, AssetError> {
        let mut rng = rand::thread_rng();
        let mut nonces = HashSet::with_capacity(count);
        while nonces.len() < count {
            nonces.insert(rng.gen::<u32>());
        }
        let nonces: Vec<u32> = nonces.into_iter().collect();
        self.plan_with_nonces(owner, &nonces)
    }

    /// Plan one asset per nonce
    pub fn plan_with_nonces(
        &self,
        owner: &Account,
        nonces: &[u32],
    ) -> Result<AssetPlan, AssetError> {
        let builder = self.context.builder();
        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(nonces.len());
        let mut inner = Vec::with_capacity(nonces.len() * 2);

        for &nonce in nonces {
            if !seen.insert(nonce) {
                return Err(AssetError::DuplicateNonce(nonce));
            }

            let definition = builder.mosaic_definition(
                owner.public_account(),
                nonce,
                MosaicProperties::default(),
            );
            let supply = builder.mosaic_supply_increase(&definition.body, Amount(1));

            definitions.push(definition.body.clone());
            inner.push(definition.to_aggregate(owner.public_account()));
            inner.push(supply.to_aggregate(owner.public_account()));
        }

        let aggregate = builder.complete_aggregate(inner)?;
        let fees = builder.fees();
        let required = fees.asset_rental_fee.times(nonces.len()) + aggregate.max_fee;

        Ok(AssetPlan {
            aggregate,
            definitions,
            required,
        })
    }

    /// Check the owner's balance, then sign, announce and wait
    pub async fn issue(&self, owner: &Account, count: usize) -> Result<IssueOutcome, AssetError> {
        if count == 0 {
            return Ok(IssueOutcome::Nothing);
        }
        let plan = self.plan(owner, count)?;
        self.issue_plan(owner, plan).await
    }

    pub async fn issue_plan(
        &self,
        owner: &Account,
        plan: AssetPlan,
    ) -> Result<IssueOutcome, AssetError> {
        let check = self
            .context
            .oracle()
            .check(plan.required, owner.address())
            .await;
        if !check.is_sufficient() {
            let max_affordable = check.balance().fits(self.context.builder().fees().per_asset());
            log::warn!(
                "{} cannot pay for {} asset(s); affordable: {}",
                owner.address(),
                plan.definitions.len(),
                max_affordable
            );
            return Ok(IssueOutcome::Aborted {
                check,
                max_affordable,
            });
        }

        let signed = sign_transaction(&plan.aggregate, owner)?;
        {
            let _slot = self.context.gate().acquire(owner.public_key_hex()).await;
            self.context.client().announce(&signed).await?;
        }
        log::info!(
            "Asset aggregate {} announced with {} asset(s)",
            signed.hash,
            plan.definitions.len()
        );

        let height =
            await_confirmation(self.context.client(), &signed.hash, &self.context.settlement().poll)
                .await?;

        Ok(IssueOutcome::Announced {
            hash: signed.hash,
            mosaic_ids: plan.mosaic_ids(),
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeeSchedule, InnerBody, TransactionBuilder, TransactionType};
    use crate::ledger::{AssetId, InMemoryLedger, LedgerCall, PollPolicy};
    use crate::multisig::SettlementConfig;

    const XPX: AssetId = AssetId(0x0DC6_7FBE_1CAD_29E3);

    fn context(ledger: InMemoryLedger) -> WorkflowContext<InMemoryLedger> {
        WorkflowContext::new(
            ledger,
            TransactionBuilder::new(
                FeeSchedule {
                    inner_tx_fee: Amount(5),
                    asset_rental_fee: Amount(1000),
                    ..Default::default()
                },
                "prx.xpx",
            ),
            SettlementConfig {
                poll: PollPolicy {
                    interval_ms: 1,
                    max_polls: 3,
                    read_retries: 1,
                },
                embed_cosignatures: false,
            },
        )
    }

    #[test]
    fn test_plan_pairs_definition_with_supply() {
        let owner = Account::generate();
        let ctx = context(InMemoryLedger::new());
        let plan = AssetIssuer::new(&ctx)
            .plan_with_nonces(&owner, &[1, 2, 3])
            .unwrap();

        assert!(!plan.aggregate.is_bonded());
        assert_eq!(plan.aggregate.inner.len(), 6);
        assert_eq!(plan.required, Amount(3 * 1000 + 6 * 5));

        for (pair, definition) in plan.aggregate.inner.chunks(2).zip(&plan.definitions) {
            assert_eq!(&pair[0].signer, owner.public_account());
            match (&pair[0].body, &pair[1].body) {
                (InnerBody::MosaicDefinition(d), InnerBody::MosaicSupplyChange(s)) => {
                    assert_eq!(d, definition);
                    assert_eq!(s.mosaic_id, d.mosaic_id);
                    assert_eq!(s.delta, Amount(1));
                }
                other => panic!("unexpected pair {:?}", other),
            }
        }
    }

    #[test]
    fn test_duplicate_nonce_rejected() {
        let ctx = context(InMemoryLedger::new());
        assert!(matches!(
            AssetIssuer::new(&ctx).plan_with_nonces(&Account::generate(), &[9, 9]),
            Err(AssetError::DuplicateNonce(9))
        ));
    }

    #[test]
    fn test_random_plan_has_distinct_ids() {
        let ctx = context(InMemoryLedger::new());
        let plan = AssetIssuer::new(&ctx).plan(&Account::generate(), 5).unwrap();
        let ids: HashSet<_> = plan.mosaic_ids().into_iter().collect();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_zero_assets_does_nothing() {
        let ctx = context(InMemoryLedger::new());
        let outcome = AssetIssuer::new(&ctx)
            .issue(&Account::generate(), 0)
            .await
            .unwrap();
        assert_eq!(outcome, IssueOutcome::Nothing);
        assert!(ctx.client().calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_reports_affordable_count() {
        let owner = Account::generate();
        let ctx = context(
            InMemoryLedger::new()
                .with_namespace("prx.xpx", XPX)
                .with_balance(owner.address(), XPX, Amount(2500)),
        );

        let outcome = AssetIssuer::new(&ctx).issue(&owner, 3).await.unwrap();
        match outcome {
            IssueOutcome::Aborted { max_affordable, .. } => assert_eq!(max_affordable, 2),
            other => panic!("expected abort, got {:?}", other),
        }
        assert!(ctx.client().submissions().await.is_empty());
    }

    #[tokio::test]
    async fn test_issue_announces_complete_aggregate() {
        let owner = Account::generate();
        let ctx = context(
            InMemoryLedger::new()
                .with_namespace("prx.xpx", XPX)
                .with_balance(owner.address(), XPX, Amount(2020))
                .confirm_after(1),
        );

        let outcome = AssetIssuer::new(&ctx).issue(&owner, 2).await.unwrap();
        let IssueOutcome::Announced { hash, mosaic_ids, height } = outcome else {
            panic!("expected announcement");
        };
        assert_eq!(mosaic_ids.len(), 2);
        assert_eq!(height, 1);

        assert_eq!(
            ctx.client().submissions().await,
            vec![LedgerCall::Announce {
                hash,
                tx_type: TransactionType::AggregateComplete,
            }]
        );
    }
}
