//! CLI command handlers
//!
//! Each handler loads its inputs, builds a runtime and drives one workflow,
//! printing progress for the operator.

use crate::asset::{AssetIssuer, IssueOutcome};
use crate::config::Config;
use crate::crypto::Account;
use crate::keyfile::read_keys;
use crate::ledger::BalanceCheck;
use crate::multisig::{
    BatchDriver, BatchOutcome, SettlementOutcome, WorkflowContext, WorkflowError,
};
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn print_balance(check: &BalanceCheck, currency: &str) {
    println!("   ├─ Current balance: {} {}", check.balance(), currency);
    println!("   └─ Total fee:       {} {}", check.required, currency);
}

/// Operator notice for a run abandoned with its bond already announced
///
/// Returns `None` when nothing was escrowed, so the error alone says enough.
pub fn escrowed_bond_notice(err: &WorkflowError, lock_duration: u64) -> Option<String> {
    if !err.bond_escrowed() {
        return None;
    }
    let state = err
        .state()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let lock = err
        .lock_hash()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let mut notice = String::new();
    notice.push_str(&format!("\n⚠️  Workflow stopped at {} with the bond in escrow\n", state));
    notice.push_str(&format!("   ├─ Lock hash: {}\n", lock));
    notice.push_str(&format!(
        "   ├─ The bond stays locked until it expires ({} blocks)\n",
        lock_duration
    ));
    notice.push_str(&format!("   └─ Reason: {}", err));
    Some(notice)
}

/// Add the cosigner behind `cosigner_key` to every account in `keys_file`
///
/// The first account in the file sponsors the batch.
pub fn cmd_add_cosigner(cosigner_key: &str, keys_file: &Path, config: &Config) -> CliResult<()> {
    let cosigner = Account::from_private_key_hex(cosigner_key)?;
    let targets = read_keys(keys_file)?;
    let client = config.rpc_client()?;
    let context = WorkflowContext::from_config(client, config);
    let currency = config.fee_currency.as_str();

    println!(
        "🔑 Adding cosigner {} to {} account(s)",
        cosigner.address(),
        targets.len()
    );
    println!("   Sponsor: {}", targets[0].address());

    let driver = BatchDriver::new(&context);
    let plan = driver.plan(&targets, cosigner.public_account(), &[cosigner.clone()])?;
    println!(
        "   Aggregate fee: {} {} ({} inner transaction(s))",
        plan.aggregate.max_fee,
        currency,
        plan.aggregate.inner.len()
    );
    println!(
        "   Bond:          {} {} + {} {} fee",
        config.fees.lock_fund, currency, config.fees.lock_fund_tx_fee, currency
    );

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = match rt.block_on(driver.execute(&plan)) {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(notice) = escrowed_bond_notice(&e, config.fees.lock_duration) {
                println!("{}", notice);
            }
            return Err(e.into());
        }
    };

    match outcome {
        BatchOutcome::Aborted(check) => {
            println!("\n❌ Not enough {} balance!", currency);
            print_balance(&check, currency);
            if check.snapshot.is_none() {
                println!("   ⚠️  Balance could not be read from {}", config.endpoint);
            }
        }
        BatchOutcome::Settled(SettlementOutcome::Completed(report)) => {
            println!("\n✅ Cosigner added to {} account(s)", targets.len());
            println!("   ├─ Lock hash: {} (height {})", report.lock_hash, report.lock_height);
            println!(
                "   ├─ Tx hash:   {} (height {})",
                report.aggregate_hash, report.aggregate_height
            );
            println!("   └─ Cosignatures: {}", report.cosignatures_submitted);
        }
        BatchOutcome::Settled(SettlementOutcome::PartiallyCompleted {
            report,
            missing,
            reason,
        }) => {
            println!("\n⚠️  Aggregate {} announced but not fully cosigned", report.aggregate_hash);
            println!("   Reason: {}", reason);
            println!(
                "   Cosign manually before the bond expires ({} blocks):",
                config.fees.lock_duration
            );
            for public_key in &missing {
                println!("   - {}", public_key);
            }
        }
    }

    Ok(())
}

/// Create `count` assets owned by the account behind `key`
pub fn cmd_create_assets(key: &str, count: usize, config: &Config) -> CliResult<()> {
    let owner = Account::from_private_key_hex(key)?;
    let client = config.rpc_client()?;
    let context = WorkflowContext::from_config(client, config);
    let currency = config.fee_currency.as_str();

    if count == 0 {
        println!("Nothing to create.");
        return Ok(());
    }

    let issuer = AssetIssuer::new(&context);
    let plan = issuer.plan(&owner, count)?;

    println!("🪙 Creating {} asset(s) for {}", count, owner.address());
    println!(
        "   Total rental fee: {} {}",
        config.fees.asset_rental_fee.times(count),
        currency
    );
    println!("   Total agg tx fee: {} {}", plan.aggregate.max_fee, currency);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(issuer.issue_plan(&owner, plan))?;

    match outcome {
        IssueOutcome::Nothing => println!("Nothing to create."),
        IssueOutcome::Aborted {
            check,
            max_affordable,
        } => {
            println!("\n❌ Not enough {} balance!", currency);
            print_balance(&check, currency);
            println!("   Affordable with current balance: {} asset(s)", max_affordable);
        }
        IssueOutcome::Announced {
            hash,
            mosaic_ids,
            height,
        } => {
            println!("\n✅ Assets created (height {})", height);
            println!("   Tx hash: {}", hash);
            for id in &mosaic_ids {
                println!("   - {}", id);
            }
        }
    }

    Ok(())
}
