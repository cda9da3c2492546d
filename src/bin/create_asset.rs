//! Create fungible assets owned by one account

use clap::Parser;
use multisig_provisioner::cli;
use multisig_provisioner::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "create-asset")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Create assets in one complete aggregate", long_about = None)]
struct Args {
    /// Owner account private key (hex)
    #[arg(short, long)]
    key: String,

    /// Number of assets to create
    #[arg(short, long, default_value = "0")]
    num: usize,

    /// JSON config file (node endpoint, fees, polling)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    cli::cmd_create_assets(&args.key, args.num, &config)
}
