//! Add a cosigner to a batch of accounts
//!
//! Every account listed in the key file gets the cosigner added through one
//! bonded aggregate. The first account pays all fees and the bond.

use clap::Parser;
use multisig_provisioner::cli;
use multisig_provisioner::config::Config;
use multisig_provisioner::keyfile::DEFAULT_KEYS_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "add-cosigner")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Add a cosigner to every account in a key file", long_about = None)]
struct Args {
    /// Cosigner account private key (hex)
    #[arg(short, long)]
    key: String,

    /// File with one target account private key per line
    #[arg(long, default_value = DEFAULT_KEYS_FILE)]
    keys_file: PathBuf,

    /// JSON config file (node endpoint, fees, polling)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    cli::cmd_add_cosigner(&args.key, &args.keys_file, &config)
}
