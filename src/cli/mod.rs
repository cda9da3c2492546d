//! Command handlers shared by the binaries

pub mod commands;

pub use commands::{cmd_add_cosigner, cmd_create_assets, CliResult};
