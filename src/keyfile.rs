//! Private key file
//!
//! One hex-encoded private key per line. Blank lines and lines starting
//! with `#` are skipped. The file is read once; keys are never written back.

use crate::crypto::{Account, KeyError};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File read when `--keys-file` is not given
pub const DEFAULT_KEYS_FILE: &str = "private-keys-sample.txt";

#[derive(Error, Debug)]
pub enum KeyFileError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Line {line}: {source}")]
    InvalidKey {
        line: usize,
        #[source]
        source: KeyError,
    },
    #[error("Line {line}: key already listed on line {first}")]
    DuplicateKey { line: usize, first: usize },
    #[error("No keys found")]
    Empty,
}

/// Parse key file contents into accounts, in file order
pub fn parse_keys(contents: &str) -> Result<Vec<Account>, KeyFileError> {
    let mut accounts: Vec<(usize, Account)> = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let account = Account::from_private_key_hex(text)
            .map_err(|source| KeyFileError::InvalidKey { line, source })?;

        if let Some((first, _)) = accounts.iter().find(|(_, a)| *a == account) {
            return Err(KeyFileError::DuplicateKey {
                line,
                first: *first,
            });
        }
        accounts.push((line, account));
    }

    if accounts.is_empty() {
        return Err(KeyFileError::Empty);
    }

    Ok(accounts.into_iter().map(|(_, account)| account).collect())
}

pub fn read_keys(path: &Path) -> Result<Vec<Account>, KeyFileError> {
    let contents = fs::read_to_string(path)?;
    let accounts = parse_keys(&contents)?;
    log::debug!("Read {} key(s) from {}", accounts.len(), path.display());
    Ok(accounts)
}
