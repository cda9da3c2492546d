//! Tool configuration
//!
//! Loaded from a JSON file passed with `--config`; every field is optional
//! and falls back to the defaults below.

use crate::core::{FeeSchedule, TransactionBuilder, DEFAULT_DEADLINE_HOURS, DEFAULT_FEE_CURRENCY};
use crate::ledger::rpc::{validate_endpoint, DEFAULT_REQUEST_TIMEOUT};
use crate::ledger::{LedgerError, RpcClient};
use crate::multisig::SettlementConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default node endpoint
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:7900";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger node, `host:port`
    pub endpoint: String,
    /// Namespace of the currency fees and bonds are paid in
    pub fee_currency: String,
    /// How far ahead transaction deadlines are set
    pub deadline_hours: i64,
    pub request_timeout_secs: u64,
    pub fees: FeeSchedule,
    pub settlement: SettlementConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            fee_currency: DEFAULT_FEE_CURRENCY.to_string(),
            deadline_hours: DEFAULT_DEADLINE_HOURS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            fees: FeeSchedule::default(),
            settlement: SettlementConfig::default(),
        }
    }
}

impl Config {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint(&self.endpoint).map_err(|e| match e {
            LedgerError::InvalidEndpoint(endpoint) => ConfigError::InvalidEndpoint(endpoint),
            other => ConfigError::InvalidEndpoint(other.to_string()),
        })?;

        if self.fee_currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "fee_currency",
                reason: "must not be empty".to_string(),
            });
        }
        if self.deadline_hours <= 0 || self.deadline_hours > 48 {
            return Err(ConfigError::InvalidValue {
                field: "deadline_hours",
                reason: format!("{} is outside 1..=48", self.deadline_hours),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.settlement.poll.max_polls == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_polls",
                reason: "must be positive".to_string(),
            });
        }
        if self.fees.lock_duration == 0 {
            return Err(ConfigError::InvalidValue {
                field: "lock_duration",
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transaction_builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.fees, self.fee_currency.clone())
            .with_deadline_horizon(chrono::Duration::hours(self.deadline_hours))
    }

    /// Client for the configured node; does not connect yet
    pub fn rpc_client(&self) -> Result<RpcClient, ConfigError> {
        RpcClient::new(&self.endpoint)
            .map(|client| client.with_request_timeout(self.request_timeout()))
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Amount;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.fee_currency, "prx.xpx");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(!config.settlement.embed_cosignatures);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "endpoint": "tcp://node.example:3000",
                "fees": {{ "inner_tx_fee": 100 }},
                "settlement": {{ "interval_ms": 500, "embed_cosignatures": true }}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.endpoint, "tcp://node.example:3000");
        assert_eq!(config.fees.inner_tx_fee, Amount(100));
        assert_eq!(config.fees.lock_duration, 100);
        assert_eq!(config.settlement.poll.interval_ms, 500);
        assert_eq!(config.settlement.poll.max_polls, 60);
        assert!(config.settlement.embed_cosignatures);
        assert_eq!(config.deadline_hours, 1);

        let client = config.rpc_client().unwrap();
        assert_eq!(client.endpoint(), "node.example:3000");
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let config = Config {
            endpoint: "https://api-2.testnet2.xpxsirius.io".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_bad_values_rejected() {
        let config = Config {
            deadline_hours: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "deadline_hours", .. })
        ));

        let mut config = Config::default();
        config.settlement.poll.max_polls = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::SerializationError(_))
        ));
        assert!(matches!(
            Config::load(Path::new("/nonexistent/config.json")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_builder_uses_configured_fees() {
        let config = Config {
            fee_currency: "test.coin".to_string(),
            ..Default::default()
        };
        let builder = config.transaction_builder();
        assert_eq!(builder.currency(), "test.coin");
        assert_eq!(builder.fees(), &config.fees);
    }
}
