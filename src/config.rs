//! Configuration management for the transaction manager
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// One block interval of the target network (15 * 100 ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_500;

/// Default receipt queries per transaction hash
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub submission: SubmissionMode,
    #[serde(default)]
    pub transactions: Vec<TxRequestConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
}

/// Receipt polling budget. Total wait is at most
/// `poll_interval_ms * (max_attempts - 1)` plus query round-trips.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

fn default_private_key_env() -> String {
    "TX_MANAGER_PRIVATE_KEY".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    pub filter: Option<String>,
    #[serde(default)]
    pub json: bool,
}

/// How transactions reach the node
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    /// Sign locally and broadcast with eth_sendRawTransaction
    #[default]
    Raw,
    /// Let the node sign for an account it manages (eth_sendTransaction)
    Delegated,
}

/// A transaction to execute, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct TxRequestConfig {
    pub gas_price: U256,
    pub gas_limit: U256,
    /// Absent for contract creation
    pub to: Option<Address>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
}

impl Settings {
    /// Load settings from the file named by TX_MANAGER_CONFIG
    pub fn load() -> Result<Self> {
        let config_path = env::var("TX_MANAGER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.rpc_urls.is_empty() {
            anyhow::bail!("Node has no RPC URLs configured");
        }

        if self.polling.max_attempts == 0 {
            anyhow::bail!("polling.max_attempts must be at least 1");
        }

        if self.polling.poll_interval_ms == 0 {
            anyhow::bail!("polling.poll_interval_ms must be greater than zero");
        }

        if self.transactions.is_empty() {
            tracing::warn!("No transactions configured - nothing will be executed");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = match regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return result,
    };

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[node]
chain_id = 1337
rpc_urls = ["http://127.0.0.1:8545"]
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_polling_defaults() {
        let settings = Settings::parse(MINIMAL).unwrap();
        assert_eq!(settings.polling, PollingConfig::default());
        assert_eq!(settings.polling.max_attempts, 40);
        assert_eq!(settings.polling.poll_interval_ms, 1_500);
        assert_eq!(settings.submission, SubmissionMode::Raw);
        assert_eq!(settings.wallet.private_key_env, "TX_MANAGER_PRIVATE_KEY");
        assert!(!settings.metrics.enabled);
        assert_eq!(settings.metrics.port, 9090);
    }

    #[test]
    fn test_full_config() {
        let input = r#"
submission = "delegated"

[node]
chain_id = 5
rpc_urls = ["http://a:8545", "http://b:8545"]

[polling]
poll_interval_ms = 250
max_attempts = 8

[[transactions]]
gas_price = "0x3b9aca00"
gas_limit = "0x5208"
to = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
value = "0x1"

[[transactions]]
gas_price = "0x3b9aca00"
gas_limit = "0x100000"
data = "0x6080"
"#;
        let settings = Settings::parse(input).unwrap();
        assert_eq!(settings.submission, SubmissionMode::Delegated);
        assert_eq!(settings.node.rpc_urls.len(), 2);
        assert_eq!(settings.polling.poll_interval_ms, 250);
        assert_eq!(settings.polling.max_attempts, 8);
        assert_eq!(settings.transactions.len(), 2);
        assert!(settings.transactions[0].to.is_some());
        assert_eq!(settings.transactions[0].gas_limit, U256::from(21_000));
        assert!(settings.transactions[1].to.is_none());
        assert_eq!(settings.transactions[1].data.to_vec(), vec![0x60u8, 0x80]);
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let input = format!("{}\n[polling]\nmax_attempts = 0\n", MINIMAL);
        assert!(Settings::parse(&input).is_err());
    }

    #[test]
    fn test_rejects_missing_rpc_urls() {
        let input = "[node]\nchain_id = 1\nrpc_urls = []\n";
        assert!(Settings::parse(input).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.node.chain_id, 1337);
    }
}
