//! Engine configuration with TOML file support.

use carbonfi_gateway::GatewayConfig;
use carbonfi_types::{AccountAddress, ChainId};
use carbonfi_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::EngineError;

/// Configuration for a staking session.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically with [`EngineConfig::new`] (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Network the staking contract is deployed on.
    #[serde(default = "default_chain_id")]
    pub chain_id: ChainId,

    /// Address of the staking contract.
    #[serde(default = "default_contract")]
    pub staking_contract: AccountAddress,

    /// Address of the staked ERC-20 token.
    #[serde(default = "default_contract")]
    pub token_contract: AccountAddress,

    /// How long a submitted transaction may wait for its confirming event.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Gateway relay connection.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_chain_id() -> ChainId {
    ChainId::ARBITRUM_ONE
}

fn default_contract() -> AccountAddress {
    AccountAddress::ZERO
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    pub fn new(staking_contract: AccountAddress, token_contract: AccountAddress) -> Self {
        Self {
            staking_contract,
            token_contract,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check the settings a session cannot run without.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.staking_contract.is_zero() {
            return Err(EngineError::Config("staking_contract is not set".into()));
        }
        if self.token_contract.is_zero() {
            return Err(EngineError::Config("token_contract is not set".into()));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(EngineError::Config(
                "confirmation_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            staking_contract: default_contract(),
            token_contract: default_contract(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn addr(byte: u8) -> AccountAddress {
        AccountAddress::new([byte; 20])
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = EngineConfig::new(addr(1), addr(2));
        let toml_str = config.to_toml_string().unwrap();
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.staking_contract, addr(1));
        assert_eq!(parsed.token_contract, addr(2));
        assert_eq!(parsed.gateway.url, config.gateway.url);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.chain_id, ChainId::ARBITRUM_ONE);
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.gateway.poll_interval_ms, 2_000);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            chain_id = 11155111
            staking_contract = "0x1111111111111111111111111111111111111111"
            token_contract = "0x2222222222222222222222222222222222222222"
            confirmation_timeout_secs = 15
            log_format = "json"

            [gateway]
            url = "http://relay.internal:9000"
        "#;
        let config = EngineConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.chain_id, ChainId::SEPOLIA);
        assert_eq!(config.staking_contract, addr(0x11));
        assert_eq!(config.confirmation_timeout_secs, 15);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.gateway.url, "http://relay.internal:9000");
        assert_eq!(config.gateway.request_timeout_secs, 30); // default
        config.validate().unwrap();
    }

    #[test]
    fn malformed_address_is_a_config_error() {
        let err = EngineConfig::from_toml_str(r#"staking_contract = "0x12""#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn validate_requires_contracts_and_timeout() {
        assert!(EngineConfig::default().validate().is_err());
        assert!(EngineConfig::new(addr(1), AccountAddress::ZERO).validate().is_err());

        let mut config = EngineConfig::new(addr(1), addr(2));
        config.validate().unwrap();
        config.confirmation_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confirmation_timeout_secs = 90").unwrap();
        let config = EngineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.confirmation_timeout_secs, 90);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
