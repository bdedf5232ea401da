//! Runtime configuration loaded from `avax-stats.toml`.
//!
//! Every value is optional: command-line flags take precedence, then the
//! file, then the built-in defaults from [`avax_stats::networks`].
//! When no config file is present the defaults alone are used.

use std::path::{Path, PathBuf};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use avax_stats::Network;
use avax_stats::networks::{AVASCAN_API, SUBSCRIPTIONS_CONTRACT, SUBSCRIPTIONS_CREATION_BLOCK};
use serde::Deserialize;

use crate::events::DEFAULT_EVENTS;
use crate::retry::RetryPolicy;

/// Default location of the contract artifact.
pub const DEFAULT_ABI_PATH: &str = "files/Subscriptions.json";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Event harvester settings.
    pub events: EventsConfig,
    /// Validator harvester settings.
    pub validators: ValidatorsConfig,
    /// Retry policy shared by both harvesters.
    pub retry: RetryPolicy,
}

/// `[events]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Ordered list of C-Chain RPC URLs (best first).
    pub rpcs: Vec<String>,
    /// Contract emitting the events.
    pub contract: Option<Address>,
    /// Compiler artifact holding the contract ABI.
    pub abi: Option<PathBuf>,
    /// First block to scan.
    pub start_block: Option<u64>,
    /// Event names to export, in output order.
    pub names: Vec<String>,
}

/// `[validators]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorsConfig {
    /// Base URL of the Avascan API.
    pub api: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns [`Config::default`] if the file does not exist,
    /// allowing the binary to work without any config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or has unknown keys.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl EventsConfig {
    /// RPC URLs to try, in order.
    ///
    /// Command-line URLs win over the config list, which wins over the
    /// public mainnet endpoint.
    #[must_use]
    pub fn rpcs(&self, cli: &[String]) -> Vec<String> {
        if !cli.is_empty() {
            cli.to_vec()
        } else if !self.rpcs.is_empty() {
            self.rpcs.clone()
        } else {
            vec![Network::Mainnet.c_chain_rpc().to_owned()]
        }
    }

    /// Contract to harvest.
    #[must_use]
    pub fn contract(&self, cli: Option<Address>) -> Address {
        cli.or(self.contract).unwrap_or(SUBSCRIPTIONS_CONTRACT)
    }

    /// Path of the ABI artifact.
    #[must_use]
    pub fn abi(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.abi.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ABI_PATH))
    }

    /// First block to scan.
    #[must_use]
    pub fn start_block(&self, cli: Option<u64>) -> u64 {
        cli.or(self.start_block)
            .unwrap_or(SUBSCRIPTIONS_CREATION_BLOCK)
    }

    /// Event names to export.
    #[must_use]
    pub fn names(&self, cli: &[String]) -> Vec<String> {
        if !cli.is_empty() {
            cli.to_vec()
        } else if !self.names.is_empty() {
            self.names.clone()
        } else {
            DEFAULT_EVENTS.iter().map(|n| (*n).to_owned()).collect()
        }
    }
}

impl ValidatorsConfig {
    /// Base URL of the API.
    #[must_use]
    pub fn api(&self, cli: Option<String>) -> String {
        cli.or_else(|| self.api.clone())
            .unwrap_or_else(|| AVASCAN_API.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(
            cfg.events.rpcs(&[]),
            vec!["https://api.avax.network/ext/bc/C/rpc".to_owned()]
        );
        assert_eq!(cfg.events.contract(None), SUBSCRIPTIONS_CONTRACT);
        assert_eq!(cfg.events.start_block(None), 28_953_227);
        assert_eq!(cfg.events.abi(None), PathBuf::from("files/Subscriptions.json"));
        assert_eq!(cfg.events.names(&[]), vec!["NewSubscription", "StopSubscription"]);
        assert_eq!(cfg.validators.api(None), "https://api-beta.avascan.info");
        assert_eq!(cfg.retry, RetryPolicy::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let cfg = Config::parse(
            r#"
            [events]
            rpcs = ["https://rpc.one", "https://rpc.two"]
            contract = "0x00000000000000000000000000000000000000aa"
            start_block = 32166124

            [validators]
            api = "http://localhost:9000"

            [retry]
            attempts = 1
            "#,
        )
        .unwrap();

        assert_eq!(cfg.events.rpcs(&[]).len(), 2);
        assert_eq!(
            cfg.events.contract(None),
            address!("00000000000000000000000000000000000000aa")
        );
        assert_eq!(cfg.events.start_block(None), 32_166_124);
        assert_eq!(cfg.validators.api(None), "http://localhost:9000");
        assert_eq!(cfg.retry.attempts, 1);
        assert_eq!(cfg.retry.backoff_ms, RetryPolicy::default().backoff_ms);
    }

    #[test]
    fn cli_values_win() {
        let cfg = Config::parse("[events]\nstart_block = 5\n").unwrap();
        assert_eq!(cfg.events.start_block(Some(7)), 7);
        assert_eq!(
            cfg.events.rpcs(&["https://cli".to_owned()]),
            vec!["https://cli".to_owned()]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("[events]\nrpc = \"x\"\n").is_err(), "typo accepted");
    }
}
