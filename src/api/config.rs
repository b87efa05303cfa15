// Configuration for the deploy runner
//
// Loading, saving and building `DeployConfig`, plus the environment overlay
// that supplies RPC URLs and secrets.

use crate::api::types::{DeployConfig, NetworkSettings};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the verification API key
pub const ETHERSCAN_API_KEY: &str = "ETHERSCAN_API_KEY";

/// Configuration manager for the deploy runner
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<DeployConfig> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = serde_json::from_str(&config_str)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(config: &DeployConfig, path: P) -> Result<()> {
        let config_str = serde_json::to_string_pretty(config)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    /// Create a builder for configuration
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Overlay values from the process environment
    pub fn apply_env(config: &mut DeployConfig) {
        Self::apply_env_with(config, |key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`
    ///
    /// For every network `<name>`, `<NAME>_RPC_URL` replaces the URL and
    /// `<NAME>_PRIVATE_KEY` (comma separated) supplies the signing accounts.
    pub fn apply_env_with<F>(config: &mut DeployConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, settings) in config.networks.iter_mut() {
            let prefix = env_prefix(name);

            if let Some(url) = lookup(&format!("{}_RPC_URL", prefix)).filter(|v| !v.is_empty()) {
                settings.url = Some(url);
            }

            if let Some(keys) = lookup(&format!("{}_PRIVATE_KEY", prefix)) {
                let keys: Vec<String> = keys
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(String::from)
                    .collect();
                if !keys.is_empty() {
                    settings.accounts = keys;
                }
            }
        }

        if let Some(api_key) = lookup(ETHERSCAN_API_KEY).filter(|v| !v.is_empty()) {
            config.etherscan.api_key = Some(api_key);
        }
    }
}

fn env_prefix(network: &str) -> String {
    network
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Builder for creating configurations
#[derive(Default)]
pub struct ConfigBuilder {
    config: DeployConfig,
}

impl ConfigBuilder {
    /// Set the network used when none is given
    pub fn default_network(mut self, name: &str) -> Self {
        self.config.default_network = name.to_string();
        self
    }

    /// Add or replace a network
    pub fn network(mut self, settings: NetworkSettings) -> Self {
        self.config.networks.insert(settings.name.clone(), settings);
        self
    }

    /// Map a role to an account index
    pub fn named_account(mut self, name: &str, index: usize) -> Self {
        self.config.named_accounts.insert(name.to_string(), index);
        self
    }

    pub fn etherscan_api_key(mut self, api_key: &str) -> Self {
        self.config.etherscan.api_key = Some(api_key.to_string());
        self
    }

    pub fn compiler_version(mut self, version: &str) -> Self {
        self.config.etherscan.compiler_version = version.to_string();
        self
    }

    pub fn artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifacts_dir = Some(dir.into());
        self
    }

    pub fn deployments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.deployments_dir = dir.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> DeployConfig {
        self.config
    }
}
