use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use dao_client_core::address::parse_address;
use dao_shared::domain::{ContractAddresses, AGENT_FACTORY_ADDRESS, GOVERNOR_ADDRESS, TOKEN_ADDRESS};
use ethers::utils::to_checksum;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "governance.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Empty means no wallet endpoint is configured.
    pub rpc_url: String,
    pub chain_id: u64,
    pub token_address: String,
    pub governor_address: String,
    pub agent_factory_address: String,
    pub log_level: String,
    pub poll_interval_ms: u64,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub private_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            chain_id: 31337,
            token_address: to_checksum(&TOKEN_ADDRESS, None),
            governor_address: to_checksum(&GOVERNOR_ADDRESS, None),
            agent_factory_address: to_checksum(&AGENT_FACTORY_ADDRESS, None),
            log_level: "info".into(),
            poll_interval_ms: 4_000,
            private_key: None,
        }
    }
}

impl Settings {
    pub fn contract_addresses(&self) -> anyhow::Result<ContractAddresses> {
        let parse = |name: &str, value: &str| {
            parse_address(value).map_err(|err| anyhow!("{name} '{value}': {err}"))
        };
        Ok(ContractAddresses {
            token: parse("token_address", &self.token_address)?,
            governor: parse("governor_address", &self.governor_address)?,
            agent_factory: parse("agent_factory_address", &self.agent_factory_address)?,
        })
    }

    pub fn wallet_endpoint(&self) -> Option<&str> {
        let url = self.rpc_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Defaults, then the config file, then `APP__*` environment variables.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = read_config_file(config_path)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    validate(&settings)?;
    Ok(settings)
}

fn read_config_file(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(Settings::default());
            }
            default
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed reading config file '{}'", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed parsing config file '{}'", path.display()))
}

pub(crate) fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = lookup("APP__CHAIN_ID") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.chain_id = parsed;
        }
    }
    if let Some(v) = lookup("APP__TOKEN_ADDRESS") {
        settings.token_address = v;
    }
    if let Some(v) = lookup("APP__GOVERNOR_ADDRESS") {
        settings.governor_address = v;
    }
    if let Some(v) = lookup("APP__AGENT_FACTORY_ADDRESS") {
        settings.agent_factory_address = v;
    }
    if let Some(v) = lookup("APP__LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = lookup("APP__POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.poll_interval_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__PRIVATE_KEY") {
        if !v.trim().is_empty() {
            settings.private_key = Some(v);
        }
    }
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    if let Some(url) = settings.wallet_endpoint() {
        Url::parse(url).with_context(|| format!("invalid rpc_url '{url}'"))?;
    }
    if settings.chain_id == 0 {
        return Err(anyhow!("chain_id must be > 0"));
    }
    if settings.poll_interval_ms == 0 {
        return Err(anyhow!("poll_interval_ms must be > 0"));
    }
    settings.contract_addresses()?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
