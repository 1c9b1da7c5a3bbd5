use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_INITIAL_LIMIT, DEFAULT_LOAD_MORE_LIMIT, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

/// Options recognized by the notification feed engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedConfig {
    /// Run background reconciliation while enabled
    pub auto_poll: bool,
    pub poll_interval_ms: u64,
    /// Page size for activation, refetch and poll passes
    pub initial_limit: usize,
    pub load_more_limit: usize,
    /// When false, fetching and polling are suspended; state is kept
    pub enabled: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            auto_poll: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            initial_limit: DEFAULT_INITIAL_LIMIT,
            load_more_limit: DEFAULT_LOAD_MORE_LIMIT,
            enabled: true,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("pollIntervalMs must be greater than zero");
        }
        if self.initial_limit == 0 {
            bail!("initialLimit must be greater than zero");
        }
        if self.load_more_limit == 0 {
            bail!("loadMoreLimit must be greater than zero");
        }
        Ok(())
    }
}

/// Connection settings for the HTTP notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalConfig {
    pub service: ServiceConfig,
    pub feed: FeedConfig,
}

impl PortalConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.feed.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }
}
