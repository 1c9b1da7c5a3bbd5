use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use portal_core::PortalConfig;

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

/// `~/.config/portal-notify/config.json` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("portal-notify").join("config.json"))
}

/// Load the explicit config file, else the default one if present, else
/// built-in defaults; then apply overrides.
pub fn resolve(explicit: Option<&Path>, overrides: &Overrides) -> Result<PortalConfig> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            PortalConfig::load(path)?
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => PortalConfig::load(&path)?,
            None => PortalConfig::default(),
        },
    };

    apply_overrides(&mut config, overrides);
    config.feed.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut PortalConfig, overrides: &Overrides) {
    if let Some(base_url) = &overrides.base_url {
        config.service.base_url = base_url.clone();
    }
    if let Some(token) = &overrides.token {
        config.service.token = Some(token.clone());
    }
    if let Some(interval) = overrides.poll_interval_ms {
        config.feed.poll_interval_ms = interval;
    }
}
