//! Client configuration
//!
//! Defaults, TOML file loading, and environment overrides through an
//! injected lookup. Nothing here reads process state on its own.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default API base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2-0905";

/// Environment keys understood by [`ClientConfig::overlay_env`]
pub const ENV_API_BASE: &str = "OPENROUTER_API_BASE";
pub const ENV_MODEL: &str = "OPENROUTER_MODEL";
pub const ENV_SITE_URL: &str = "OPENROUTER_SITE_URL";
pub const ENV_APP_NAME: &str = "OPENROUTER_APP_NAME";

/// Defaults applied to every request that doesn't override them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API base; `/chat/completions` is appended
    pub base_url: String,
    /// Model used when a request names none
    pub model: String,
    /// Sent as `HTTP-Referer`
    pub site_url: Option<String>,
    /// Sent as `X-Title`
    pub app_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            site_url: None,
            app_name: None,
        }
    }
}

impl ClientConfig {
    /// Parse TOML; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid client config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        debug!("Loaded client config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, otherwise defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// `<config_dir>/chatstream/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatstream").join("config.toml"))
    }

    /// Apply `OPENROUTER_*` overrides. Empty values are ignored.
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base_url) = get(ENV_API_BASE) {
            self.base_url = base_url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(site_url) = get(ENV_SITE_URL) {
            self.site_url = Some(site_url);
        }
        if let Some(app_name) = get(ENV_APP_NAME) {
            self.app_name = Some(app_name);
        }
        self
    }
}
