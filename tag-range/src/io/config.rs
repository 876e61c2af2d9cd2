//! Resolver configuration loaded from an optional TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::OnBaseTagError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Resolver configuration (TOML).
///
/// Missing fields default to values that match a stock GitHub Actions run.
/// Flags and environment variables override file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Policy when the explicit `base_tag` does not resolve.
    pub on_base_tag_error: OnBaseTagError,

    pub github: GithubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GithubConfig {
    /// REST API root (GitHub Enterprise servers use `https://host/api/v3`).
    pub api_url: String,

    /// Number of past runs to fetch (GitHub caps this at 100).
    pub per_page: u32,

    /// Global timeout for the run-history request.
    pub http_timeout_secs: u64,

    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            per_page: 100,
            http_timeout_secs: 30,
            user_agent: concat!("tag-range/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        let api_url = self.github.api_url.trim();
        if !(api_url.starts_with("https://") || api_url.starts_with("http://")) {
            return Err(anyhow!("github.api_url must be an http(s) url"));
        }
        if self.github.per_page == 0 || self.github.per_page > 100 {
            return Err(anyhow!("github.per_page must be within 1..=100"));
        }
        if self.github.http_timeout_secs == 0 {
            return Err(anyhow!("github.http_timeout_secs must be > 0"));
        }
        if self.github.user_agent.trim().is_empty() {
            return Err(anyhow!("github.user_agent must be non-empty"));
        }
        Ok(())
    }

    /// Apply flag/environment overrides on top of file values.
    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self> {
        if let Some(policy) = overrides.on_base_tag_error {
            self.on_base_tag_error = policy;
        }
        if let Some(api_url) = &overrides.api_url {
            self.github.api_url = api_url.clone();
        }
        self.validate()?;
        Ok(self)
    }
}

/// Values supplied on the command line or through action inputs.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub on_base_tag_error: Option<OnBaseTagError>,
    pub api_url: Option<String>,
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ResolverConfig::default()`.
pub fn load_config(path: &Path) -> Result<ResolverConfig> {
    if !path.exists() {
        let cfg = ResolverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ResolverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
