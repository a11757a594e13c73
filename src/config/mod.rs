//! Configuration loading.
//!
//! `config.toml` lives in the platform config directory unless a path is
//! given explicitly. A missing file means defaults. A few environment
//! variables override the file so deployments can point at another backend
//! without editing it.

pub mod schema;

pub use schema::{ApiConfig, ApiEndpoint, Config, LoginConfig, StorageConfig, SyncConfig};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "carriervet", "carrier-vet")
}

/// Default location of `config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("Invalid config {}", p.display()))?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `CARRIER_VET_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("CARRIER_VET_API_URL") {
            self.api.base_url = url;
        }
        if let Some(tenant) = non_empty("CARRIER_VET_TENANT_ID") {
            self.api.tenant_id = Some(tenant);
        }
        if let Some(user) = non_empty("CARRIER_VET_USER_ID") {
            self.api.user_id = Some(user);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("api.base_url must start with http:// or https:// (got '{url}')");
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be greater than 0");
        }
        if self.sync.poll_interval_ms == 0 {
            bail!("sync.poll_interval_ms must be greater than 0");
        }
        if self.sync.bus_capacity == 0 {
            bail!("sync.bus_capacity must be greater than 0");
        }
        Ok(())
    }
}
