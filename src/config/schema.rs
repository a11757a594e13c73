use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub login: LoginConfig,
}

// ── Vetting API ─────────────────────────────────────────────────

/// Which backend route a DOT lookup goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiEndpoint {
    /// Workflow result passed through the report parser.
    #[default]
    Parsed,
    /// Unparsed workflow result.
    Raw,
}

impl ApiEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Parsed => "/fmsca/dot_parse",
            Self::Raw => "/vetting/dot",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL, without trailing slash.
    pub base_url: String,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    /// Ask the backend for canned data instead of live FMCSA lookups.
    pub mock: bool,
    pub timeout_secs: u64,
    pub endpoint: ApiEndpoint,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            tenant_id: None,
            user_id: None,
            mock: true,
            timeout_secs: 30,
            endpoint: ApiEndpoint::Parsed,
        }
    }
}

// ── Auth sync ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Page-storage poll period.
    pub poll_interval_ms: u64,
    /// Messages the runtime bus buffers before dropping.
    pub bus_capacity: usize,
    /// Forward a logged-out state on the very first poll even though
    /// nothing was ever forwarded before.
    pub forward_initial_absent: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            bus_capacity: 64,
            forward_initial_absent: true,
        }
    }
}

// ── Storage ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `file` or `memory`.
    pub kind: String,
    /// Store file location; defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: "file".into(),
            path: None,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = super::project_dirs()
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory; set storage.path"))?;
        Ok(dirs.data_dir().join("auth_store.json"))
    }
}

// ── Login ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// External page where the user signs in.
    pub url: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/login".into(),
        }
    }
}
