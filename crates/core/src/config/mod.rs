//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (MCAP_CACHE_*)
//! 2. TOML config file (if MCAP_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::manifest::AssetManifest;

mod validation;

pub use validation::ConfigError;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin that serves the static site, e.g. `https://mcap.example`.
    ///
    /// Set via MCAP_CACHE_ORIGIN. Required to serve.
    #[serde(default)]
    pub origin: Option<String>,

    /// Name of the current cache generation. Must change whenever the
    /// manifest changes.
    ///
    /// Set via MCAP_CACHE_CACHE_VERSION.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Assets precached at install.
    ///
    /// Set via MCAP_CACHE_MANIFEST as a list, e.g. `["/", "/index.html"]`.
    #[serde(default)]
    pub manifest: AssetManifest,

    /// Path to the SQLite cache store.
    ///
    /// Set via MCAP_CACHE_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the local front listens on.
    ///
    /// Set via MCAP_CACHE_LISTEN_ADDR.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via MCAP_CACHE_USER_AGENT.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes accepted per upstream response.
    ///
    /// Set via MCAP_CACHE_MAX_BYTES.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via MCAP_CACHE_TIMEOUT_MS.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed per upstream request.
    ///
    /// Set via MCAP_CACHE_MAX_REDIRECTS.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Manifest assets fetched concurrently during install.
    ///
    /// Set via MCAP_CACHE_INSTALL_CONCURRENCY.
    #[serde(default = "default_install_concurrency")]
    pub install_concurrency: usize,
}

fn default_cache_version() -> String {
    "mcap-app-cache-v2".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mcap-cache.sqlite")
}

fn default_listen_addr() -> String {
    "127.0.0.1:4173".into()
}

fn default_user_agent() -> String {
    "mcap-cache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_install_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: None,
            cache_version: default_cache_version(),
            manifest: AssetManifest::default(),
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            install_concurrency: default_install_concurrency(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources and validate it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file or environment cannot be
    /// parsed, or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MCAP_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("MCAP_CACHE_").ignore(&["config_file"]));

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The upstream origin, required before the front can serve.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no origin is configured.
    pub fn require_origin(&self) -> Result<&str, ConfigError> {
        self.origin.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "origin".into(),
            hint: "Set MCAP_CACHE_ORIGIN environment variable".into(),
        })
    }
}
