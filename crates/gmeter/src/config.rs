//! Configuration types, loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use gmeter_tracing::TracingConfig;
use reqwest::Url;
use serde::Deserialize;

/// Top-level proxy configuration, as loaded from file and environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub cassettes: CassetteConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Upstream the proxy forwards to while recording.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    /// Target base URL, http or https.
    #[serde(default)]
    pub url: Option<String>,

    /// Skip TLS certificate verification towards the target.
    #[serde(default)]
    pub insecure: bool,

    /// Upstream round-trip timeout. Unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Where cassettes are stored.
#[derive(Debug, Clone, Deserialize)]
pub struct CassetteConfig {
    #[serde(default = "default_cassette_dir")]
    pub dir: PathBuf,
}

fn default_listen_address() -> String {
    "localhost:8080".to_string()
}

fn default_cassette_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for CassetteConfig {
    fn default() -> Self {
        Self {
            dir: default_cassette_dir(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing target base URL: -t")]
    MissingTarget,

    #[error("failed to parse target URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("unsupported scheme: {0:?}")]
    UnsupportedScheme(String),
}

/// Validated, immutable settings the proxy is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub listen_address: String,
    pub target_url: Url,
    pub cassette_dir: PathBuf,
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

impl ProxyConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (GMETER_ prefix, __ for nesting)
    /// 2. TOML config file (a missing file is skipped)
    /// 3. Defaults
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config: ProxyConfig = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("GMETER_").split("__"))
            .extract()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<Options, ConfigError> {
        let raw = match self.target.url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ConfigError::MissingTarget),
        };

        let target_url = Url::parse(raw).map_err(|e| ConfigError::InvalidTarget {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if target_url.scheme() != "http" && target_url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme(target_url.scheme().to_string()));
        }

        Ok(Options {
            listen_address: self.server.listen_address.clone(),
            target_url,
            cassette_dir: self.cassettes.dir.clone(),
            insecure: self.target.insecure,
            timeout: self.target.timeout_secs.map(Duration::from_secs),
        })
    }
}
