use crate::core::aggregator::{
    AggregatorSettings, DEFAULT_CACHE_TIMEOUT, DEFAULT_FETCH_TIMEOUT, DEFAULT_TTL,
};
use crate::providers::{birdeye, moralis};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Deserialize, Serialize, Clone)]
pub struct MoralisProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for MoralisProviderConfig {
    fn default() -> Self {
        Self {
            base_url: moralis::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct BirdeyeProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_chain() -> String {
    birdeye::DEFAULT_CHAIN.to_string()
}

impl Default for BirdeyeProviderConfig {
    fn default() -> Self {
        Self {
            base_url: birdeye::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            chain: default_chain(),
        }
    }
}

/// Keys are never printed, only whether one is set.
fn redacted(api_key: &str) -> &'static str {
    if api_key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for MoralisProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoralisProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

impl fmt::Debug for BirdeyeProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BirdeyeProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("chain", &self.chain)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub moralis: MoralisProviderConfig,
    #[serde(default)]
    pub birdeye: BirdeyeProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Keep entries on disk across restarts instead of in memory.
    pub persist: bool,
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL.as_secs(),
            persist: true,
            timeout_ms: DEFAULT_CACHE_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_single_flight() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub asset_address: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
    #[serde(default)]
    pub server: ServerConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "tokenomics", "tokenomics")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            ttl: Duration::from_secs(self.cache.ttl_seconds),
            fetch_timeout: self.fetch_timeout(),
            cache_timeout: Duration::from_millis(self.cache.timeout_ms),
            single_flight: self.single_flight,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn moralis_api_key(&self) -> String {
        resolve_api_key(&self.providers.moralis.api_key, "MORALIS_API_KEY")
    }

    pub fn birdeye_api_key(&self) -> String {
        resolve_api_key(&self.providers.birdeye.api_key, "BIRDEYE_API_KEY")
    }
}

/// A key set in the config file wins over the environment.
fn resolve_api_key(configured: &str, env_var: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    std::env::var(env_var).unwrap_or_default()
}
