use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::ChunkSizes;
use crate::error::{AppError, Result};
use crate::transfer::upload::{UploadOptions, MAX_FILE_SIZE};
use crate::Provider;

pub const DEFAULT_CONFIG_FILE: &str = "relay-drive.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub provider: Provider,
    pub upload_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Hosted REST store; `None` means local snapshot only.
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub local_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            local_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("relay-drive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_file_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: 500,
            request_timeout_secs: 60,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            max_file_size: self.max_file_size,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            attempt_timeout: self.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used for new uploads.
    pub provider: Provider,
    pub download_url: String,
    pub relays: Vec<RelayConfig>,
    pub store: StoreConfig,
    pub transfer: TransferConfig,
    pub chunk_sizes: ChunkSizes,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: Provider::Discord,
            download_url: "http://localhost:3000/api/download".to_string(),
            relays: vec![
                RelayConfig {
                    provider: Provider::Discord,
                    upload_url: "http://localhost:3000/api/discord".to_string(),
                },
                RelayConfig {
                    provider: Provider::Telegram,
                    upload_url: "http://localhost:3000/api/telegram".to_string(),
                },
            ],
            store: StoreConfig::default(),
            transfer: TransferConfig::default(),
            chunk_sizes: ChunkSizes::default(),
        }
    }
}

impl Config {
    /// Read `path` if it exists, otherwise start from defaults; environment
    /// overrides are applied either way.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("SUPABASE_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_ANON_KEY") {
            self.store.anon_key = Some(key);
        }
        if let Some(url) = non_empty("RELAY_DRIVE_DOWNLOAD_URL") {
            self.download_url = url;
        }
    }

    /// Hosted store credentials, when both halves are configured.
    pub fn hosted_store(&self) -> Option<(&str, &str)> {
        match (&self.store.url, &self.store.anon_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}
