use billmod_types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration of a processing-module binary.
///
/// Loaded from a toml file; an absent file means defaults, since modules run
/// under the panel's working directory where the stock layout usually holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Billing database the module reads from.
    pub db_path: PathBuf,
    /// Marker file whose presence suppresses provisioning operations.
    pub maintenance_marker: PathBuf,
    /// Endpoint name carried by connection-refused errors of the local
    /// panel transport.
    pub host_endpoint: String,
    /// Key path for the secret-param cipher, empty for passthrough.
    pub crypt_key: String,
    /// How many log lines the error journal keeps around a failure.
    pub log_window: usize,
    /// Wall-clock budget for retrying refused panel connections.
    pub retry_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("var/billing.db"),
            maintenance_marker: PathBuf::from("etc/maintenance"),
            host_endpoint: "panel".to_string(),
            crypt_key: String::new(),
            log_window: 100,
            retry_timeout_secs: 86_400,
        }
    }
}

impl Config {
    /// Load from `BILLMOD_CONF` when set, defaults otherwise.
    pub fn load() -> Result<Self> {
        match std::env::var("BILLMOD_CONF") {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| Error::with_value("config", "parse", err.to_string()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|err| Error::with_value("config", "serialize", err.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn maintenance_active(&self) -> bool {
        self.maintenance_marker.exists()
    }
}
