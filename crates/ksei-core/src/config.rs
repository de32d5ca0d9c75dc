//! Application configuration management.
//!
//! This module handles loading and saving the persisted configuration: an
//! optional base URL override, request timeout, last used username, the
//! token store backend and an optional reference data file.
//!
//! Configuration is stored at `~/.config/ksei/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::ClientOptions;
use crate::cache::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ksei";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Token cache directory below the cache dir
const AUTH_DIR: &str = "auth";

/// Where cached bearer tokens are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    /// One JSON file per username under the cache directory.
    #[default]
    File,
    /// OS keychain.
    Keyring,
    /// No caching; every request logs in.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub last_username: Option<String>,
    #[serde(default)]
    pub plain_password: bool,
    #[serde(default)]
    pub token_store: TokenStoreKind,
    pub reference_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding file-backed token entries.
    pub fn auth_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(AUTH_DIR))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Instantiate the configured token store backend.
    pub fn open_token_store(&self) -> Result<Option<Arc<dyn TokenStore>>> {
        Ok(match self.token_store {
            TokenStoreKind::File => {
                let dir = self.auth_dir()?;
                let store = FileTokenStore::new(&dir)
                    .with_context(|| format!("Failed to open token store at {}", dir.display()))?;
                Some(Arc::new(store) as Arc<dyn TokenStore>)
            }
            TokenStoreKind::Keyring => Some(Arc::new(KeyringTokenStore::new()) as Arc<dyn TokenStore>),
            TokenStoreKind::None => None,
        })
    }

    /// Client options for the given credentials, applying this config.
    pub fn client_options(&self, username: String, password: String) -> Result<ClientOptions> {
        Ok(ClientOptions {
            username,
            password,
            plain_password: self.plain_password,
            timeout: self.timeout(),
            base_url: self.base_url.clone(),
            token_store: self.open_token_store()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert!(!config.plain_password);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_config_round_trips_store_kind() {
        let config = Config {
            token_store: TokenStoreKind::Keyring,
            timeout_secs: Some(10),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""token_store":"keyring""#));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.token_store, TokenStoreKind::Keyring);
        assert_eq!(parsed.timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_client_options_without_store() {
        let config = Config {
            token_store: TokenStoreKind::None,
            plain_password: true,
            base_url: Some("http://localhost:8080/service".to_string()),
            ..Default::default()
        };
        let options = config
            .client_options("investor".to_string(), "pw".to_string())
            .unwrap();
        assert!(options.token_store.is_none());
        assert!(options.plain_password);
        assert_eq!(options.base_url.as_deref(), Some("http://localhost:8080/service"));
    }
}
