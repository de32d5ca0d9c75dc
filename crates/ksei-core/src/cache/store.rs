use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Keychain service name used by [`KeyringTokenStore`].
const KEYRING_SERVICE: &str = "ksei-auth";

/// Extension of the per-key files written by [`FileTokenStore`].
const ENTRY_EXTENSION: &str = "json";

/// Suffix source for temp files, unique within the process.
static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("token store key must not be empty")]
    EmptyKey,

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to parse token entry {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("keychain error: {0}")]
    Keyring(#[source] Arc<keyring::Error>),

    #[error("keychain task failed: {0}")]
    Blocking(#[source] Arc<tokio::task::JoinError>),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }
}

/// Persistence for bearer tokens, keyed by username.
///
/// `get` returns `Ok(None)` on a miss; errors are reserved for a backend that
/// could not answer at all.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON-encoded entry per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        // Escaping keeps usernames containing '/' or '..' inside the directory
        Ok(self
            .dir
            .join(format!("{}.{}", urlencoding::encode(key), ENTRY_EXTENSION)))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;

        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let value: String = serde_json::from_slice(&contents).map_err(|e| StoreError::Codec {
            path: path.clone(),
            source: Arc::new(e),
        })?;

        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let contents = serde_json::to_vec(value).map_err(|e| StoreError::Codec {
            path: path.clone(),
            source: Arc::new(e),
        })?;

        // Write-then-rename so a concurrent reader never sees a torn entry.
        // Temp names are unique per write; two logins for one user can overlap.
        let tmp = path.with_extension(format!(
            "{}.{}.{}.tmp",
            ENTRY_EXTENSION,
            std::process::id(),
            NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::io(&path, e));
        }

        debug!(path = %path.display(), "Token entry written");
        Ok(())
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Tokens kept in the OS keychain, one entry per username.
#[derive(Debug, Clone)]
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Run a blocking keychain call off the async worker threads.
    async fn with_entry<R, F>(&self, key: &str, call: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(keyring::Entry) -> Result<R, StoreError> + Send + 'static,
    {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        let service = self.service.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let entry =
                keyring::Entry::new(&service, &key).map_err(|e| StoreError::Keyring(Arc::new(e)))?;
            call(entry)
        })
        .await
        .map_err(|e| StoreError::Blocking(Arc::new(e)))?
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for KeyringTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Keyring(Arc::new(e))),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let value = value.to_string();
        self.with_entry(key, move |entry| {
            entry
                .set_password(&value)
                .map_err(|e| StoreError::Keyring(Arc::new(e)))
        })
        .await
    }
}
