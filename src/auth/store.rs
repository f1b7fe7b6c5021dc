use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StepError};

/// Storage abstraction for provider API keys.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed credential store: one TOML table of `key = "secret"` pairs.
///
/// The file is written with mode 0600 on unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.stepwise/credentials.toml`
    pub fn new_default() -> Self {
        Self::new(default_stepwise_dir().join("credentials.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_file(&self) -> Result<CredentialFile> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CredentialFile::default())
            }
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&raw).map_err(|e| {
            StepError::Credential(format!("malformed {}: {e}", self.path.display()))
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load_file()?.keys.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut file = self.load_file()?;
        file.keys.insert(key.to_string(), value.to_string());
        file.saved_at = Some(Utc::now());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string(&file)
            .map_err(|e| StepError::Credential(format!("cannot encode credentials: {e}")))?;
        fs::write(&self.path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!(key, path = %self.path.display(), "stored credential");
        Ok(())
    }
}

/// In-process store, for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut keys) = store.keys.lock() {
            keys.insert(key.into(), value.into());
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| StepError::Credential("credential store poisoned".into()))?;
        Ok(keys.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| StepError::Credential("credential store poisoned".into()))?;
        keys.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

pub(crate) fn default_stepwise_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".stepwise"))
        .unwrap_or_else(|| PathBuf::from(".stepwise"))
}
