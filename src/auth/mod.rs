//! API key resolution.
//!
//! A provider's key is looked up by its profile's `credential_key`, in order:
//! explicitly configured keys, then the [`CredentialStore`], then the
//! [`Prompter`]. A prompted key is written back to the store.

pub mod store;

pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, StepError};
use crate::provider::ProviderProfile;
use crate::util::Prompter;

/// Finds (or asks for) the API key for a provider.
#[derive(Clone)]
pub struct CredentialResolver {
    explicit: BTreeMap<String, String>,
    store: Arc<dyn CredentialStore>,
    prompter: Arc<dyn Prompter>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            explicit: BTreeMap::new(),
            store,
            prompter,
        }
    }

    /// Keys that take precedence over the store, keyed by credential key.
    pub fn with_explicit(mut self, keys: BTreeMap<String, String>) -> Self {
        self.explicit = keys;
        self
    }

    pub fn prompter(&self) -> &Arc<dyn Prompter> {
        &self.prompter
    }

    /// Resolve the key for `profile`.
    pub fn resolve(&self, profile: &ProviderProfile) -> Result<String> {
        let key = &profile.credential_key;
        if let Some(value) = self.explicit.get(key).filter(|v| !v.is_empty()) {
            debug!(provider = %profile.name, "using configured API key");
            return Ok(value.clone());
        }
        if let Some(value) = self.store.get(key)?.filter(|v| !v.is_empty()) {
            debug!(provider = %profile.name, "using stored API key");
            return Ok(value);
        }
        self.replace(profile)
    }

    /// Prompt for a new key for `profile` and store it.
    pub fn replace(&self, profile: &ProviderProfile) -> Result<String> {
        let answer = self
            .prompter
            .prompt(&format!("Please enter your {} API key: ", profile.name))
            .map_err(|e| StepError::Credential(format!("{}: {e}", profile.name)))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(StepError::Credential("API key cannot be empty".into()));
        }
        self.store.set(&profile.credential_key, answer)?;
        info!(provider = %profile.name, "stored new API key");
        Ok(answer.to_string())
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("explicit", &self.explicit.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Show only the first and last few characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "...".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}...{tail}")
}
