//! Configuration (layered: TOML file, then environment).
//!
//! ```toml
//! steps_dir = "steps"
//! logs_dir = "logs"
//! extension = "step"
//! models_file = "models.json"
//! progress = true
//! transcript = true
//! max_tool_rounds = 8
//!
//! [endpoints]
//! OpenAI = "http://localhost:8080/v1/chat/completions"
//! ```
//!
//! API keys are never read from the file: they come from the environment
//! variables named by each provider's credential key (a `.env` file is
//! honored), and otherwise from the credential store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::ModelCatalog;
use crate::error::{Result, StepError};
use crate::provider::ProviderRegistry;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "stepwise.toml";

/// Settings for a stepwise run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepwiseConfig {
    /// Directory holding step scripts.
    pub steps_dir: PathBuf,
    /// Directory transcripts are written to.
    pub logs_dir: PathBuf,
    /// Step script file extension, without the dot.
    pub extension: String,
    /// JSON model catalog replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_file: Option<PathBuf>,
    /// Print progress ticks while a request is outstanding.
    pub progress: bool,
    /// Write a transcript after each completed send.
    pub transcript: bool,
    /// Upper bound on tool-call rounds per send; unbounded when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<u32>,
    /// Model selected by the most recent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_model: Option<String>,
    /// Endpoint overrides keyed by provider name.
    pub endpoints: BTreeMap<String, String>,
    /// API keys keyed by credential key, filled from the environment.
    #[serde(skip)]
    pub api_keys: BTreeMap<String, String>,
    #[serde(skip)]
    pub(crate) source: Option<PathBuf>,
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            steps_dir: PathBuf::from("steps"),
            logs_dir: PathBuf::from("logs"),
            extension: "step".to_string(),
            models_file: None,
            progress: true,
            transcript: true,
            max_tool_rounds: None,
            last_model: None,
            endpoints: BTreeMap::new(),
            api_keys: BTreeMap::new(),
            source: None,
        }
    }
}

impl StepwiseConfig {
    /// Parse TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| StepError::Configuration(format!("invalid config: {e}")))
    }

    /// Load `path`, or `stepwise.toml` when present, then layer the
    /// environment on top.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>, registry: &ProviderRegistry) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let mut config = Self::from_toml_str(&raw)?;
                config.source = Some(path.clone());
                debug!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Self::default(),
            Err(e) => {
                return Err(StepError::Configuration(format!(
                    "cannot read config {}: {e}",
                    path.display()
                )))
            }
        };

        config.apply_env(registry, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Layer environment values on top of the file settings.
    ///
    /// `STEPWISE_STEPS_DIR` and `STEPWISE_LOGS_DIR` override the directories;
    /// each provider's credential key variable supplies its API key.
    pub fn apply_env(&mut self, registry: &ProviderRegistry, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("STEPWISE_STEPS_DIR") {
            self.steps_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("STEPWISE_LOGS_DIR") {
            self.logs_dir = PathBuf::from(dir);
        }
        for profile in registry.profiles() {
            if let Some(key) = var(&profile.credential_key).filter(|k| !k.is_empty()) {
                self.api_keys.insert(profile.credential_key.clone(), key);
            }
        }
    }

    /// File this config was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Built-in providers with configured endpoint overrides applied.
    pub fn provider_registry(&self) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::builtin();
        for (provider, url) in &self.endpoints {
            registry.override_url(provider, url.clone())?;
        }
        Ok(registry)
    }

    /// The configured model catalog, or the built-in one.
    pub fn model_catalog(&self) -> Result<ModelCatalog> {
        match &self.models_file {
            Some(path) => ModelCatalog::load(path),
            None => Ok(ModelCatalog::builtin()),
        }
    }

    /// Glob pattern for step files whose name starts with `prefix`.
    pub fn step_pattern(&self, prefix: &str) -> String {
        self.steps_dir
            .join(format!("{prefix}*.{}", self.extension))
            .to_string_lossy()
            .into_owned()
    }

    /// Record `model` as the last one used, writing it back to the config
    /// file this config was loaded from. Without a source file only the
    /// in-memory value changes.
    pub fn remember_model(&mut self, model: &str) -> Result<()> {
        if self.last_model.as_deref() == Some(model) {
            return Ok(());
        }
        self.last_model = Some(model.to_string());
        if let Some(path) = &self.source {
            let serialized = toml::to_string(self).map_err(|e| {
                StepError::Configuration(format!("cannot encode config: {e}"))
            })?;
            std::fs::write(path, serialized)?;
            info!(path = %path.display(), model, "remembered model");
        }
        Ok(())
    }
}
