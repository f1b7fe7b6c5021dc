//! Model catalog: model name to owning provider, context size and pricing.
//!
//! The catalog is built once (from the built-in table or a JSON file) and
//! handed to the engine read-only. JSON files use the same shape as the
//! built-in table:
//!
//! ```json
//! { "gpt-4o": { "company": "OpenAI", "context": 128000,
//!               "input": 0.0000025, "output": 0.00001 } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StepError};

/// Catalog entry for one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    /// Owning provider, as named in the provider registry.
    #[serde(rename = "company", alias = "provider")]
    pub provider: String,
    /// Context window in tokens.
    pub context: u32,
    /// Output token cap, when the provider needs one in the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Price per input token (USD).
    pub input: f64,
    /// Price per output token (USD).
    pub output: f64,
}

impl ModelInfo {
    pub fn new(provider: impl Into<String>, context: u32, input: f64, output: f64) -> Self {
        Self {
            provider: provider.into(),
            context,
            max_output_tokens: None,
            input,
            output,
        }
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// Output token budget sent to providers that require one.
    pub fn output_budget(&self) -> u32 {
        self.max_output_tokens.unwrap_or(self.context)
    }
}

/// Read-only model lookup table.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelInfo>,
}

const PER_M: f64 = 1.0 / 1_000_000.0;

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of commonly used models.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert("gpt-4o", ModelInfo::new("OpenAI", 128_000, 2.5 * PER_M, 10.0 * PER_M));
        catalog.insert("gpt-4o-mini", ModelInfo::new("OpenAI", 128_000, 0.15 * PER_M, 0.6 * PER_M));
        catalog.insert("gpt-4.1", ModelInfo::new("OpenAI", 1_047_576, 2.0 * PER_M, 8.0 * PER_M));
        catalog.insert("gpt-4.1-mini", ModelInfo::new("OpenAI", 1_047_576, 0.4 * PER_M, 1.6 * PER_M));
        catalog.insert("grok-2-latest", ModelInfo::new("XAI", 131_072, 2.0 * PER_M, 10.0 * PER_M));
        catalog.insert("grok-3", ModelInfo::new("XAI", 131_072, 3.0 * PER_M, 15.0 * PER_M));
        catalog.insert(
            "mistral-large-latest",
            ModelInfo::new("MistralAI", 131_072, 2.0 * PER_M, 6.0 * PER_M),
        );
        catalog.insert(
            "mistral-small-latest",
            ModelInfo::new("MistralAI", 32_768, 0.2 * PER_M, 0.6 * PER_M),
        );
        catalog.insert(
            "claude-sonnet-4-20250514",
            ModelInfo::new("Anthropic", 200_000, 3.0 * PER_M, 15.0 * PER_M)
                .with_max_output_tokens(8_192),
        );
        catalog.insert(
            "claude-3-5-sonnet-latest",
            ModelInfo::new("Anthropic", 200_000, 3.0 * PER_M, 15.0 * PER_M)
                .with_max_output_tokens(8_192),
        );
        catalog.insert(
            "claude-3-5-haiku-latest",
            ModelInfo::new("Anthropic", 200_000, 0.8 * PER_M, 4.0 * PER_M)
                .with_max_output_tokens(8_192),
        );
        catalog
    }

    /// Parse a catalog from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let models: BTreeMap<String, ModelInfo> = serde_json::from_str(raw)
            .map_err(|e| StepError::Configuration(format!("invalid model catalog: {e}")))?;
        Ok(Self { models })
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StepError::Configuration(format!("cannot read model catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), models = catalog.len(), "loaded model catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, name: impl Into<String>, info: ModelInfo) {
        self.models.insert(name.into(), info);
    }

    pub fn get(&self, name: &str) -> Option<&ModelInfo> {
        self.models.get(name)
    }

    /// Look up a model, failing with a configuration error when unknown.
    pub fn lookup(&self, name: &str) -> Result<&ModelInfo> {
        self.get(name)
            .ok_or_else(|| StepError::Configuration(format!("model {name} is not defined")))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Entries sorted by provider, then model name.
    pub fn by_provider(&self) -> Vec<(&str, &ModelInfo)> {
        let mut entries: Vec<(&str, &ModelInfo)> =
            self.models.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.1.provider.cmp(&b.1.provider).then(a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_knows_every_registry_provider() {
        let catalog = ModelCatalog::builtin();
        for provider in ["OpenAI", "XAI", "MistralAI", "Anthropic"] {
            assert!(
                catalog.by_provider().iter().any(|(_, m)| m.provider == provider),
                "no model for {provider}"
            );
        }
    }

    #[test]
    fn json_catalog_accepts_company_key() {
        let catalog = ModelCatalog::from_json_str(
            r#"{"m1": {"company": "OpenAI", "context": 8000, "input": 0.000001, "output": 0.000002}}"#,
        )
        .unwrap();
        let info = catalog.lookup("m1").unwrap();
        assert_eq!(info.provider, "OpenAI");
        assert_eq!(info.context, 8000);
        assert_eq!(info.output_budget(), 8000);
    }

    #[test]
    fn entry_missing_company_is_configuration_error() {
        let err = ModelCatalog::from_json_str(r#"{"m1": {"context": 1, "input": 0.0, "output": 0.0}}"#)
            .unwrap_err();
        match err {
            StepError::Configuration(message) => assert!(message.contains("company"), "{message}"),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn provider_key_is_still_accepted() {
        let catalog = ModelCatalog::from_json_str(
            r#"{"m1": {"provider": "XAI", "context": 1, "input": 0.0, "output": 0.0}}"#,
        )
        .unwrap();
        assert_eq!(catalog.lookup("m1").unwrap().provider, "XAI");
    }

    #[test]
    fn unknown_model_is_configuration_error() {
        let err = ModelCatalog::builtin().lookup("no-such-model").unwrap_err();
        assert!(matches!(err, StepError::Configuration(_)));
    }

    #[test]
    fn by_provider_sorts_by_provider_then_name() {
        let mut catalog = ModelCatalog::new();
        catalog.insert("zeta", ModelInfo::new("A", 1, 0.0, 0.0));
        catalog.insert("alpha", ModelInfo::new("B", 1, 0.0, 0.0));
        catalog.insert("beta", ModelInfo::new("A", 1, 0.0, 0.0));
        let names: Vec<&str> = catalog.by_provider().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["beta", "zeta", "alpha"]);
    }
}
