//! Provider profiles: fixed connection facts per LLM vendor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StepError};
use crate::types::Role;

use super::WireFormat;

/// Names of the usage counters in a provider's `usage` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageKeys {
    pub input: String,
    pub output: String,
}

impl UsageKeys {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Connection facts for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    /// Full endpoint URL requests are POSTed to.
    pub url: String,
    /// Key used to look up the credential (environment variable / store key).
    pub credential_key: String,
    pub usage_keys: UsageKeys,
    /// Whether error bodies are JSON and should be pretty-printed.
    pub response_is_json: bool,
    /// Role given to `.system` turns sent as messages.
    pub system_role: Role,
    /// System text goes in a dedicated request field instead of a message.
    pub system_out_of_band: bool,
    pub wire: WireFormat,
    /// Fixed headers added to every request.
    #[serde(default)]
    pub extra_headers: Vec<(String, String)>,
}

impl ProviderProfile {
    fn chat_completions(name: &str, url: &str, credential_key: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            credential_key: credential_key.to_string(),
            usage_keys: UsageKeys::new("prompt_tokens", "completion_tokens"),
            response_is_json: true,
            system_role: Role::System,
            system_out_of_band: false,
            wire: WireFormat::ChatCompletions,
            extra_headers: Vec::new(),
        }
    }

    pub fn openai() -> Self {
        Self::chat_completions(
            "OpenAI",
            "https://api.openai.com/v1/chat/completions",
            "OPENAI_API_KEY",
        )
    }

    pub fn xai() -> Self {
        let mut profile = Self::chat_completions(
            "XAI",
            "https://api.x.ai/v1/chat/completions",
            "X_AI_API_KEY",
        );
        profile.response_is_json = false;
        profile.system_role = Role::User;
        profile
    }

    pub fn mistral() -> Self {
        let mut profile = Self::chat_completions(
            "MistralAI",
            "https://api.mistral.ai/v1/chat/completions",
            "MISTRAL_API_KEY",
        );
        profile
            .extra_headers
            .push(("Accept".to_string(), "application/json".to_string()));
        profile
    }

    pub fn anthropic() -> Self {
        Self {
            name: "Anthropic".to_string(),
            url: "https://api.anthropic.com/v1/messages".to_string(),
            credential_key: "ANTHROPIC_API_KEY".to_string(),
            usage_keys: UsageKeys::new("input_tokens", "output_tokens"),
            response_is_json: true,
            system_role: Role::System,
            system_out_of_band: true,
            wire: WireFormat::Messages,
            extra_headers: Vec::new(),
        }
    }
}

/// Lookup table of provider profiles.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    profiles: BTreeMap<String, ProviderProfile>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with OpenAI, XAI, MistralAI and Anthropic.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for profile in [
            ProviderProfile::openai(),
            ProviderProfile::xai(),
            ProviderProfile::mistral(),
            ProviderProfile::anthropic(),
        ] {
            registry.insert(profile);
        }
        registry
    }

    pub fn insert(&mut self, profile: ProviderProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&ProviderProfile> {
        self.profiles.get(name)
    }

    /// Look up a provider, failing with a configuration error when unknown.
    pub fn lookup(&self, name: &str) -> Result<&ProviderProfile> {
        self.get(name)
            .ok_or_else(|| StepError::Configuration(format!("unknown provider {name}")))
    }

    /// Point a provider at a different endpoint.
    pub fn override_url(&mut self, name: &str, url: impl Into<String>) -> Result<()> {
        let profile = self
            .profiles
            .get_mut(name)
            .ok_or_else(|| StepError::Configuration(format!("unknown provider {name}")))?;
        profile.url = url.into();
        Ok(())
    }

    pub fn profiles(&self) -> impl Iterator<Item = &ProviderProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_match_wire_conventions() {
        let registry = ProviderRegistry::builtin();

        let anthropic = registry.lookup("Anthropic").unwrap();
        assert!(anthropic.system_out_of_band);
        assert_eq!(anthropic.wire, WireFormat::Messages);
        assert_eq!(anthropic.usage_keys.input, "input_tokens");

        let xai = registry.lookup("XAI").unwrap();
        assert_eq!(xai.system_role, Role::User);
        assert!(!xai.response_is_json);

        let mistral = registry.lookup("MistralAI").unwrap();
        assert_eq!(mistral.extra_headers.len(), 1);
        assert_eq!(mistral.usage_keys.output, "completion_tokens");
    }

    #[test]
    fn unknown_provider_is_configuration_error() {
        let err = ProviderRegistry::builtin().lookup("Nope").unwrap_err();
        assert!(matches!(err, StepError::Configuration(_)));
    }

    #[test]
    fn override_url_replaces_endpoint() {
        let mut registry = ProviderRegistry::builtin();
        registry
            .override_url("OpenAI", "http://localhost:9999/v1/chat/completions")
            .unwrap();
        assert_eq!(
            registry.lookup("OpenAI").unwrap().url,
            "http://localhost:9999/v1/chat/completions"
        );
        assert!(registry.override_url("Nope", "x").is_err());
    }
}
