//! Provider wire protocols and the provider registry.
//!
//! Each provider family implements [`WireProtocol`]: it renders the canonical
//! conversation into a request and normalizes the response back into usage,
//! a finish signal and the assistant's content. The protocol is chosen once,
//! when a model is selected, from [`ProviderProfile::wire`].

pub mod anthropic;
pub mod http;
pub mod openai;
pub mod registry;

pub use registry::{ProviderProfile, ProviderRegistry, UsageKeys};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::ModelInfo;
use crate::error::{Result, StepError};
use crate::types::{ContentPart, Message, ToolCall, Usage};

/// Request/response family spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// OpenAI-style `/chat/completions` (OpenAI, XAI, MistralAI).
    ChatCompletions,
    /// Anthropic `/v1/messages`.
    Messages,
}

impl WireFormat {
    /// The protocol implementation for this wire format.
    pub fn protocol(&self) -> &'static dyn WireProtocol {
        match self {
            Self::ChatCompletions => &openai::ChatCompletions,
            Self::Messages => &anthropic::Messages,
        }
    }
}

/// Shape of the tool-schema array a provider expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStyle {
    /// `{"type": "function", "function": {"name", "description", "parameters"}}`
    Parameters,
    /// `{"name", "description", "input_schema"}`
    InputSchema,
}

/// Everything a protocol needs to render one request.
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub profile: &'a ProviderProfile,
    pub url: &'a str,
    pub model: &'a str,
    pub model_info: &'a ModelInfo,
    pub credential: &'a str,
    pub messages: &'a [Message],
    /// Out-of-band system text, for profiles with `system_out_of_band`.
    pub system: Option<&'a str>,
    /// Tool schemas already in this provider's [`SchemaStyle`].
    pub tools: &'a [Value],
    /// Extra top-level body fields from the `.llm` statement.
    pub options: &'a serde_json::Map<String, Value>,
}

/// A fully rendered HTTP request.
#[derive(Debug, Clone)]
pub struct RenderedRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Provider's indication of why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishSignal {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

/// Assistant content extracted from a response, in provider order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub parts: Vec<ContentPart>,
}

impl AssistantReply {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }
}

/// Per-provider normalization strategy.
pub trait WireProtocol: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tool-schema shape this protocol sends.
    fn schema_style(&self) -> SchemaStyle;

    fn render_request(&self, input: &RenderInput<'_>) -> RenderedRequest;

    /// Token counts, read from `usage` with the profile's field names.
    fn extract_usage(&self, body: &Value, profile: &ProviderProfile) -> Result<Usage> {
        let usage = body
            .get("usage")
            .ok_or_else(|| StepError::Protocol(format!("{}: response has no usage", profile.name)))?;
        let read = |key: &str| {
            usage.get(key).and_then(Value::as_u64).ok_or_else(|| {
                StepError::Protocol(format!("{}: usage field {key} missing", profile.name))
            })
        };
        Ok(Usage {
            input_tokens: read(&profile.usage_keys.input)?,
            output_tokens: read(&profile.usage_keys.output)?,
        })
    }

    fn finish_signal(&self, body: &Value) -> Result<FinishSignal>;

    /// Assistant text and tool calls, in the order the provider returned them.
    fn extract_reply(&self, body: &Value) -> Result<AssistantReply>;
}

/// Insert `.llm` pass-through options without clobbering required fields.
pub(crate) fn merge_options(body: &mut Value, options: &serde_json::Map<String, Value>) {
    if let Some(obj) = body.as_object_mut() {
        for (key, value) in options {
            if key == "model" || key == "messages" {
                continue;
            }
            obj.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_selects_protocol() {
        assert_eq!(WireFormat::ChatCompletions.protocol().name(), "chat_completions");
        assert_eq!(WireFormat::Messages.protocol().name(), "messages");
        assert_eq!(
            WireFormat::Messages.protocol().schema_style(),
            SchemaStyle::InputSchema
        );
    }

    #[test]
    fn default_usage_extraction_uses_profile_keys() {
        let body = serde_json::json!({"usage": {"input_tokens": 12, "output_tokens": 3}});
        let usage = anthropic::Messages
            .extract_usage(&body, &ProviderProfile::anthropic())
            .unwrap();
        assert_eq!(usage, Usage { input_tokens: 12, output_tokens: 3 });

        let err = openai::ChatCompletions
            .extract_usage(&body, &ProviderProfile::openai())
            .unwrap_err();
        assert!(matches!(err, StepError::Protocol(_)));
    }

    #[test]
    fn merge_options_keeps_model_and_messages() {
        let mut body = serde_json::json!({"model": "m1", "messages": []});
        let mut options = serde_json::Map::new();
        options.insert("model".into(), "other".into());
        options.insert("temperature".into(), 0.2.into());
        merge_options(&mut body, &options);
        assert_eq!(body["model"], "m1");
        assert_eq!(body["temperature"], 0.2);
    }
}
