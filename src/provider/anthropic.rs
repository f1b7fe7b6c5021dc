//! Anthropic Messages API protocol.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, StepError};
use crate::types::{ContentPart, Message, Role, ToolCall};

use super::http::{anthropic_headers, extend_headers};
use super::{
    merge_options, AssistantReply, FinishSignal, RenderInput, RenderedRequest, SchemaStyle,
    WireProtocol,
};

/// Value sent in the `anthropic-version` header.
pub const API_VERSION: &str = "2023-06-01";

/// `/v1/messages` request and response shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages;

impl WireProtocol for Messages {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn schema_style(&self) -> SchemaStyle {
        SchemaStyle::InputSchema
    }

    fn render_request(&self, input: &RenderInput<'_>) -> RenderedRequest {
        let mut system_parts: Vec<String> = input
            .system
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default();
        let mut messages: Vec<Value> = Vec::new();

        for msg in input.messages {
            match msg.role {
                Role::System => system_parts.push(msg.joined_text()),
                Role::User => push_merged(&mut messages, "user", user_blocks(&msg.content)),
                Role::Assistant => {
                    push_merged(&mut messages, "assistant", assistant_blocks(&msg.content))
                }
                Role::Tool => {
                    let blocks = msg
                        .content
                        .iter()
                        .filter_map(|part| match part {
                            ContentPart::ToolResult(tr) => Some(json!({
                                "type": "tool_result",
                                "tool_use_id": tr.tool_call_id,
                                "content": tr.content,
                            })),
                            _ => None,
                        })
                        .collect();
                    push_merged(&mut messages, "user", blocks);
                }
            }
        }

        let mut body = json!({
            "model": input.model,
            "messages": messages,
            "max_tokens": input.model_info.output_budget(),
        });
        if let Some(obj) = body.as_object_mut() {
            if !system_parts.is_empty() {
                obj.insert("system".into(), system_parts.join("\n").into());
            }
            if !input.tools.is_empty() {
                obj.insert("tools".into(), Value::Array(input.tools.to_vec()));
            }
        }
        merge_options(&mut body, input.options);

        let mut headers = anthropic_headers(input.credential, API_VERSION);
        extend_headers(&mut headers, &input.profile.extra_headers);

        debug!(model = input.model, "rendered anthropic messages request");

        RenderedRequest {
            url: input.url.to_string(),
            headers,
            body,
        }
    }

    fn finish_signal(&self, body: &Value) -> Result<FinishSignal> {
        let reason = body
            .get("stop_reason")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Protocol("stop_reason missing".into()))?;
        Ok(match reason {
            "end_turn" | "stop_sequence" => FinishSignal::Stop,
            "tool_use" => FinishSignal::ToolCalls,
            "max_tokens" => FinishSignal::Length,
            other => FinishSignal::Other(other.to_string()),
        })
    }

    fn extract_reply(&self, body: &Value) -> Result<AssistantReply> {
        let blocks = body
            .get("content")
            .cloned()
            .ok_or_else(|| StepError::Protocol("response has no content".into()))?;
        let blocks: Vec<ContentBlock> = serde_json::from_value(blocks)
            .map_err(|e| StepError::Protocol(format!("malformed content blocks: {e}")))?;

        let mut parts = Vec::new();
        for block in blocks {
            match block.r#type.as_str() {
                "text" => {
                    if let Some(text) = block.text.filter(|t| !t.is_empty()) {
                        parts.push(ContentPart::text(text));
                    }
                }
                "tool_use" => {
                    let (Some(id), Some(name)) = (block.id, block.name) else {
                        return Err(StepError::Protocol("tool_use block without id or name".into()));
                    };
                    parts.push(ContentPart::ToolCall(ToolCall {
                        id,
                        name,
                        arguments: block.input.unwrap_or_else(|| json!({})),
                    }));
                }
                other => debug!(block_type = other, "ignoring content block"),
            }
        }
        Ok(AssistantReply { parts })
    }
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

fn user_blocks(parts: &[ContentPart]) -> Vec<Value> {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
            ContentPart::Image(img) => Some(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": img.media_type,
                    "data": img.data,
                }
            })),
            ContentPart::ToolResult(tr) => Some(json!({ "type": "text", "text": tr.content })),
            ContentPart::ToolCall(_) => None,
        })
        .collect()
}

fn assistant_blocks(parts: &[ContentPart]) -> Vec<Value> {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } if !text.is_empty() => {
                Some(json!({ "type": "text", "text": text }))
            }
            ContentPart::ToolCall(tc) => Some(json!({
                "type": "tool_use",
                "id": tc.id,
                "name": tc.name,
                "input": tc.arguments,
            })),
            _ => None,
        })
        .collect()
}

/// Anthropic requires strictly alternating roles, so tool results (sent as
/// user turns) merge into an adjacent user turn.
fn push_merged(messages: &mut Vec<Value>, role: &str, blocks: Vec<Value>) {
    if blocks.is_empty() {
        return;
    }
    if let Some(last) = messages.last_mut() {
        if last["role"] == role {
            if let Some(content) = last["content"].as_array_mut() {
                content.extend(blocks);
                return;
            }
        }
    }
    messages.push(json!({ "role": role, "content": blocks }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelInfo;
    use crate::provider::ProviderProfile;
    use crate::types::ToolResult;
    use pretty_assertions::assert_eq;

    fn render(messages: &[Message], system: Option<&str>) -> RenderedRequest {
        let profile = ProviderProfile::anthropic();
        let info = ModelInfo::new("Anthropic", 200_000, 0.0, 0.0).with_max_output_tokens(8192);
        let options = serde_json::Map::new();
        Messages.render_request(&RenderInput {
            profile: &profile,
            url: &profile.url,
            model: "claude-sonnet-4-20250514",
            model_info: &info,
            credential: "ak-test",
            messages,
            system,
            tools: &[],
            options: &options,
        })
    }

    #[test]
    fn system_text_goes_in_dedicated_field() {
        let request = render(&[Message::user("hi")], Some("be brief\nand kind"));
        assert_eq!(request.body["system"], "be brief\nand kind");
        assert_eq!(request.body["max_tokens"], 8192);
        assert_eq!(
            request.body["messages"],
            json!([{"role": "user", "content": [{"type": "text", "text": "hi"}]}])
        );
        assert_eq!(request.headers.get("anthropic-version").unwrap(), API_VERSION);
        assert_eq!(request.headers.get("x-api-key").unwrap(), "ak-test");
    }

    #[test]
    fn no_system_field_when_empty() {
        let request = render(&[Message::user("hi")], Some(""));
        assert!(request.body.get("system").is_none());
    }

    #[test]
    fn tool_results_become_user_blocks() {
        let assistant = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::text("checking"),
                ContentPart::ToolCall(ToolCall {
                    id: "toolu_1".into(),
                    name: "readfile".into(),
                    arguments: json!({"filename": "a.txt"}),
                }),
            ],
        };
        let results = Message {
            role: Role::Tool,
            content: vec![ContentPart::ToolResult(ToolResult {
                tool_call_id: "toolu_1".into(),
                name: "readfile".into(),
                content: "contents".into(),
            })],
        };
        let request = render(
            &[Message::user("read it"), assistant, results, Message::user("thanks")],
            None,
        );
        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[1]["content"][1]["input"]["filename"], "a.txt");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][1]["text"], "thanks");
    }

    #[test]
    fn extracts_text_and_tool_use() {
        let body = json!({
            "content": [
                {"type": "text", "text": "let me look"},
                {"type": "tool_use", "id": "toolu_9", "name": "wwwget", "input": {"url": "https://example.test"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        });
        assert_eq!(Messages.finish_signal(&body).unwrap(), FinishSignal::ToolCalls);
        let reply = Messages.extract_reply(&body).unwrap();
        assert_eq!(reply.text(), "let me look");
        assert_eq!(reply.tool_calls()[0].id, "toolu_9");
    }

    #[test]
    fn end_turn_is_stop() {
        let body = json!({"content": [{"type": "text", "text": "done"}], "stop_reason": "end_turn"});
        assert_eq!(Messages.finish_signal(&body).unwrap(), FinishSignal::Stop);
        assert_eq!(
            Messages.finish_signal(&json!({"stop_reason": "max_tokens"})).unwrap(),
            FinishSignal::Length
        );
    }
}
