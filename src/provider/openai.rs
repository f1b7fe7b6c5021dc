//! OpenAI-style Chat Completions protocol (OpenAI, XAI, MistralAI).

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, StepError};
use crate::types::{ContentPart, Message, Role, ToolCall};

use super::http::{bearer_headers, extend_headers};
use super::{
    merge_options, AssistantReply, FinishSignal, RenderInput, RenderedRequest, SchemaStyle,
    WireProtocol,
};

/// `/chat/completions` request and response shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletions;

impl WireProtocol for ChatCompletions {
    fn name(&self) -> &'static str {
        "chat_completions"
    }

    fn schema_style(&self) -> SchemaStyle {
        SchemaStyle::Parameters
    }

    fn render_request(&self, input: &RenderInput<'_>) -> RenderedRequest {
        let messages: Vec<Value> = input
            .messages
            .iter()
            .flat_map(message_to_openai)
            .collect();

        let mut body = json!({
            "model": input.model,
            "messages": messages,
        });
        if !input.tools.is_empty() {
            body["tools"] = Value::Array(input.tools.to_vec());
        }
        merge_options(&mut body, input.options);

        let mut headers = bearer_headers(input.credential);
        extend_headers(&mut headers, &input.profile.extra_headers);

        debug!(provider = %input.profile.name, model = input.model, "rendered chat completions request");

        RenderedRequest {
            url: input.url.to_string(),
            headers,
            body,
        }
    }

    fn finish_signal(&self, body: &Value) -> Result<FinishSignal> {
        let reason = first_choice(body)?
            .get("finish_reason")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::Protocol("choices[0].finish_reason missing".into()))?;
        Ok(parse_finish_reason(reason))
    }

    fn extract_reply(&self, body: &Value) -> Result<AssistantReply> {
        let message = first_choice(body)?
            .get("message")
            .ok_or_else(|| StepError::Protocol("choices[0].message missing".into()))?;

        let mut parts = Vec::new();
        if let Some(text) = message.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                parts.push(ContentPart::text(text));
            }
        }

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                parts.push(ContentPart::ToolCall(parse_tool_call(call)?));
            }
        }

        Ok(AssistantReply { parts })
    }
}

fn first_choice(body: &Value) -> Result<&Value> {
    body.get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| StepError::Protocol("no choices in response".into()))
}

fn parse_finish_reason(s: &str) -> FinishSignal {
    match s {
        "stop" => FinishSignal::Stop,
        "tool_calls" => FinishSignal::ToolCalls,
        "length" => FinishSignal::Length,
        other => FinishSignal::Other(other.to_string()),
    }
}

fn parse_tool_call(call: &Value) -> Result<ToolCall> {
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::Protocol("tool call without id".into()))?;
    let function = call
        .get("function")
        .ok_or_else(|| StepError::Protocol(format!("tool call {id} without function")))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::Protocol(format!("tool call {id} without name")))?;

    // Arguments arrive as a JSON-encoded string; some servers send an object.
    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => json!({}),
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| {
            StepError::Protocol(format!("tool call {id} has malformed arguments: {e}"))
        })?,
        Some(other) => other.clone(),
    };

    Ok(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

/// Render one canonical message. Tool messages expand to one wire message per
/// result, each keyed by its own `tool_call_id`.
fn message_to_openai(msg: &Message) -> Vec<Value> {
    if msg.role == Role::Tool {
        return msg
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolResult(tr) => Some(json!({
                    "role": "tool",
                    "tool_call_id": tr.tool_call_id,
                    "name": tr.name,
                    "content": tr.content,
                })),
                _ => None,
            })
            .collect();
    }

    let role = msg.role.as_str();
    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.joined_text();
        return vec![json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": calls,
        })];
    }

    // Simple single-text message
    if let [ContentPart::Text { text }] = msg.content.as_slice() {
        return vec![json!({ "role": role, "content": text })];
    }

    let parts: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(json!({ "type": "text", "text": text })),
            ContentPart::Image(img) => Some(json!({
                "type": "image_url",
                "image_url": {
                    "detail": "high",
                    "url": format!("data:{};base64,{}", img.media_type, img.data),
                }
            })),
            // Results of run-tool statements land here as text; stray
            // provider results are rendered as plain text too.
            ContentPart::ToolResult(tr) => Some(json!({ "type": "text", "text": tr.content })),
            ContentPart::ToolCall(_) => None,
        })
        .collect();

    vec![json!({ "role": role, "content": parts })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelInfo;
    use crate::provider::ProviderProfile;
    use crate::types::ImageContent;
    use pretty_assertions::assert_eq;

    fn render(messages: &[Message], tools: &[Value]) -> RenderedRequest {
        let profile = ProviderProfile::openai();
        let info = ModelInfo::new("OpenAI", 128_000, 0.0, 0.0);
        let options = serde_json::Map::new();
        ChatCompletions.render_request(&RenderInput {
            profile: &profile,
            url: &profile.url,
            model: "gpt-4o",
            model_info: &info,
            credential: "sk-test",
            messages,
            system: None,
            tools,
            options: &options,
        })
    }

    #[test]
    fn renders_simple_conversation() {
        let request = render(&[Message::user("hello")], &[]);
        assert_eq!(
            request.body,
            json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hello"}],
            })
        );
        assert_eq!(
            request.headers.get("authorization").unwrap(),
            "Bearer sk-test"
        );
    }

    #[test]
    fn renders_tool_exchange_with_ids() {
        let assistant = Message {
            role: Role::Assistant,
            content: vec![
                ContentPart::ToolCall(ToolCall {
                    id: "call_a".into(),
                    name: "readfile".into(),
                    arguments: json!({"filename": "a.txt"}),
                }),
                ContentPart::ToolCall(ToolCall {
                    id: "call_b".into(),
                    name: "readfile".into(),
                    arguments: json!({"filename": "b.txt"}),
                }),
            ],
        };
        let results = Message {
            role: Role::Tool,
            content: vec![
                ContentPart::ToolResult(crate::types::ToolResult {
                    tool_call_id: "call_a".into(),
                    name: "readfile".into(),
                    content: "A".into(),
                }),
                ContentPart::ToolResult(crate::types::ToolResult {
                    tool_call_id: "call_b".into(),
                    name: "readfile".into(),
                    content: "B".into(),
                }),
            ],
        };
        let request = render(&[Message::user("go"), assistant, results], &[]);
        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], Value::Null);
        assert_eq!(messages[1]["tool_calls"][1]["id"], "call_b");
        assert_eq!(
            messages[1]["tool_calls"][0]["function"]["arguments"],
            "{\"filename\":\"a.txt\"}"
        );
        assert_eq!(messages[2]["tool_call_id"], "call_a");
        assert_eq!(messages[3]["tool_call_id"], "call_b");
        assert_eq!(messages[3]["content"], "B");
    }

    #[test]
    fn renders_images_as_data_urls() {
        let message = Message {
            role: Role::User,
            content: vec![
                ContentPart::text("what is this"),
                ContentPart::Image(ImageContent {
                    media_type: "image/png".into(),
                    data: "AAAA".into(),
                }),
            ],
        };
        let request = render(&[message], &[]);
        let parts = &request.body["messages"][0]["content"];
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn includes_tools_when_present() {
        let tools = vec![json!({"type": "function", "function": {"name": "readfile"}})];
        let request = render(&[Message::user("x")], &tools);
        assert_eq!(request.body["tools"][0]["function"]["name"], "readfile");
    }

    #[test]
    fn extracts_text_reply() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1}
        });
        assert_eq!(ChatCompletions.finish_signal(&body).unwrap(), FinishSignal::Stop);
        let reply = ChatCompletions.extract_reply(&body).unwrap();
        assert_eq!(reply.text(), "hi");
        assert!(reply.tool_calls().is_empty());
    }

    #[test]
    fn extracts_multiple_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "c1", "type": "function", "function": {"name": "readfile", "arguments": "{\"filename\":\"a.txt\"}"}},
                        {"id": "c2", "type": "function", "function": {"name": "askuser", "arguments": ""}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        });
        assert_eq!(
            ChatCompletions.finish_signal(&body).unwrap(),
            FinishSignal::ToolCalls
        );
        let reply = ChatCompletions.extract_reply(&body).unwrap();
        let calls = reply.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, json!({"filename": "a.txt"}));
        assert_eq!(calls[1].arguments, json!({}));
    }

    #[test]
    fn malformed_arguments_are_protocol_errors() {
        let body = json!({
            "choices": [{
                "message": {"tool_calls": [{"id": "c1", "function": {"name": "x", "arguments": "{not json"}}]},
                "finish_reason": "tool_calls"
            }]
        });
        assert!(matches!(
            ChatCompletions.extract_reply(&body),
            Err(StepError::Protocol(_))
        ));
    }

    #[test]
    fn missing_choices_is_protocol_error() {
        assert!(matches!(
            ChatCompletions.finish_signal(&json!({"usage": {}})),
            Err(StepError::Protocol(_))
        ));
    }
}
