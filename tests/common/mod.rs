//! Shared test helpers: mock provider endpoints and recording collaborators.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stepwise::auth::{CredentialResolver, CredentialStore, MemoryCredentialStore};
use stepwise::catalog::ModelCatalog;
use stepwise::engine::{EngineContext, EngineEvent, EngineOptions};
use stepwise::error::{Result, StepError};
use stepwise::provider::ProviderRegistry;
use stepwise::tools::builtin::readfile_tool;
use stepwise::tools::{ToolArguments, ToolDispatch, ToolSchemas};
use stepwise::util::Prompter;

pub const OPENAI_PATH: &str = "/v1/chat/completions";
pub const ANTHROPIC_PATH: &str = "/v1/messages";

/// Prompter that answers from a fixed list, then fails.
pub struct ScriptedPrompter {
    answers: Mutex<Vec<String>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&self, message: &str) -> Result<String> {
        self.asked.lock().unwrap().push(message.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| StepError::InvalidState("no scripted answer left".into()))
    }
}

/// Tool dispatch that records calls and answers with canned text.
pub struct RecordingTools {
    schemas: ToolSchemas,
    reply: Option<String>,
    calls: Mutex<Vec<(String, ToolArguments)>>,
}

impl RecordingTools {
    /// Advertises the `readfile` schema; every `readfile` call returns `reply`.
    pub fn new(reply: &str) -> Self {
        Self {
            schemas: ToolSchemas::from_tools(&[readfile_tool()]),
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Like [`RecordingTools::new`], but `readfile` answers
    /// `contents of <filename>` so results can be told apart.
    pub fn echoing() -> Self {
        Self {
            reply: None,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> Vec<(String, ToolArguments)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolDispatch for RecordingTools {
    async fn invoke(&self, name: &str, args: &ToolArguments) -> Result<String> {
        self.calls.lock().unwrap().push((name.to_string(), args.clone()));
        if name == "readfile" {
            Ok(match &self.reply {
                Some(reply) => reply.clone(),
                None => format!("contents of {}", args.get_str("filename").unwrap_or("?")),
            })
        } else {
            Err(StepError::UnknownTool(name.to_string()))
        }
    }

    fn schemas(&self) -> &ToolSchemas {
        &self.schemas
    }
}

/// Providers pointed at the mock server.
pub fn registry_for(server: &MockServer) -> ProviderRegistry {
    let mut registry = ProviderRegistry::builtin();
    registry
        .override_url("OpenAI", format!("{}{OPENAI_PATH}", server.uri()))
        .unwrap();
    registry
        .override_url("Anthropic", format!("{}{ANTHROPIC_PATH}", server.uri()))
        .unwrap();
    registry
}

/// Stored keys for both mocked providers; prompting is never expected.
pub fn test_credentials() -> CredentialResolver {
    let store = MemoryCredentialStore::with("OPENAI_API_KEY", "sk-test-openai-key");
    store.set("ANTHROPIC_API_KEY", "sk-ant-test-key").unwrap();
    CredentialResolver::new(Arc::new(store), Arc::new(ScriptedPrompter::new(&[])))
}

/// Engine context against the mock server.
pub fn context(server: &MockServer, tools: Arc<dyn ToolDispatch>) -> EngineContext {
    EngineContext::new(
        ModelCatalog::builtin(),
        registry_for(server),
        tools,
        test_credentials(),
    )
    .unwrap()
}

/// Options that collect every emitted event.
pub fn recording_options() -> (EngineOptions, Arc<Mutex<Vec<EngineEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let options = EngineOptions {
        event_sink: Some(Arc::new(move |event: &EngineEvent| {
            sink_events.lock().unwrap().push(event.clone());
        })),
        ..EngineOptions::default()
    };
    (options, events)
}

pub fn openai_text(text: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
    })
}

pub fn openai_tool_call(id: &str, name: &str, arguments: Value) -> Value {
    openai_tool_calls(&[(id, name, arguments)])
}

/// One response carrying several tool calls, in order.
pub fn openai_tool_calls(calls: &[(&str, &str, Value)]) -> Value {
    let calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, arguments)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": arguments.to_string()}
            })
        })
        .collect();
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": null, "tool_calls": calls},
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
    })
}

pub fn anthropic_text(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 3}
    })
}

/// One response carrying several `tool_use` blocks after a short text.
pub fn anthropic_tool_uses(calls: &[(&str, &str, Value)]) -> Value {
    let mut content = vec![json!({"type": "text", "text": "Reading both."})];
    content.extend(calls.iter().map(|(id, name, input)| {
        json!({"type": "tool_use", "id": id, "name": name, "input": input})
    }));
    json!({
        "id": "msg_tools",
        "type": "message",
        "role": "assistant",
        "content": content,
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 30, "output_tokens": 8}
    })
}

/// Answer every POST to `route` with `body`.
pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answer the next POST to `route` with `body`, once. Mounted earlier
/// mocks win while they still have uses left.
pub async fn mount_once(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// JSON bodies of every request the server received.
pub async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
