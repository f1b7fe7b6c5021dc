//! Engine progress events.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::script::Statement;
use crate::types::{RunTotals, ToolCall, Usage};

/// Callback receiving engine events.
pub type EngineEventSink = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// What the engine is doing, for terminal rendering and logs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    ScriptStarted {
        script: String,
        statements: usize,
    },
    StatementStarted {
        statement: Statement,
    },
    ModelSelected {
        model: String,
        provider: String,
        url: String,
    },
    FileDeleted {
        path: PathBuf,
    },
    RequestStarted {
        provider: String,
        url: String,
        messages: usize,
        round: u32,
    },
    /// A progress tick while a request is outstanding; `count` starts at 1.
    Tick {
        count: u64,
    },
    ResponseReceived {
        elapsed_ms: u64,
        usage: Usage,
        ticks: u64,
    },
    AssistantText {
        text: String,
    },
    ToolCallStarted {
        call: ToolCall,
    },
    ToolResult {
        tool_call_id: Option<String>,
        name: String,
        content: String,
    },
    Debug {
        snapshot: serde_json::Value,
    },
    TranscriptWritten {
        path: PathBuf,
    },
    Finished {
        script: String,
        totals: RunTotals,
    },
}

/// Delivers events to an optional sink.
#[derive(Clone, Default)]
pub(crate) struct EventEmitter {
    sink: Option<EngineEventSink>,
}

impl EventEmitter {
    pub(crate) fn new(sink: Option<EngineEventSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: EngineEvent) {
        let Some(sink) = &self.sink else { return };
        (sink)(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn emitter_forwards_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let emitter = EventEmitter::new(Some(Arc::new(move |event: &EngineEvent| {
            sink_seen.lock().unwrap().push(serde_json::to_value(event).unwrap());
        })));

        emitter.emit(EngineEvent::AssistantText { text: "hi".into() });
        EventEmitter::default().emit(EngineEvent::AssistantText { text: "lost".into() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["type"], "assistant_text");
    }
}
