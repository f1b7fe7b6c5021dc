//! Terminal rendering of engine events.

use std::io::Write;
use std::sync::Arc;

use crate::engine::{EngineEvent, EngineEventSink};
use crate::script::StatementKind;

/// Longest tool result echoed to the terminal before truncation.
const RESULT_PREVIEW: usize = 200;

/// Sink that prints events as the engine produces them.
pub fn terminal_sink() -> EngineEventSink {
    Arc::new(|event: &EngineEvent| {
        if let EngineEvent::Tick { .. } = event {
            print!(".");
            let _ = std::io::stdout().flush();
        } else if let Some(line) = render(event) {
            println!("{line}");
        }
    })
}

/// Text shown for `event`, or `None` for events that stay silent.
pub fn render(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::ScriptStarted { script, statements } => {
            Some(format!("== {script} ({statements} statements)"))
        }
        EngineEvent::StatementStarted { statement } => match statement.kind {
            StatementKind::Comment => None,
            _ => Some(statement.to_string()),
        },
        EngineEvent::ModelSelected { model, provider, .. } => {
            Some(format!("   model {model} via {provider}"))
        }
        EngineEvent::FileDeleted { path } => Some(format!("   deleted {}", path.display())),
        EngineEvent::RequestStarted { .. } | EngineEvent::Tick { .. } => None,
        EngineEvent::ResponseReceived {
            elapsed_ms,
            usage,
            ticks,
        } => {
            // Tick dots are printed without a newline.
            let lead = if *ticks > 0 { "\n" } else { "" };
            Some(format!(
                "{lead}   {:.1}s in={} out={}",
                *elapsed_ms as f64 / 1000.0,
                usage.input_tokens,
                usage.output_tokens
            ))
        }
        EngineEvent::AssistantText { text } => Some(text.clone()),
        EngineEvent::ToolCallStarted { call } => {
            Some(format!("   tool {}({})", call.name, call.arguments))
        }
        EngineEvent::ToolResult { name, content, .. } => {
            Some(format!("   {name} -> {}", preview(content)))
        }
        EngineEvent::Debug { snapshot } => Some(
            serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| snapshot.to_string()),
        ),
        EngineEvent::TranscriptWritten { path } => {
            Some(format!("   transcript {}", path.display()))
        }
        EngineEvent::Finished { script, totals } => Some(format!("== {script}: {totals}")),
    }
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    match flat.char_indices().nth(RESULT_PREVIEW) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Statement;
    use crate::types::Usage;

    #[test]
    fn comments_and_requests_are_silent() {
        let comment = Statement::new(1, StatementKind::Comment, "note", 1);
        assert!(render(&EngineEvent::StatementStarted { statement: comment }).is_none());
        assert!(render(&EngineEvent::RequestStarted {
            provider: "OpenAI".into(),
            url: "u".into(),
            messages: 1,
            round: 0,
        })
        .is_none());
    }

    #[test]
    fn ticks_have_no_line_of_their_own() {
        assert!(render(&EngineEvent::Tick { count: 3 }).is_none());
    }

    #[test]
    fn response_line_breaks_after_ticks() {
        let line = render(&EngineEvent::ResponseReceived {
            elapsed_ms: 1500,
            usage: Usage { input_tokens: 3, output_tokens: 4 },
            ticks: 2,
        })
        .unwrap();
        assert_eq!(line, "\n   1.5s in=3 out=4");
    }

    #[test]
    fn long_tool_results_are_truncated() {
        let text = "x".repeat(RESULT_PREVIEW + 50);
        let line = render(&EngineEvent::ToolResult {
            tool_call_id: None,
            name: "readfile".into(),
            content: text,
        })
        .unwrap();
        assert!(line.ends_with("..."));
        assert!(line.len() < RESULT_PREVIEW + 30);
    }
}
