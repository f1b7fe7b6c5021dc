//! The send/tool loop run by `.exec`.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::events::{EngineEvent, EventEmitter};
use super::state::Session;
use super::ticker::ProgressTicker;
use super::{Engine, EngineOptions};
use crate::error::{Result, StepError};
use crate::provider::http::{describe_headers, describe_response, redact_images};
use crate::provider::{FinishSignal, RenderInput, RenderedRequest};
use crate::script::Statement;
use crate::tools::ToolArguments;
use crate::transcript::Transcript;
use crate::types::{Message, Role, ToolCall, Usage};

/// A successful provider response.
struct Exchange {
    body: Value,
    usage: Usage,
}

impl Engine<'_> {
    /// Send the conversation, dispatching tool calls until the provider
    /// answers with plain text.
    pub(super) async fn send(&mut self, statement: &Statement) -> Result<()> {
        let ctx = self.ctx;
        let Some(session) = self.session.as_ref() else {
            return Err(StepError::syntax(
                self.script.as_str(),
                statement.line,
                ".exec before .llm: select a model first",
            ));
        };
        let protocol = session.protocol;
        let tools = ctx.tools.schemas().for_style(protocol.schema_style());
        let mut round: u32 = 0;

        loop {
            self.conversation.coalesce();
            if self.conversation.messages.is_empty() {
                return Err(StepError::InvalidState(format!(
                    "{}:{}: nothing to send, the conversation has no messages",
                    self.script, statement.line
                )));
            }

            let system = if session.profile.system_out_of_band {
                self.conversation.system_text()
            } else {
                None
            };
            let request = protocol.render_request(&RenderInput {
                profile: &session.profile,
                url: &session.url,
                model: &session.model,
                model_info: &session.info,
                credential: &session.credential,
                messages: &self.conversation.messages,
                system: system.as_deref(),
                tools,
                options: &session.options,
            });

            self.events.emit(EngineEvent::RequestStarted {
                provider: session.profile.name.clone(),
                url: request.url.clone(),
                messages: self.conversation.messages.len(),
                round,
            });
            let started = Instant::now();
            let (exchange, ticks) =
                post(&ctx.client, &ctx.options, &self.events, session, &request).await?;
            let elapsed = started.elapsed();

            self.conversation
                .totals
                .record(&exchange.usage, session.info.input, session.info.output);
            info!(
                model = %session.model,
                elapsed_ms = elapsed.as_millis() as u64,
                input_tokens = exchange.usage.input_tokens,
                output_tokens = exchange.usage.output_tokens,
                "response received"
            );
            self.events.emit(EngineEvent::ResponseReceived {
                elapsed_ms: elapsed.as_millis() as u64,
                usage: exchange.usage,
                ticks,
            });

            let signal = protocol.finish_signal(&exchange.body)?;
            let reply = protocol.extract_reply(&exchange.body)?;
            let calls: Vec<ToolCall> = reply.tool_calls().into_iter().cloned().collect();

            match (&signal, calls.is_empty()) {
                (FinishSignal::ToolCalls, true) => {
                    return Err(StepError::Protocol(
                        "provider requested tool calls but sent none".into(),
                    ))
                }
                (FinishSignal::ToolCalls, false) => {}
                (other, false) => {
                    warn!(signal = ?other, calls = calls.len(), "tool calls without a tool-call finish signal");
                }
                (FinishSignal::Length, true) => warn!("response truncated at the output token limit"),
                (FinishSignal::Other(reason), true) => debug!(reason = %reason, "unusual finish reason"),
                (FinishSignal::Stop, true) => {}
            }

            let text = reply.text();
            if !text.is_empty() {
                self.events.emit(EngineEvent::AssistantText { text: text.clone() });
            }

            if calls.is_empty() {
                self.conversation.push(Message::assistant(text));
                break;
            }

            round += 1;
            if let Some(max) = ctx.options.max_tool_rounds {
                if round > max {
                    return Err(StepError::InvalidState(format!(
                        "tool loop exceeded {max} rounds"
                    )));
                }
            }

            self.conversation.push(Message {
                role: Role::Assistant,
                content: reply.parts,
            });
            for call in calls {
                self.events.emit(EngineEvent::ToolCallStarted { call: call.clone() });
                let args = ToolArguments::from_json(&call.arguments)?;
                let content = ctx.tools.invoke(&call.name, &args).await?;
                self.events.emit(EngineEvent::ToolResult {
                    tool_call_id: Some(call.id.clone()),
                    name: call.name.clone(),
                    content: content.clone(),
                });
                self.conversation
                    .push(Message::tool_result(call.id, call.name, content));
            }
        }

        if let Some(writer) = &ctx.options.transcript {
            let path = writer.write(&Transcript {
                script: self.script.clone(),
                model: Some(session.model.clone()),
                saved_at: chrono::Utc::now(),
                totals: self.conversation.totals.clone(),
                messages: self.conversation.messages.clone(),
            })?;
            self.events.emit(EngineEvent::TranscriptWritten { path });
        }
        Ok(())
    }
}

/// POST one request and classify the response. Returns the parsed exchange
/// and the number of progress ticks emitted while waiting.
async fn post(
    client: &reqwest::Client,
    options: &EngineOptions,
    events: &EventEmitter,
    session: &Session,
    request: &RenderedRequest,
) -> Result<(Exchange, u64)> {
    let ticker = options.progress.then(|| {
        let events = events.clone();
        ProgressTicker::start(options.tick_interval, move |count| {
            events.emit(EngineEvent::Tick { count })
        })
    });

    let sent = client
        .post(&request.url)
        .headers(request.headers.clone())
        .json(&request.body)
        .send()
        .await;

    let ticks = match ticker {
        Some(ticker) => ticker.stop().await,
        None => 0,
    };
    let response = sent?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let mut shown = request.body.clone();
        redact_images(&mut shown);
        return Err(StepError::Api {
            status: status.as_u16(),
            url: request.url.clone(),
            headers: describe_headers(&request.headers),
            request: serde_json::to_string_pretty(&shown)?,
            response: describe_response(&text, session.profile.response_is_json),
        });
    }

    let body: Value = serde_json::from_str(&text)
        .map_err(|e| StepError::Protocol(format!("response is not JSON: {e}")))?;
    let usage = session.protocol.extract_usage(&body, &session.profile)?;
    debug!(status = status.as_u16(), "provider response");
    Ok((Exchange { body, usage }, ticks))
}
