//! Conversation engine.
//!
//! An [`Engine`] executes one script's statements in order against a
//! [`Conversation`]. `.exec` runs the send loop: render the conversation for
//! the selected provider, POST it, record usage, and either finish with the
//! assistant's text or dispatch the requested tool calls and send again.
//!
//! Shared, read-only collaborators (catalog, providers, tools, credentials,
//! HTTP client) live in an [`EngineContext`] that outlives every engine.

pub mod events;
mod execute;
mod send;
pub mod state;
pub mod ticker;

pub use events::{EngineEvent, EngineEventSink};
pub use state::{Conversation, Session};
pub use ticker::ProgressTicker;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::auth::CredentialResolver;
use crate::catalog::ModelCatalog;
use crate::error::Result;
use crate::provider::http::build_client;
use crate::provider::ProviderRegistry;
use crate::script::{Script, Statement};
use crate::tools::ToolDispatch;
use crate::transcript::TranscriptWriter;
use crate::types::{Message, RunTotals};

use events::EventEmitter;

/// Run-wide engine settings.
#[derive(Clone)]
pub struct EngineOptions {
    /// Show progress ticks while waiting on the provider.
    pub progress: bool,
    pub tick_interval: Duration,
    /// Tool-call rounds allowed per send; `None` is unbounded.
    pub max_tool_rounds: Option<u32>,
    pub transcript: Option<TranscriptWriter>,
    pub event_sink: Option<EngineEventSink>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            progress: false,
            tick_interval: Duration::from_secs(1),
            max_tool_rounds: None,
            transcript: None,
            event_sink: None,
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("progress", &self.progress)
            .field("tick_interval", &self.tick_interval)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("transcript", &self.transcript)
            .field("event_sink", &self.event_sink.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Collaborators shared by every script of a run.
pub struct EngineContext {
    pub catalog: ModelCatalog,
    pub registry: ProviderRegistry,
    pub tools: Arc<dyn ToolDispatch>,
    pub credentials: CredentialResolver,
    pub client: reqwest::Client,
    pub options: EngineOptions,
}

impl EngineContext {
    pub fn new(
        catalog: ModelCatalog,
        registry: ProviderRegistry,
        tools: Arc<dyn ToolDispatch>,
        credentials: CredentialResolver,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            registry,
            tools,
            credentials,
            client: build_client()?,
            options: EngineOptions::default(),
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }
}

/// Final state of a script run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub totals: RunTotals,
}

/// Executes one script. Never shared across scripts.
pub struct Engine<'a> {
    ctx: &'a EngineContext,
    script: String,
    statements: Vec<Statement>,
    conversation: Conversation,
    session: Option<Session>,
    events: EventEmitter,
}

impl<'a> Engine<'a> {
    pub fn new(ctx: &'a EngineContext, script: impl Into<String>) -> Self {
        Self {
            ctx,
            script: script.into(),
            statements: Vec::new(),
            conversation: Conversation::default(),
            session: None,
            events: EventEmitter::new(ctx.options.event_sink.clone()),
        }
    }

    /// Run every statement of `script` on a fresh engine.
    pub async fn run(ctx: &'a EngineContext, script: &Script) -> Result<RunOutcome> {
        let mut engine = Self::new(ctx, script.name.clone());
        engine.run_statements(&script.statements).await?;
        Ok(engine.into_outcome())
    }

    /// Execute statements in order, stopping at the first error.
    pub async fn run_statements(&mut self, statements: &[Statement]) -> Result<()> {
        self.statements = statements.to_vec();
        self.events.emit(EngineEvent::ScriptStarted {
            script: self.script.clone(),
            statements: statements.len(),
        });
        info!(script = %self.script, statements = statements.len(), "running script");

        for statement in statements {
            self.execute(statement).await?;
        }

        self.events.emit(EngineEvent::Finished {
            script: self.script.clone(),
            totals: self.conversation.totals.clone(),
        });
        info!(script = %self.script, totals = %self.conversation.totals, "script finished");
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    pub fn totals(&self) -> &RunTotals {
        &self.conversation.totals
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn model(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.model.as_str())
    }

    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            model: self.session.map(|s| s.model),
            messages: self.conversation.messages,
            totals: self.conversation.totals,
        }
    }
}
