//! Per-script conversation state.

use serde_json::{Map, Value};

use crate::catalog::ModelInfo;
use crate::provider::{ProviderProfile, WireProtocol};
use crate::types::{coalesce, push_coalesced, ContentPart, Message, Role, RunTotals};

/// The model selected by `.llm`, with everything needed to talk to it.
pub struct Session {
    pub profile: ProviderProfile,
    pub model: String,
    pub info: ModelInfo,
    pub credential: String,
    pub protocol: &'static dyn WireProtocol,
    /// Endpoint requests go to; the profile URL unless `.llm` overrides it.
    pub url: String,
    /// Extra request body fields from `.llm`.
    pub options: Map<String, Value>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.profile.name)
            .field("model", &self.model)
            .field("protocol", &self.protocol.name())
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Canonical conversation for one script run.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub messages: Vec<Message>,
    /// System text held back for providers that take it as a request field.
    pub pending_system: Vec<String>,
    pub totals: RunTotals,
}

impl Conversation {
    /// Append, merging into the last message when the role matches.
    pub fn push(&mut self, message: Message) {
        push_coalesced(&mut self.messages, message);
    }

    /// Append a part to the last message, or start a user message.
    pub fn append_to_last(&mut self, part: ContentPart) {
        match self.messages.last_mut() {
            Some(last) => last.content.push(part),
            None => self.messages.push(Message {
                role: Role::User,
                content: vec![part],
            }),
        }
    }

    pub fn coalesce(&mut self) {
        self.messages = coalesce(std::mem::take(&mut self.messages));
    }

    /// Buffered system text, joined with newlines.
    pub fn system_text(&self) -> Option<String> {
        if self.pending_system.is_empty() {
            None
        } else {
            Some(self.pending_system.join("\n"))
        }
    }
}
