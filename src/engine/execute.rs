//! Execution of individual statements.

use std::path::Path;

use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::events::EngineEvent;
use super::state::Session;
use super::Engine;
use crate::auth::mask_secret;
use crate::error::{Result, StepError};
use crate::provider::http::redact_images;
use crate::script::{Statement, StatementKind};
use crate::tools::builtin::read_file_text;
use crate::tools::ToolArguments;
use crate::types::{ContentPart, ImageContent, Message, Role};

const DEBUG_SECTIONS: [&str; 5] = ["llm", "statements", "messages", "usage", "all"];

impl Engine<'_> {
    /// Execute one statement against this engine's conversation.
    pub async fn execute(&mut self, statement: &Statement) -> Result<()> {
        self.events.emit(EngineEvent::StatementStarted {
            statement: statement.clone(),
        });
        debug!(seq = statement.seq, kind = %statement.kind, line = statement.line, "executing");

        match statement.kind {
            StatementKind::Comment => Ok(()),
            StatementKind::SetModel => self.set_model(statement).await,
            StatementKind::ClearFiles => self.clear_files(statement),
            StatementKind::IncludeFile => self.include_file(statement).await,
            StatementKind::IncludeImage => self.include_image(statement).await,
            StatementKind::RunTool => self.run_tool(statement).await,
            StatementKind::Debug => self.debug_snapshot(statement),
            StatementKind::SystemTurn => self.system_turn(statement),
            StatementKind::UserTurn => {
                self.require_session(statement)?;
                self.conversation.push(Message::user(statement.value.as_str()));
                Ok(())
            }
            StatementKind::AssistantTurn => {
                self.require_session(statement)?;
                self.conversation
                    .push(Message::assistant(statement.value.as_str()));
                Ok(())
            }
            StatementKind::Send => self.send(statement).await,
        }
    }

    fn syntax(&self, statement: &Statement, message: impl Into<String>) -> StepError {
        StepError::syntax(self.script.as_str(), statement.line, message)
    }

    pub(super) fn require_session(&self, statement: &Statement) -> Result<&Session> {
        self.session.as_ref().ok_or_else(|| {
            self.syntax(
                statement,
                format!("{} before .llm: select a model first", statement.kind),
            )
        })
    }

    async fn set_model(&mut self, statement: &Statement) -> Result<()> {
        if self.session.is_some() {
            return Err(self.syntax(statement, "only one .llm statement is allowed per script"));
        }

        let raw = statement.value.trim();
        let raw = if raw.starts_with('{') {
            raw.to_string()
        } else {
            format!("{{{raw}}}")
        };
        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| self.syntax(statement, format!("invalid .llm parameters: {e}")))?;
        let Value::Object(mut options) = parsed else {
            return Err(self.syntax(statement, ".llm parameters must be a JSON object"));
        };

        let model = match options.remove("model") {
            Some(Value::String(model)) => model,
            _ => return Err(self.syntax(statement, "'model' parameter is required")),
        };
        let url = match options.remove("url") {
            None => None,
            Some(Value::String(url)) => Some(url),
            Some(_) => return Err(self.syntax(statement, "'url' must be a string")),
        };

        let info = self.ctx.catalog.lookup(&model)?.clone();
        let profile = self.ctx.registry.lookup(&info.provider)?.clone();
        let resolver = self.ctx.credentials.clone();
        let lookup = profile.clone();
        let credential = tokio::task::spawn_blocking(move || resolver.resolve(&lookup))
            .await
            .map_err(|e| StepError::Credential(format!("{}: {e}", profile.name)))??;
        let url = url.unwrap_or_else(|| profile.url.clone());

        info!(model = %model, provider = %profile.name, url = %url, "model selected");
        self.events.emit(EngineEvent::ModelSelected {
            model: model.clone(),
            provider: profile.name.clone(),
            url: url.clone(),
        });

        self.session = Some(Session {
            protocol: profile.wire.protocol(),
            profile,
            model,
            info,
            credential,
            url,
            options,
        });
        Ok(())
    }

    fn clear_files(&mut self, statement: &Statement) -> Result<()> {
        let patterns: Value = serde_json::from_str(statement.value.trim())
            .map_err(|e| self.syntax(statement, format!("invalid .clear parameters: {e}")))?;
        let Value::Array(patterns) = patterns else {
            return Err(self.syntax(statement, ".clear expects a JSON list of file patterns"));
        };

        for pattern in &patterns {
            let Some(pattern) = pattern.as_str() else {
                return Err(self.syntax(statement, format!(".clear pattern {pattern} is not a string")));
            };
            let paths = match glob::glob(pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(pattern, error = %e, "invalid .clear pattern");
                    continue;
                }
            };
            for path in paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()) {
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "deleted");
                        self.events.emit(EngineEvent::FileDeleted { path });
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "cannot delete file"),
                }
            }
        }
        Ok(())
    }

    async fn include_file(&mut self, statement: &Statement) -> Result<()> {
        self.require_session(statement)?;
        let text = read_file_text(statement.value.trim()).await;
        self.conversation.push(Message::user(text));
        Ok(())
    }

    async fn include_image(&mut self, statement: &Statement) -> Result<()> {
        self.require_session(statement)?;
        let path = Path::new(statement.value.trim());
        let bytes = tokio::fs::read(path).await?;
        let image = ImageContent {
            media_type: image_media_type(path).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        };
        self.conversation.push(Message {
            role: Role::User,
            content: vec![ContentPart::Image(image)],
        });
        Ok(())
    }

    async fn run_tool(&mut self, statement: &Statement) -> Result<()> {
        self.require_session(statement)?;
        let (name, args) = ToolArguments::parse_call_literal(&statement.value)
            .map_err(|message| self.syntax(statement, message))?;

        let content = self.ctx.tools.invoke(&name, &args).await?;
        self.events.emit(EngineEvent::ToolResult {
            tool_call_id: None,
            name,
            content: content.clone(),
        });
        self.conversation.append_to_last(ContentPart::text(content));
        Ok(())
    }

    fn system_turn(&mut self, statement: &Statement) -> Result<()> {
        let profile = &self.require_session(statement)?.profile;
        let (out_of_band, role) = (profile.system_out_of_band, profile.system_role);
        if out_of_band {
            self.conversation.pending_system.push(statement.value.clone());
        } else {
            self.conversation
                .push(Message::text(role, statement.value.as_str()));
        }
        Ok(())
    }

    fn debug_snapshot(&mut self, statement: &Statement) -> Result<()> {
        let raw = statement.value.trim();
        let raw = match raw {
            "" => "[\"all\"]".to_string(),
            r if r.starts_with('[') => r.to_string(),
            r => format!("[{r}]"),
        };
        let sections: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| self.syntax(statement, format!("invalid .debug parameters: {e}")))?;
        if let Some(unknown) = sections.iter().find(|s| !DEBUG_SECTIONS.contains(&s.as_str())) {
            return Err(self.syntax(
                statement,
                format!("unknown .debug section {unknown:?}; expected one of {DEBUG_SECTIONS:?}"),
            ));
        }
        let wants = |name: &str| sections.iter().any(|s| s == name || s == "all");

        let mut snapshot = Map::new();
        snapshot.insert("script".into(), json!(self.script));
        if wants("llm") {
            snapshot.insert(
                "llm".into(),
                match &self.session {
                    Some(session) => json!({
                        "provider": session.profile.name,
                        "model": session.model,
                        "url": session.url,
                        "protocol": session.protocol.name(),
                        "credential": mask_secret(&session.credential),
                        "options": session.options,
                        "model_info": session.info,
                        "pending_system": self.conversation.system_text(),
                    }),
                    None => Value::Null,
                },
            );
        }
        if wants("statements") {
            snapshot.insert("statements".into(), serde_json::to_value(&self.statements)?);
        }
        if wants("messages") {
            let mut messages = serde_json::to_value(&self.conversation.messages)?;
            redact_images(&mut messages);
            snapshot.insert("messages".into(), messages);
        }
        if wants("usage") {
            snapshot.insert("usage".into(), serde_json::to_value(&self.conversation.totals)?);
        }

        let snapshot = Value::Object(snapshot);
        debug!(snapshot = %snapshot, "debug snapshot");
        self.events.emit(EngineEvent::Debug { snapshot });
        Ok(())
    }
}

/// Media type from a file extension.
fn image_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
