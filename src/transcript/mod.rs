//! Conversation transcripts written after each completed send.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::{Message, RunTotals};
use crate::util::versioned_path;

/// On-disk transcript document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub totals: RunTotals,
    pub messages: Vec<Message>,
}

/// Writes transcripts as `<dir>/<script>_messages.json`, keeping numbered
/// copies of earlier ones.
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the transcript for `script` is written to.
    pub fn path_for(&self, script: &str) -> PathBuf {
        let stem = Path::new(script)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string());
        self.dir.join(format!("{stem}_messages.json"))
    }

    /// Write `transcript`, rotating any previous copy. Returns the path.
    pub fn write(&self, transcript: &Transcript) -> Result<PathBuf> {
        let target = versioned_path(&self.path_for(&transcript.script))?;
        let json = serde_json::to_string_pretty(transcript)?;
        std::fs::write(&target, json)?;
        debug!(path = %target.display(), messages = transcript.messages.len(), "wrote transcript");
        Ok(target)
    }

    pub fn read(path: &Path) -> Result<Transcript> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
