//! Parsed script statements.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Directive keyword, including the leading marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
pub enum StatementKind {
    #[strum(serialize = ".#")]
    Comment,
    #[strum(serialize = ".llm")]
    SetModel,
    #[strum(serialize = ".clear")]
    ClearFiles,
    #[strum(serialize = ".include")]
    IncludeFile,
    #[strum(serialize = ".image")]
    IncludeImage,
    #[strum(serialize = ".cmd")]
    RunTool,
    #[strum(serialize = ".debug")]
    Debug,
    #[strum(serialize = ".system")]
    SystemTurn,
    #[strum(serialize = ".user")]
    UserTurn,
    #[strum(serialize = ".assistant")]
    AssistantTurn,
    #[strum(serialize = ".exec")]
    Send,
}

impl StatementKind {
    /// Kinds whose body continues on the following lines.
    pub fn is_multiline(&self) -> bool {
        matches!(self, Self::SystemTurn | Self::UserTurn | Self::AssistantTurn)
    }

    /// Kinds that add content to the conversation.
    pub fn produces_content(&self) -> bool {
        matches!(
            self,
            Self::SystemTurn
                | Self::UserTurn
                | Self::AssistantTurn
                | Self::IncludeFile
                | Self::IncludeImage
                | Self::RunTool
        )
    }

    /// Every keyword, in declaration order.
    pub fn keywords() -> Vec<String> {
        Self::iter().map(|k| k.to_string()).collect()
    }
}

/// One parsed directive. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Zero-based position in the script.
    pub seq: usize,
    pub kind: StatementKind,
    pub value: String,
    /// One-based source line of the directive.
    pub line: usize,
}

impl Statement {
    pub fn new(seq: usize, kind: StatementKind, value: impl Into<String>, line: usize) -> Self {
        Self {
            seq,
            kind,
            value: value.into(),
            line,
        }
    }

    /// First line of the value, for one-line listings.
    pub fn summary(&self) -> &str {
        self.value.lines().next().unwrap_or("")
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02} {:<10} {}", self.seq, self.kind.to_string(), self.summary())
    }
}
