//! Error classification.

use serde::{Deserialize, Serialize};

/// Broad error category, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Syntax,
    Configuration,
    Tool,
    Transport,
    Protocol,
    Credential,
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Configuration => "configuration",
            Self::Tool => "tool",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Credential => "credential",
            Self::Io => "io",
        }
    }
}
