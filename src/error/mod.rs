//! Error types for stepwise.

pub mod category;

pub use category::ErrorCategory;

use thiserror::Error;

/// Primary error type for parsing and running step scripts.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Syntax error in {file}:{line}: {message}")]
    ScriptSyntax {
        file: String,
        line: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}) from {url}")]
    Api {
        status: u16,
        url: String,
        /// Request headers with the credential masked.
        headers: String,
        /// Request body with embedded image payloads redacted.
        request: String,
        response: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StepError {
    /// Create a syntax error pointing at a script location.
    pub fn syntax(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::ScriptSyntax {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ScriptSyntax { .. } | Self::InvalidState(_) => ErrorCategory::Syntax,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::UnknownTool(_) | Self::ToolExecution { .. } => ErrorCategory::Tool,
            Self::Network(_) => ErrorCategory::Transport,
            Self::Api { .. } | Self::Protocol(_) | Self::Serialization(_) => {
                ErrorCategory::Protocol
            }
            Self::Credential(_) => ErrorCategory::Credential,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Multi-line diagnostic for terminal output.
    ///
    /// API errors carry the full request context; everything else is the
    /// display string.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Api {
                status,
                url,
                headers,
                request,
                response,
            } => format!(
                "API error (status {status})\nurl: {url}\nheaders: {headers}\ndata: {request}\nresponse: {response}"
            ),
            other => other.to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, StepError>;
