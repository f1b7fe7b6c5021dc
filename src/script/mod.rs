//! Step scripts: loading, parsing and listing.

pub mod parser;
pub mod statement;

pub use parser::parse;
pub use statement::{Statement, StatementKind};

use std::path::{Path, PathBuf};

use crate::error::{Result, StepError};

/// A parsed step script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Name used in diagnostics and transcript file names.
    pub name: String,
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let statements = parse(&name, text)?;
        Ok(Self { name, statements })
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(path.display().to_string(), &text)
    }

    /// The leading comment, used as the script's description.
    pub fn description(&self) -> Option<&str> {
        self.statements
            .first()
            .filter(|s| s.kind == StatementKind::Comment)
            .map(|s| s.value.as_str())
    }
}

/// Step files matching `pattern`, sorted by path.
pub fn find_scripts(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| StepError::Configuration(format!("bad pattern {pattern}: {e}")))?;
    let mut files: Vec<PathBuf> = paths
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}
