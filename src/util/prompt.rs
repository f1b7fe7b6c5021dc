//! Interactive prompting capability.
//!
//! Anything that needs to ask the operator a question (missing API keys, the
//! `askuser` tool) goes through a [`Prompter`]. Batch runs install
//! [`NonInteractive`], which fails instead of waiting on a terminal.

use std::io::{BufRead, Write};

use crate::error::{Result, StepError};

/// Asks the operator a question and returns the answer.
pub trait Prompter: Send + Sync {
    /// Show `message` and read one line of input, without the line terminator.
    fn prompt(&self, message: &str) -> Result<String>;
}

/// Reads answers from stdin, writing prompts to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn prompt(&self, message: &str) -> Result<String> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{message}")?;
        stderr.flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(StepError::InvalidState(
                "stdin closed while waiting for input".into(),
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Prompter for unattended runs: every prompt is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn prompt(&self, message: &str) -> Result<String> {
        Err(StepError::InvalidState(format!(
            "input required in non-interactive mode: {}",
            message.trim()
        )))
    }
}
