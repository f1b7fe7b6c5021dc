//! Line-oriented step script parser.
//!
//! Directives start with `.` and a keyword, after optional leading
//! whitespace. `.system`, `.user`
//! and `.assistant` open a block that collects every following line up to the
//! next recognized directive; all other directives take the rest of their own
//! line. A line starting with `.` whose keyword is not recognized is ordinary
//! text.

use std::str::FromStr;

use tracing::debug;

use super::statement::{Statement, StatementKind};
use crate::error::{Result, StepError};

const MARKER: char = '.';

/// Parse `text` into statements. `file` names the script in errors.
pub fn parse(file: &str, text: &str) -> Result<Vec<Statement>> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let Some(last) = lines.last() else {
        return Err(StepError::syntax(file, 1, "script is empty"));
    };

    let needs_send = !matches!(directive(last), Some((StatementKind::Send, _)));
    let mut parser = Parser::new(file);
    for (idx, line) in lines.iter().enumerate() {
        parser.line(idx + 1, line)?;
    }
    if needs_send {
        parser.line(lines.len() + 1, &StatementKind::Send.to_string())?;
    }
    let statements = parser.finish()?;

    debug!(file, statements = statements.len(), "parsed script");
    Ok(statements)
}

/// Split a directive line into its kind and the text after the keyword.
fn directive(line: &str) -> Option<(StatementKind, &str)> {
    let line = line.trim_start();
    if !line.starts_with(MARKER) {
        return None;
    }
    let (keyword, rest) = match line.split_once(' ') {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line.trim_end(), ""),
    };
    StatementKind::from_str(keyword).ok().map(|kind| (kind, rest))
}

struct OpenBlock {
    kind: StatementKind,
    text: String,
    line: usize,
}

struct Parser<'a> {
    file: &'a str,
    statements: Vec<Statement>,
    open: Option<OpenBlock>,
    seen_model: bool,
    seen_content: bool,
}

impl<'a> Parser<'a> {
    fn new(file: &'a str) -> Self {
        Self {
            file,
            statements: Vec::new(),
            open: None,
            seen_model: false,
            seen_content: false,
        }
    }

    fn line(&mut self, number: usize, line: &str) -> Result<()> {
        let Some((kind, rest)) = directive(line) else {
            return self.text(number, line);
        };

        self.close()?;
        if kind.is_multiline() {
            let text = if rest.is_empty() {
                String::new()
            } else {
                format!("{rest}\n")
            };
            self.open = Some(OpenBlock {
                kind,
                text,
                line: number,
            });
            Ok(())
        } else {
            self.emit(kind, rest.to_string(), number)
        }
    }

    fn text(&mut self, number: usize, line: &str) -> Result<()> {
        match &mut self.open {
            Some(block) => {
                block.text.push_str(line);
                block.text.push('\n');
                Ok(())
            }
            None if line.trim().is_empty() => Ok(()),
            None => Err(StepError::syntax(
                self.file,
                number,
                format!("text outside of a .system, .user or .assistant block: {line:?}"),
            )),
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut block) = self.open.take() {
            if block.text.ends_with('\n') {
                block.text.pop();
            }
            self.emit(block.kind, block.text, block.line)?;
        }
        Ok(())
    }

    fn emit(&mut self, kind: StatementKind, value: String, line: usize) -> Result<()> {
        match kind {
            StatementKind::SetModel if self.seen_model => {
                return Err(StepError::syntax(
                    self.file,
                    line,
                    "only one .llm statement is allowed per script",
                ));
            }
            StatementKind::SetModel => self.seen_model = true,
            StatementKind::Send if !self.seen_content => {
                return Err(StepError::syntax(
                    self.file,
                    line,
                    "nothing to send: no content before .exec",
                ));
            }
            k if k.produces_content() => self.seen_content = true,
            _ => {}
        }
        let seq = self.statements.len();
        self.statements.push(Statement::new(seq, kind, value, line));
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Statement>> {
        self.close()?;
        Ok(self.statements)
    }
}
