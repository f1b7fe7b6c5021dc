//! Built-in tools available to every script.
//!
//! `readfile`, `writefile`, `wwwget`, `execcmd` and `askuser`. Each is built
//! with [`FnTool::new`] and returned as `Arc<dyn Tool>`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use super::arguments::ToolArguments;
use super::tool::{FnTool, Tool};
use super::types::ToolParameters;
use crate::error::{Result, StepError};
use crate::util::{versioned_path, Prompter};

/// Read a text file, returning an error sentinel instead of failing.
///
/// Used by `.include` and the `readfile` tool so that a missing file shows up
/// in the conversation rather than aborting the run.
pub async fn read_file_text(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read file");
            format!("ERROR file not found: {}", path.display())
        }
    }
}

/// `readfile(filename)`: contents of a local file.
pub fn readfile_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "readfile",
        "Read the contents of a named file",
        ToolParameters::object()
            .string("filename", "The name of the file to read", true)
            .build(),
        |args: ToolArguments| async move {
            let filename = args.require("readfile", "filename")?;
            Ok(read_file_text(filename).await)
        },
    ))
}

/// `writefile(filename, content)`: write a file, keeping numbered backups of
/// what was there before.
pub fn writefile_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "writefile",
        "Write the contents to a named file on the local file system",
        ToolParameters::object()
            .string("filename", "The name of the file to write", true)
            .string("content", "The contents of the file", true)
            .build(),
        |args: ToolArguments| async move {
            let filename = PathBuf::from(args.require("writefile", "filename")?);
            let content = args.require("writefile", "content")?.to_string();

            let target = tokio::task::spawn_blocking(move || versioned_path(&filename))
                .await
                .map_err(|e| StepError::tool("writefile", e.to_string()))??;
            tokio::fs::write(&target, content)
                .await
                .map_err(|e| StepError::tool("writefile", format!("{}: {e}", target.display())))?;

            Ok(format!("Content written to file '{}'", target.display()))
        },
    ))
}

/// `wwwget(url)`: body of a web page.
///
/// Fetch failures are reported to the model as text.
pub fn wwwget_tool(client: reqwest::Client) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "wwwget",
        "Read a webpage url and return the contents",
        ToolParameters::object()
            .string("url", "The url of the web page to read", true)
            .build(),
        move |args: ToolArguments| {
            let client = client.clone();
            async move {
                let url = args.require("wwwget", "url")?.to_string();
                let fetched = async {
                    client
                        .get(&url)
                        .send()
                        .await?
                        .error_for_status()?
                        .text()
                        .await
                };
                match fetched.await {
                    Ok(body) => Ok(body),
                    Err(e) => {
                        warn!(url = %url, error = %e, "wwwget failed");
                        Ok(format!("ERROR url not returned: {url}"))
                    }
                }
            }
        },
    ))
}

/// `execcmd(cmd)`: run a shell command.
///
/// Returns stdout on success and `stderr: ...` when the command exits
/// non-zero.
pub fn execcmd_tool() -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "execcmd",
        format!(
            "Execute a command on the local {} system",
            std::env::consts::OS
        ),
        ToolParameters::object()
            .string("cmd", "command to be executed", true)
            .build(),
        |args: ToolArguments| async move {
            let cmd = strip_quotes(args.require("execcmd", "cmd")?);

            let output = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .output()
                .await
                .map_err(|e| StepError::tool("execcmd", e.to_string()))?;

            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            } else {
                Ok(format!(
                    "stderr: {}",
                    String::from_utf8_lossy(&output.stderr)
                ))
            }
        },
    ))
}

/// `askuser(question)`: ask the operator for clarification.
pub fn askuser_tool(prompter: Arc<dyn Prompter>) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "askuser",
        "Get Clarification by Asking the user a question",
        ToolParameters::object()
            .string("question", "Question to ask the user", true)
            .build(),
        move |args: ToolArguments| {
            let prompter = Arc::clone(&prompter);
            async move {
                let question = format!("{} ", args.require("askuser", "question")?.trim_end());
                tokio::task::spawn_blocking(move || prompter.prompt(&question))
                    .await
                    .map_err(|e| StepError::tool("askuser", e.to_string()))?
                    .map_err(|e| StepError::tool("askuser", e.to_string()))
            }
        },
    ))
}

/// Every built-in tool.
pub fn all_tools(client: reqwest::Client, prompter: Arc<dyn Prompter>) -> Vec<Arc<dyn Tool>> {
    vec![
        readfile_tool(),
        writefile_tool(),
        wwwget_tool(client),
        execcmd_tool(),
        askuser_tool(prompter),
    ]
}

fn strip_quotes(cmd: &str) -> &str {
    let trimmed = cmd.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}
