//! Read-only shell tool
//!
//! Runs a single allowlisted command (`ls`, `tree`, `rg`, `grep`, `cat`,
//! `head`, `tail`, `sed`, `awk`) in the thread's working directory. Shell
//! operators are rejected so the model cannot chain, pipe or redirect.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{LoomError, Result};

use super::{Tool, ToolContext};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ALLOWED_COMMANDS: &[&str] = &[
    "ls", "tree", "rg", "grep", "cat", "head", "tail", "sed", "awk",
];

/// Tool for running read-only inspection commands.
///
/// # Parameters
/// - `command`: the single-line command to run (required)
/// - `work_dir`: absolute directory to run in; defaults to the thread's
///   working directory
/// - `timeout_seconds`: defaults to 10 when absent or not positive
///
/// A non-zero exit status is not an error: the exit code is part of the
/// formatted output. Timeouts, cancellation and rejected commands are.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellTool;

impl ShellTool {
    pub fn new() -> Self {
        Self
    }
}

fn contains_shell_operator(command: &str) -> bool {
    command.contains(['|', ';', '&', '>', '<', '`', '\n']) || command.contains("$(")
}

fn validate_command(command: &str) -> Result<()> {
    if contains_shell_operator(command) {
        return Err(LoomError::Tool(
            "command contains unsupported shell operators".into(),
        ));
    }
    let program = command
        .split_whitespace()
        .next()
        .ok_or_else(|| LoomError::Tool("command must be provided".into()))?;
    let base = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    if !ALLOWED_COMMANDS.contains(&base) {
        return Err(LoomError::Tool(format!("command is not allowed: {}", base)));
    }
    Ok(())
}

fn resolve_work_dir(args: &Value, ctx: &ToolContext) -> Result<PathBuf> {
    let requested = args
        .get("work_dir")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    let dir = requested
        .or_else(|| ctx.work_dir.clone())
        .ok_or_else(|| LoomError::Tool("work_dir must be provided".into()))?;

    if !dir.is_absolute() {
        return Err(LoomError::Tool(format!(
            "path must be absolute: {}",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(LoomError::Tool(format!(
            "path is not a directory: {}",
            dir.display()
        )));
    }
    Ok(dir)
}

fn format_output(command: &str, work_dir: &Path, exit_code: i32, output: &str) -> String {
    let mut result = format!(
        "Command: {}\nWork directory: {}\nExit code: {}\n",
        command,
        work_dir.display(),
        exit_code
    );
    if output.is_empty() {
        result.push_str("Output: (empty)");
    } else {
        result.push_str("Output:\n```text\n");
        result.push_str(output.trim_end_matches('\n'));
        result.push_str("\n```");
    }
    result
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Executes a single-line bash command and returns the combined output with the exit code. \
         Supported commands: ls, tree, rg, grep, cat, head, tail, sed, awk. \
         Shell operators (|, &, ;, >, <, `, $()) are not supported."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute."
                },
                "work_dir": {
                    "type": "string",
                    "description": "The absolute path of the directory to run the command in."
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds. Defaults to 10 when not positive."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LoomError::Tool("command must be provided".into()))?;
        validate_command(command)?;

        let work_dir = resolve_work_dir(&args, ctx)?;

        let timeout_secs = args
            .get("timeout_seconds")
            .and_then(Value::as_i64)
            .filter(|t| *t > 0)
            .map(|t| t as u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        debug!(command = %command, work_dir = %work_dir.display(), "Running shell command");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(LoomError::Cancelled),
            res = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()) => res
                .map_err(|_| LoomError::Tool(format!("command timed out after {}s", timeout_secs)))?
                .map_err(|e| LoomError::Tool(format!("command failed to run: {}", e)))?,
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(format_output(command, &work_dir, exit_code, &combined))
    }
}
