//! Synchronous tool execution: spawn a child process, write the tool
//! invocation to its stdin as one JSON line, capture stdout/stderr, and
//! translate the exit into an MCP-shaped result. Shared by the synchronous
//! `tools/call` path and by the Task Queue's executor callback.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use ploinky_mcp_proto::CallToolResult;

/// Everything needed to spawn one tool invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout_ms: u64,
}

/// Raw outcome of running a command, independent of how the result gets
/// shaped into MCP content (the Task Queue needs the raw form; the
/// synchronous path shapes it immediately).
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub code: Option<i32>,
    pub signal_killed: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `spec.command` via `sh -c`, write `{tool, input, metadata}` as one
/// JSON line to stdin, and collect stdout/stderr until the process exits
/// or `spec.timeout_ms` elapses (in which case the child is killed).
pub async fn run(tool: &str, spec: &CommandSpec, input: &Value, metadata: &Value) -> RawOutcome {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&spec.command)
        .current_dir(&spec.cwd)
        .envs(&spec.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return RawOutcome { code: None, signal_killed: false, stdout: String::new(), stderr: e.to_string() };
        }
    };

    let payload = serde_json::json!({ "tool": tool, "input": input, "metadata": metadata });
    if let Some(mut stdin) = child.stdin.take() {
        let line = format!("{}\n", payload);
        let _ = stdin.write_all(line.as_bytes()).await;
        drop(stdin);
    }

    let timeout_dur = Duration::from_millis(spec.timeout_ms);
    match timeout(timeout_dur, child.wait_with_output()).await {
        Ok(Ok(output)) => RawOutcome {
            code: output.status.code(),
            signal_killed: false,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Ok(Err(e)) => RawOutcome { code: None, signal_killed: false, stdout: String::new(), stderr: e.to_string() },
        Err(_) => RawOutcome {
            code: None,
            signal_killed: true,
            stdout: String::new(),
            stderr: format!("timed out after {}ms", spec.timeout_ms),
        },
    }
}

/// Shape a [`RawOutcome`] into the MCP result the synchronous `tools/call`
/// path returns: exit 0 -> text content (plus stderr if non-empty);
/// otherwise an error with trimmed stderr or a synthesized message.
#[must_use]
pub fn shape_result(outcome: &RawOutcome) -> CallToolResult {
    if outcome.signal_killed {
        return CallToolResult::error_text(outcome.stderr.clone());
    }
    match outcome.code {
        Some(0) => {
            let mut content = vec![ploinky_mcp_proto::Content::text(if outcome.stdout.is_empty() {
                "(no output)".to_string()
            } else {
                outcome.stdout.clone()
            })];
            let stderr = outcome.stderr.trim();
            if !stderr.is_empty() {
                content.push(ploinky_mcp_proto::Content::text(stderr.to_string()));
            }
            CallToolResult { content, is_error: false, metadata: Default::default() }
        }
        Some(code) => {
            let stderr = outcome.stderr.trim();
            let message =
                if stderr.is_empty() { format!("command exited with code {code}") } else { stderr.to_string() };
            CallToolResult::error_text(message)
        }
        None => CallToolResult::error_text(if outcome.stderr.is_empty() {
            "command terminated abnormally".to_string()
        } else {
            outcome.stderr.clone()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec { command: command.to_string(), cwd: PathBuf::from("."), env: HashMap::new(), timeout_ms: 5000 }
    }

    #[tokio::test]
    async fn successful_command_yields_stdout_content() {
        let outcome = run("echo", &spec("echo hello"), &Value::Null, &Value::Null).await;
        assert_eq!(outcome.code, Some(0));
        let result = shape_result(&outcome);
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn failing_command_yields_error_result() {
        let outcome = run("fail", &spec("exit 3"), &Value::Null, &Value::Null).await;
        assert_eq!(outcome.code, Some(3));
        let result = shape_result(&outcome);
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn timeout_kills_child_and_reports_timeout() {
        let mut s = spec("sleep 5");
        s.timeout_ms = 50;
        let outcome = run("slow", &s, &Value::Null, &Value::Null).await;
        assert!(outcome.signal_killed);
    }
}
