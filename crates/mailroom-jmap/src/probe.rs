//! One-shot external helpers: status probes (battery, VPN, ...) and speech.

use std::process::Stdio;
use std::time::Duration;

use mailroom_core::{MailError, MailResult};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusProbe {
    pub name: String,
    pub command: Vec<String>,
}

impl StatusProbe {
    pub async fn run(&self, timeout: Duration) -> MailResult<String> {
        let output = run_command(&self.command, None, timeout).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
            .to_string())
    }
}

/// Runs `argv` (plus an optional trailing argument), returning trimmed stdout.
/// A non-zero exit becomes `External` with the helper's stderr.
pub async fn run_command(
    argv: &[String],
    extra_arg: Option<&str>,
    timeout: Duration,
) -> MailResult<String> {
    let Some((program, args)) = argv.split_first() else {
        return Err(MailError::validation("command", "empty command"));
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(extra) = extra_arg {
        cmd.arg(extra);
    }
    debug!(program = %program, "running helper command");
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| MailError::timeout(timeout))?
        .map_err(|err| MailError::External(format!("{}: {}", program, err)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        return Err(MailError::External(if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            format!("{}: {}", program, stderr)
        }));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub async fn speak(command: &[String], text: &str, timeout: Duration) -> MailResult<()> {
    run_command(command, Some(text), timeout).await.map(|_| ())
}
