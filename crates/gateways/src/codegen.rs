// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Code-generation gateway: a long-running opaque job that streams typed
//! build events and terminates with a final status.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ralph_core::{BuildOutcome, BuildPayload};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;

/// Buffer between the subprocess reader and the pool's consumer.
const EVENT_BUFFER: usize = 64;

/// How long a terminated subprocess gets to exit before SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(10);

/// A running build: live events, the final outcome, and a cancel handle.
///
/// The stream is successful iff `outcome` resolves to
/// [`BuildOutcome::Success`]; a dropped sender reads as failure.
pub struct BuildStream {
    /// Subprocess pid when the gateway runs one (persisted for the
    /// recovery sweep).
    pub pid: Option<u32>,
    pub events: mpsc::Receiver<BuildPayload>,
    pub outcome: oneshot::Receiver<BuildOutcome>,
    cancel: CancellationToken,
}

impl BuildStream {
    pub fn new(
        pid: Option<u32>,
        events: mpsc::Receiver<BuildPayload>,
        outcome: oneshot::Receiver<BuildOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        Self { pid, events, outcome, cancel }
    }

    /// Signal cancellation; the producer terminates its subprocess and
    /// leaves partial work on disk.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Verbs the core needs from the code-generation worker.
#[async_trait]
pub trait CodegenGateway: Send + Sync + 'static {
    /// One-shot clarification: produce a markdown plan for a prompt.
    async fn plan(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Start a build in the given workspace. Events must be delivered live.
    async fn start(
        &self,
        workspace: &Path,
        prompt: &str,
        max_iterations: u32,
    ) -> Result<BuildStream, GatewayError>;
}

/// Subprocess-backed gateway.
///
/// Spawns the configured command with the workspace as CWD, writes the
/// prompt to stdin, and reads line-delimited JSON build events from stdout.
/// The final status is the last parsed `{"status": ...}` line, falling back
/// to the exit code.
pub struct ProcessCodegen {
    command: String,
}

impl ProcessCodegen {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl CodegenGateway for ProcessCodegen {
    async fn plan(&self, prompt: &str) -> Result<String, GatewayError> {
        let mut child = tokio::process::Command::new(&self.command)
            .arg("--plan")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GatewayError::Subprocess(format!("spawn failed: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| GatewayError::Subprocess(format!("stdin write failed: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| GatewayError::Subprocess(format!("wait failed: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::Subprocess(format!(
                "plan generation failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn start(
        &self,
        workspace: &Path,
        prompt: &str,
        max_iterations: u32,
    ) -> Result<BuildStream, GatewayError> {
        let mut child = tokio::process::Command::new(&self.command)
            .args(["--max-iterations", &max_iterations.to_string()])
            .current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GatewayError::Subprocess(format!("spawn failed: {}", e)))?;

        let pid = child.id();

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = prompt.to_string();
            // Write the prompt from a task so a large plan can't deadlock
            // against an already-chatty subprocess.
            tokio::spawn(async move {
                let _ = stdin.write_all(prompt.as_bytes()).await;
                let _ = stdin.shutdown().await;
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Subprocess("no stdout handle".to_string()))?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = consume_stream(child, stdout, event_tx, reader_cancel).await;
            let _ = outcome_tx.send(outcome);
        });

        Ok(BuildStream::new(pid, event_rx, outcome_rx, cancel))
    }
}

/// Read events until the subprocess exits or cancellation fires.
async fn consume_stream(
    mut child: tokio::process::Child,
    stdout: tokio::process::ChildStdout,
    event_tx: mpsc::Sender<BuildPayload>,
    cancel: CancellationToken,
) -> BuildOutcome {
    let mut lines = BufReader::new(stdout).lines();
    let mut declared: Option<BuildOutcome> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                return BuildOutcome::Failure { error: "cancelled".to_string() };
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Ok(outcome) = serde_json::from_str::<BuildOutcome>(line) {
                        declared = Some(outcome);
                        continue;
                    }
                    match serde_json::from_str::<BuildPayload>(line) {
                        Ok(payload) => {
                            if event_tx.send(payload).await.is_err() {
                                // Consumer went away; stop the subprocess.
                                terminate(&mut child).await;
                                return BuildOutcome::Failure {
                                    error: "event consumer dropped".to_string(),
                                };
                            }
                        }
                        Err(_) => {
                            // Non-JSON output is forwarded as a log line.
                            let _ = event_tx
                                .send(BuildPayload::LogMessage { message: line.to_string() })
                                .await;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    terminate(&mut child).await;
                    return BuildOutcome::Failure {
                        error: format!("stdout read failed: {}", e),
                    };
                }
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => {
            declared.unwrap_or(BuildOutcome::Success)
        }
        Ok(status) => BuildOutcome::Failure {
            error: match declared {
                Some(BuildOutcome::Failure { error }) => error,
                _ => format!("subprocess exited with {}", status),
            },
        },
        Err(e) => BuildOutcome::Failure { error: format!("wait failed: {}", e) },
    }
}

/// SIGTERM the subprocess and escalate to SIGKILL after a grace period.
async fn terminate(child: &mut tokio::process::Child) {
    if let Some(pid) = child.id() {
        send_sigterm(pid);
        if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
}

/// Best-effort SIGTERM to a pid.
pub fn send_sigterm(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

/// Check whether a pid is alive (signal 0).
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
