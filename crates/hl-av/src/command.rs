//! Process runner for external tools, bounded by a timeout.
//!
//! Two execution modes are offered: [`ToolCommand::execute`] captures both
//! output streams in full, while [`ToolCommand::execute_with_stderr_callback`]
//! hands each stderr line to a callback as it arrives and can be cancelled.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use hl_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Used for version checks; encodes set their own from config.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Number of trailing stderr lines kept for error messages when streaming.
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use hl_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> hl_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

/// Why a streaming execution stopped before the child exited on its own.
enum Interrupt {
    TimedOut,
    Cancelled,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments appended so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Render the invocation as a single display string.
    ///
    /// Arguments containing whitespace are single-quoted. The result is meant
    /// for logs and progress events, not for re-parsing by a shell.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Tool`] if the process times out (message includes
    ///   the timeout duration).
    /// - Returns [`Error::Tool`] if the process exits with a non-zero status
    ///   (message includes stderr).
    /// - Returns [`Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        // Dropping the output future on timeout drops the child, and
        // `kill_on_drop` reaps it.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Execute the command, invoking `on_line` for every stderr line as it
    /// is produced.
    ///
    /// Stdout is discarded. The last few stderr lines are kept and included
    /// in the error message if the process exits non-zero.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Cancelled`] if `cancel` fires before the process
    ///   exits. The child is killed first.
    /// - Returns [`Error::Tool`] on spawn failure, timeout, or non-zero exit.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
        cancel: Option<CancellationToken>,
    ) -> Result<ExitStatus> {
        let program_name = self.program_name();
        let cancel = cancel.unwrap_or_default();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool(&program_name, "stderr was not captured"))?;
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        // Drain stderr until EOF, which normally means the process is exiting.
        // ffmpeg echoes container metadata verbatim, so lines are decoded
        // lossily; the pipe must keep draining whatever the encoding.
        let interrupted = loop {
            buf.clear();
            let read = tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => read,
                () = &mut deadline => break Some(Interrupt::TimedOut),
                () = cancel.cancelled() => break Some(Interrupt::Cancelled),
            };
            match read {
                Ok(0) => break None,
                Ok(_) => {
                    let decoded = String::from_utf8_lossy(&buf);
                    let line = decoded.trim_end_matches(['\n', '\r']);
                    on_line(line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
                Err(e) => {
                    tracing::debug!("{program_name}: stderr read failed: {e}");
                    break None;
                }
            }
        };
        // Nothing reads stderr past this point. A child still writing gets
        // EPIPE rather than blocking on a full pipe.
        drop(reader);

        let waited = match interrupted {
            Some(interrupt) => Err(interrupt),
            None => tokio::select! {
                status = child.wait() => Ok(status),
                () = &mut deadline => Err(Interrupt::TimedOut),
                () = cancel.cancelled() => Err(Interrupt::Cancelled),
            },
        };

        match waited {
            Ok(Ok(status)) if status.success() => Ok(status),
            Ok(Ok(status)) => {
                let tail: Vec<String> = tail.into_iter().collect();
                Err(Error::tool(
                    program_name,
                    format!("exited with status {status}: {}", tail.join("\n").trim()),
                ))
            }
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(interrupt) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill {program_name}: {e}");
                }
                match interrupt {
                    Interrupt::Cancelled => {
                        tracing::info!("{program_name} cancelled");
                        Err(Error::Cancelled)
                    }
                    Interrupt::TimedOut => Err(Error::tool(
                        program_name,
                        format!("timed out after {:?}", self.timeout),
                    )),
                }
            }
        }
    }
}
