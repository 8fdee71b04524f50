//! Shell subprocess runner - runs step commands through the configured shell

use crate::core::config::RunnerConfig;
use crate::core::{Command, CommandResult, OutputLine};
use crate::runner::output::{OutputSink, OutputTail, TerminalSink};
use crate::runner::{preflight, CancelSignal, CommandRunner, ExecutionError};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, warn};

/// Runs each command as `<shell> -c <invocation>`
#[derive(Clone)]
pub struct ShellCommandRunner {
    config: RunnerConfig,
    sink: Arc<dyn OutputSink>,
}

impl std::fmt::Debug for ShellCommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellCommandRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ShellCommandRunner {
    /// Create a runner that forwards output to the terminal
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TerminalSink),
        }
    }

    /// Send output lines somewhere other than the terminal
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    fn build_process(&self, command: &Command) -> tokio::process::Command {
        let mut process = tokio::process::Command::new(&self.config.shell);
        process.arg("-c").arg(command.invocation());

        if !self.config.inherit_env {
            process.env_clear();
        }
        process.envs(&self.config.environment);

        if let Some(dir) = command.working_dir() {
            process.current_dir(dir);
        }

        process
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process
    }

    fn forward(&self, tail: &mut OutputTail, line: OutputLine) {
        self.sink.on_line(&line);
        tail.push(line);
    }
}

/// Drain one buffered line, dropping its terminator.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so
/// mangled scraper output never stops the stream.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    if buf.is_empty() {
        return None;
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    let text = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    Some(text)
}

async fn abort_on_read_error(
    child: &mut tokio::process::Child,
    command: String,
    stream: &str,
    source: std::io::Error,
) -> ExecutionError {
    error!(command = %command, error = %source, "failed reading step {}, killing step process", stream);
    if let Err(e) = child.kill().await {
        warn!(command = %command, error = %e, "failed to kill step process");
    }
    ExecutionError::Io { command, source }
}

fn missing_pipe(command: &str, stream: &str) -> ExecutionError {
    ExecutionError::Io {
        command: command.to_string(),
        source: std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("{} was not captured", stream),
        ),
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    /// Spawn the command and stream its output until it exits.
    ///
    /// There is no deadline: this returns only when the process exits or
    /// `cancel` flips to `true`, in which case the child is killed.
    async fn run(
        &self,
        command: &Command,
        mut cancel: CancelSignal,
    ) -> Result<CommandResult, ExecutionError> {
        preflight(command)?;
        let shown = command.to_string();

        let already_cancelled = *cancel.borrow();
        if already_cancelled {
            return Err(ExecutionError::Cancelled { command: shown });
        }

        debug!(command = %shown, shell = %self.config.shell, "spawning step process");

        let mut child = self
            .build_process(command)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                command: shown.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| missing_pipe(&shown, "stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| missing_pipe(&shown, "stderr"))?;

        let mut stdout_reader = BufReader::new(stdout);
        let mut stderr_reader = BufReader::new(stderr);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut tail = OutputTail::new(self.config.capture_lines);

        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut cancel_open = true;

        // Both pipes are drained until EOF, otherwise a chatty child blocks
        // on a full pipe and never exits.
        let status = loop {
            tokio::select! {
                read = stdout_reader.read_until(b'\n', &mut stdout_buf), if stdout_open => match read {
                    Ok(n) => {
                        stdout_open = n > 0;
                        if let Some(text) = take_line(&mut stdout_buf) {
                            self.forward(&mut tail, OutputLine::stdout(text));
                        }
                    }
                    Err(source) => return Err(abort_on_read_error(&mut child, shown, "stdout", source).await),
                },
                read = stderr_reader.read_until(b'\n', &mut stderr_buf), if stderr_open => match read {
                    Ok(n) => {
                        stderr_open = n > 0;
                        if let Some(text) = take_line(&mut stderr_buf) {
                            self.forward(&mut tail, OutputLine::stderr(text));
                        }
                    }
                    Err(source) => return Err(abort_on_read_error(&mut child, shown, "stderr", source).await),
                },
                changed = cancel.changed(), if cancel_open => {
                    // Sender gone: nobody can cancel this run any more
                    let requested = changed.is_ok() && *cancel.borrow();
                    if changed.is_err() {
                        cancel_open = false;
                    } else if requested {
                        warn!(command = %shown, "cancellation requested, killing step process");
                        if let Err(e) = child.kill().await {
                            warn!(command = %shown, error = %e, "failed to kill step process");
                        }
                        return Err(ExecutionError::Cancelled { command: shown });
                    }
                },
                status = child.wait(), if !stdout_open && !stderr_open => {
                    break status.map_err(|source| ExecutionError::Io {
                        command: shown.clone(),
                        source,
                    })?;
                },
            }
        };

        if status.success() {
            debug!(command = %shown, "step process exited cleanly");
            Ok(CommandResult::success(tail.into_lines()))
        } else {
            Err(ExecutionError::NonZeroExit {
                command: shown,
                exit_code: status.code(),
            })
        }
    }
}
