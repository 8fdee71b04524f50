//! Forwarding of step output to the operator
//!
//! A runner hands every line it reads from a child process to an
//! [`OutputSink`] as soon as the line arrives, so operators see step
//! progress while a long step is still running.

use crate::core::{OutputLine, OutputStream};
use std::collections::VecDeque;
use std::io::{self, Write};

/// Receiver for child process output lines
///
/// This trait is object-safe and can be used as `Arc<dyn OutputSink>`.
pub trait OutputSink: Send + Sync {
    /// Called once per line, in the order lines were read
    fn on_line(&self, line: &OutputLine);
}

/// Writes stdout lines to our stdout and stderr lines to our stderr, verbatim
#[derive(Debug, Clone, Default)]
pub struct TerminalSink;

impl OutputSink for TerminalSink {
    fn on_line(&self, line: &OutputLine) {
        match line.stream {
            OutputStream::Stdout => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{}", line.text);
                let _ = out.flush();
            }
            OutputStream::Stderr => {
                let mut err = io::stderr().lock();
                let _ = writeln!(err, "{}", line.text);
            }
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl OutputSink for NoopSink {
    fn on_line(&self, _line: &OutputLine) {}
}

/// Bounded buffer keeping the most recent lines of a command's output
#[derive(Debug)]
pub(crate) struct OutputTail {
    limit: usize,
    lines: VecDeque<OutputLine>,
}

impl OutputTail {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            lines: VecDeque::with_capacity(limit.min(1024)),
        }
    }

    pub(crate) fn push(&mut self, line: OutputLine) {
        if self.limit == 0 {
            return;
        }
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub(crate) fn into_lines(self) -> Vec<OutputLine> {
        self.lines.into()
    }
}
