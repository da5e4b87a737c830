//! Process-local log of diagnostics.
//!
//! Entries are kept in memory so they can be dumped at a checkpoint, and every
//! entry is mirrored to `tracing` as it is recorded.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

/// Which part of the stack produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    Comm,
    Io,
    File,
    Ops,
    Set,
}

impl Layer {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Comm => "comm",
            Self::Io => "io",
            Self::File => "file",
            Self::Ops => "ops",
            Self::Set => "set",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// How chatty the log is. Entries above the configured level are dropped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    None,
    #[default]
    Minimal,
    Extended,
    Verbose,
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub rank: usize,
    pub layer: Layer,
    pub severity: Severity,
    pub message: String,
    pub verbosity: Verbosity,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[rank {}] {} {:?}: {}",
            self.rank,
            self.layer.name(),
            self.severity,
            self.message
        )
    }
}

#[derive(Debug)]
pub struct Log {
    rank: usize,
    max_verbosity: Verbosity,
    entries: Vec<LogEntry>,
    errors: usize,
}

impl Log {
    #[must_use]
    pub fn new(rank: usize, max_verbosity: Verbosity) -> Self {
        Self {
            rank,
            max_verbosity,
            entries: Vec::new(),
            errors: 0,
        }
    }

    /// Append an entry. Errors are always kept, whatever the verbosity.
    pub fn record(
        &mut self,
        layer: Layer,
        severity: Severity,
        verbosity: Verbosity,
        message: impl Into<String>,
    ) {
        let message = message.into();
        let rank = self.rank;
        let layer_name = layer.name();
        match severity {
            Severity::Error => tracing::error!(rank, layer = layer_name, "{message}"),
            Severity::Warning => tracing::warn!(rank, layer = layer_name, "{message}"),
            Severity::Info => tracing::info!(rank, layer = layer_name, "{message}"),
            Severity::Debug => tracing::debug!(rank, layer = layer_name, "{message}"),
        }

        if severity == Severity::Error {
            self.errors += 1;
        } else if verbosity > self.max_verbosity {
            return;
        }
        self.entries.push(LogEntry {
            rank,
            layer,
            severity,
            message,
            verbosity,
        });
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.errors > 0
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Write every entry, one per line.
    pub fn dump(&self, out: &mut impl Write) -> std::io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{entry}")?;
        }
        out.flush()
    }
}
