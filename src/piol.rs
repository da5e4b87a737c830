//! The per-process context handed to every store and operation.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::comm::{Collective, SerialComm};
use crate::config::PiolConfig;
use crate::error::{Result, SegyError};
use crate::log::{Layer, Log, Severity, Verbosity};

/// Collective channel, process log and configuration for one rank.
///
/// Created once per program run and shared by `Arc` between stores.
pub struct Piol {
    comm: Arc<dyn Collective>,
    log: Mutex<Log>,
    config: PiolConfig,
}

impl std::fmt::Debug for Piol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piol")
            .field("rank", &self.comm.rank())
            .field("num_rank", &self.comm.num_rank())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Piol {
    #[must_use]
    pub fn new(comm: Arc<dyn Collective>, config: PiolConfig) -> Self {
        let log = Log::new(comm.rank(), config.verbosity);
        Self {
            comm,
            log: Mutex::new(log),
            config,
        }
    }

    /// Single-process context with the default configuration.
    #[must_use]
    pub fn serial() -> Self {
        Self::new(Arc::new(SerialComm), PiolConfig::default())
    }

    #[must_use]
    pub fn comm(&self) -> &dyn Collective {
        self.comm.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &PiolConfig {
        &self.config
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[must_use]
    pub fn num_rank(&self) -> usize {
        self.comm.num_rank()
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn record(
        &self,
        layer: Layer,
        severity: Severity,
        verbosity: Verbosity,
        message: impl Into<String>,
    ) {
        self.log().record(layer, severity, verbosity, message);
    }

    /// Record `err` against `layer` and hand it back for propagation.
    pub fn fail(&self, layer: Layer, err: SegyError) -> SegyError {
        self.record(layer, Severity::Error, Verbosity::None, err.to_string());
        err
    }

    pub fn warn(&self, layer: Layer, message: impl Into<String>) {
        self.record(layer, Severity::Warning, Verbosity::Minimal, message);
    }

    /// Whether this rank has logged an error.
    #[must_use]
    pub fn is_err(&self) -> bool {
        self.log().has_error()
    }

    pub fn check_ok(&self) -> Result<()> {
        let log = self.log();
        if log.has_error() {
            return Err(SegyError::Fatal {
                entries: log.error_count(),
            });
        }
        Ok(())
    }

    /// Hard stop: if an error was logged, dump the log to stderr and exit.
    pub fn assert_ok(&self) {
        if self.dump_on_error(&mut std::io::stderr().lock()) {
            std::process::exit(1);
        }
    }

    /// Dump the log to `out` if it holds an error. Returns whether it did.
    fn dump_on_error(&self, out: &mut impl std::io::Write) -> bool {
        let log = self.log();
        if !log.has_error() {
            return false;
        }
        let _ = log.dump(out);
        true
    }

    /// Copy of every retained log entry.
    #[must_use]
    pub fn log_entries(&self) -> Vec<crate::log::LogEntry> {
        self.log().entries().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_flip_the_checkpoint() {
        let piol = Piol::serial();
        assert!(!piol.is_err());
        piol.check_ok().expect("clean");

        piol.warn(Layer::File, "offset past end");
        assert!(!piol.is_err());

        let err = piol.fail(
            Layer::File,
            SegyError::Limit {
                what: "ns",
                value: 70_000,
                limit: 65_535,
            },
        );
        assert!(matches!(err, SegyError::Limit { .. }));
        assert!(piol.is_err());
        assert!(matches!(
            piol.check_ok(),
            Err(SegyError::Fatal { entries: 1 })
        ));
        assert_eq!(piol.log_entries().len(), 2);
    }

    #[test]
    fn hard_stop_dumps_only_when_an_error_was_logged() {
        let piol = Piol::serial();
        piol.warn(Layer::Ops, "shard too small");
        let mut out = Vec::new();
        assert!(!piol.dump_on_error(&mut out));
        assert!(out.is_empty());
        // no error logged, so this returns
        piol.assert_ok();

        piol.fail(Layer::Io, SegyError::Config { reason: "unreadable".into() });
        assert!(piol.dump_on_error(&mut out));
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "[rank 0] ops Warning: shard too small\n[rank 0] io Error: configuration error: unreadable\n"
        );
    }
}
