//! Error types shared by every layer of the crate.

use thiserror::Error;

use crate::meta::Meta;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SegyError>;

#[derive(Debug, Error)]
pub enum SegyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// Lookup of an attribute that has no entry in the rule set.
    #[error("no rule registered for {meta:?}")]
    RuleNotFound { meta: Meta },

    #[error("rule for {meta:?} is stored as {found}, requested as {expected}")]
    TypeMismatch {
        meta: Meta,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{what} of {value} exceeds the limit of {limit}")]
    Limit {
        what: &'static str,
        value: u64,
        limit: u64,
    },

    #[error("trace offset {offset} is outside the file ({nt} traces)")]
    OutOfRange { offset: usize, nt: usize },

    /// Raised by the distributed sort when a rank holds too few records.
    #[error("insufficient data: smallest local shard holds {min_local} records, {required} required")]
    InsufficientData { min_local: usize, required: usize },

    #[error("collective {operation} failed: {reason}")]
    Collective {
        operation: &'static str,
        reason: String,
    },

    #[error("codec error: {reason}")]
    Codec { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("payload encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("payload decode failed: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("config parse failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The process-local log recorded at least one error.
    #[error("{entries} error(s) recorded in the process log")]
    Fatal { entries: usize },
}
