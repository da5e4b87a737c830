#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::cast_possible_truncation,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Casts: trace counts, byte offsets and header fields are bounded by the SEG-Y
// layout (16/32-bit header fields, file sizes).
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::unnecessary_cast)]
//
// Style/complexity.
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)] // il/xl, ns/nt
//
// Pattern matching.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Low-value pedantic lints.
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::unreadable_literal)] // bit patterns read better as hex
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)]

//! Parallel SEG-Y trace I/O.
//!
//! Ranks cooperate through a [`Collective`] channel: each opens the same file,
//! reads or writes its block of traces independently and meets the others at
//! collective points (trace-count agreement, distributed sort, gather
//! boundaries). Trace headers are decoded into columnar [`Param`] blocks
//! shaped by a [`Rule`] set.

/// The crate version (matches `Cargo.toml`).
pub const SEGY_SHARD_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod codec;
pub mod comm;
pub mod config;
pub mod constants;
pub mod error;
pub mod file;
pub mod io;
pub mod log;
pub mod meta;
pub mod ops;
pub mod param;
pub mod piol;
pub mod rule;
pub mod set;

pub use comm::{Collective, CollectiveExt, LocalCluster, LocalComm, SerialComm};
pub use config::{PiolConfig, PiolConfigBuilder};
pub use error::{Result, SegyError};
pub use file::{ReadSegy, WriteSegy};
pub use io::{BlockIo, FileDriver, FileMode};
pub use log::{Layer, Log, LogEntry, Severity, Verbosity};
pub use meta::{Encoding, Meta, TraceHeaderField};
pub use ops::{CoordElem, GatherDist, GatherInfo, SortType, decompose};
pub use param::{Param, ParamRows, ParamValue, copy_record};
pub use piol::Piol;
pub use rule::{Extent, Rule, RuleEntry, RuleKind};
pub use set::{FileDesc, GatherFn, OpClass, Set, TraceFn};
