//! SEG-Y trace stores.
//!
//! [`ReadSegy`] and [`WriteSegy`] pair a [`BlockIo`](crate::io::BlockIo)
//! driver with the header codec. Reads and writes are chunked so a single
//! call never buffers more than the configured `chunk_bytes`.

pub mod header;
mod read;
mod write;

use crate::error::{Result, SegyError};
use crate::meta::Meta;
use crate::param::Param;
use crate::rule::RuleEntry;

pub use header::BinaryHeader;
pub use read::ReadSegy;
pub use write::WriteSegy;

fn check_samples(len: usize, count: usize, ns: usize) -> Result<()> {
    if len < count * ns {
        return Err(SegyError::Codec {
            reason: format!("{len} samples given for {count} traces of {ns}"),
        });
    }
    Ok(())
}

fn chunk_records(chunk_bytes: usize, record: usize) -> usize {
    (chunk_bytes / record.max(1)).max(1)
}

/// Store the file trace number of each record read into `Meta::Gtn`, when the
/// block tracks it.
fn fill_trace_numbers(
    prm: &mut Param,
    skip: usize,
    numbers: impl Iterator<Item = u64>,
) -> Result<()> {
    if !matches!(prm.rule().get(Meta::Gtn), Some(RuleEntry::Index { .. })) {
        return Ok(());
    }
    for (i, gtn) in numbers.enumerate() {
        prm.set(skip + i, Meta::Gtn, gtn)?;
    }
    Ok(())
}
