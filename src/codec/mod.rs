//! Translation between [`Param`] blocks and the big-endian SEG-Y trace header layout.
//!
//! Records in a buffer are `stride` bytes apart. The first byte of each record is
//! trace header byte `base` (zero-based), so a header-only read of a rule set's
//! extent uses `base = extent.start`, while a whole-trace read uses `base = 0`.

pub mod ibm;
pub mod scalar;

use std::collections::BTreeMap;

use crate::constants::{FORMAT_IBM, FORMAT_IEEE, SAMPLE_SIZE, TRACE_HEADER_SIZE, trace_size};
use crate::error::{Result, SegyError};
use crate::param::Param;
use crate::rule::{Rule, RuleEntry};

pub use ibm::{ibm_to_ieee, ieee_to_ibm};
pub use scalar::{coarsen_scalar, combine_scalars, find_scalar, parse_scalar};

/// Where trace headers sit inside an I/O buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Zero-based trace header byte found at the start of each record.
    pub base: usize,
    /// Distance in bytes between consecutive records.
    pub stride: usize,
}

impl RecordLayout {
    /// Packed header windows covering exactly the rule set's extent.
    #[must_use]
    pub fn headers(rule: &Rule) -> Self {
        let extent = rule.extent();
        Self {
            base: extent.start,
            stride: extent.len(),
        }
    }

    /// Whole trace records of `ns` samples.
    #[must_use]
    pub fn traces(ns: usize) -> Self {
        Self {
            base: 0,
            stride: trace_size(ns),
        }
    }
}

/// Decode `count` records from `buf` into `prm`, starting at record `skip`.
pub fn decode(
    buf: &[u8],
    layout: RecordLayout,
    rule: &Rule,
    count: usize,
    prm: &mut Param,
    skip: usize,
) -> Result<()> {
    check_shape(rule, prm.rule())?;
    check_bounds(buf.len(), layout, rule, count, prm.size(), skip)?;
    for i in 0..count {
        let at = i * layout.stride;
        decode_record(&buf[at..], layout.base, rule, prm, skip + i);
    }
    Ok(())
}

/// Encode `count` records of `prm`, starting at record `skip`, into `buf`.
///
/// Scaled floats that share a scalar slot are quantised with one combined scalar.
pub fn encode(
    prm: &Param,
    rule: &Rule,
    count: usize,
    layout: RecordLayout,
    buf: &mut [u8],
    skip: usize,
) -> Result<()> {
    check_shape(rule, prm.rule())?;
    check_bounds(buf.len(), layout, rule, count, prm.size(), skip)?;
    for i in 0..count {
        let at = i * layout.stride;
        encode_record(prm, skip + i, rule, &mut buf[at..], layout.base)?;
    }
    Ok(())
}

fn check_shape(rule: &Rule, columns: &Rule) -> Result<()> {
    let shape = |r: &Rule| {
        (
            r.num_long(),
            r.num_short(),
            r.num_float(),
            r.num_index(),
            r.num_copy(),
        )
    };
    if shape(rule) != shape(columns) {
        return Err(SegyError::Codec {
            reason: "rule set does not match the parameter block's columns".into(),
        });
    }
    Ok(())
}

fn check_bounds(
    len: usize,
    layout: RecordLayout,
    rule: &Rule,
    count: usize,
    size: usize,
    skip: usize,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    let extent = rule.extent();
    if extent.start < layout.base {
        return Err(SegyError::Codec {
            reason: format!(
                "rule extent starts at byte {} before the buffer base {}",
                extent.start, layout.base
            ),
        });
    }
    let needed = (count - 1) * layout.stride + (extent.end - layout.base);
    if len < needed {
        return Err(SegyError::Codec {
            reason: format!("buffer of {len} bytes cannot hold {count} records ({needed} needed)"),
        });
    }
    if skip + count > size {
        return Err(SegyError::OutOfRange {
            offset: skip + count - 1,
            nt: size,
        });
    }
    Ok(())
}

/// Decode one header into record `index`. `header[0]` is trace header byte `base`.
pub(crate) fn decode_record(header: &[u8], base: usize, rule: &Rule, prm: &mut Param, index: usize) {
    let (num_long, num_short, num_float) = (rule.num_long(), rule.num_short(), rule.num_float());
    for (_, entry) in rule.iter() {
        match *entry {
            RuleEntry::Long { num, loc } => {
                prm.longs[index * num_long + num] = i64::from(read_i32(header, loc - 1 - base));
            }
            RuleEntry::Short { num, loc } => {
                prm.shorts[index * num_short + num] = read_i16(header, loc - 1 - base);
            }
            RuleEntry::ScaledFloat {
                num,
                loc,
                scalar_loc,
            } => {
                let stored = f64::from(read_i32(header, loc - 1 - base));
                let scalar = read_i16(header, scalar_loc - 1 - base);
                prm.floats[index * num_float + num] = stored * parse_scalar(scalar);
            }
            RuleEntry::Copy { .. } => {
                if base == 0 && header.len() >= TRACE_HEADER_SIZE {
                    if let Some(raw) = prm.raw_header_mut(index) {
                        raw.copy_from_slice(&header[..TRACE_HEADER_SIZE]);
                    }
                }
            }
            RuleEntry::Index { .. } => {}
        }
    }
}

fn encode_record(
    prm: &Param,
    index: usize,
    rule: &Rule,
    header: &mut [u8],
    base: usize,
) -> Result<()> {
    if rule.num_copy() > 0 && base == 0 {
        if let Some(raw) = prm.raw_header(index) {
            header[..TRACE_HEADER_SIZE].copy_from_slice(raw);
        }
    }

    let (num_long, num_short, num_float) = (rule.num_long(), rule.num_short(), rule.num_float());

    let mut slots: BTreeMap<usize, (i16, Vec<f64>)> = BTreeMap::new();
    for (_, entry) in rule.iter() {
        if let RuleEntry::ScaledFloat {
            num, scalar_loc, ..
        } = *entry
        {
            let value = prm.floats[index * num_float + num];
            let slot = slots.entry(scalar_loc).or_insert((1, Vec::new()));
            slot.0 = combine_scalars(slot.0, find_scalar(value));
            slot.1.push(value);
        }
    }
    let mut scalars: BTreeMap<usize, i16> = BTreeMap::new();
    for (scalar_loc, (wanted, values)) in slots {
        let scalar = coarsen_scalar(wanted, &values).ok_or_else(|| SegyError::Codec {
            reason: format!("no scalar at byte {scalar_loc} fits values {values:?}"),
        })?;
        write_i16(header, scalar_loc - 1 - base, scalar);
        scalars.insert(scalar_loc, scalar);
    }

    for (meta, entry) in rule.iter() {
        match *entry {
            RuleEntry::Long { num, loc } => {
                let value = prm.longs[index * num_long + num];
                let value = i32::try_from(value).map_err(|_| SegyError::Codec {
                    reason: format!("{meta:?} value {value} does not fit in 32 bits"),
                })?;
                write_i32(header, loc - 1 - base, value);
            }
            RuleEntry::Short { num, loc } => {
                write_i16(header, loc - 1 - base, prm.shorts[index * num_short + num]);
            }
            RuleEntry::ScaledFloat {
                num,
                loc,
                scalar_loc,
            } => {
                let scalar = scalars.get(&scalar_loc).copied().unwrap_or(1);
                let value = prm.floats[index * num_float + num];
                let stored = (value / parse_scalar(scalar)).round();
                if !scalar::fits_i32(stored) {
                    return Err(SegyError::Codec {
                        reason: format!("{meta:?} value {value} overflows with scalar {scalar}"),
                    });
                }
                write_i32(header, loc - 1 - base, stored as i32);
            }
            RuleEntry::Index { .. } | RuleEntry::Copy { .. } => {}
        }
    }
    Ok(())
}

/// Decode big-endian samples of the given format code into host floats.
pub fn decode_samples(bytes: &[u8], format: i16, out: &mut [f32]) -> Result<()> {
    if bytes.len() < out.len() * SAMPLE_SIZE {
        return Err(SegyError::Codec {
            reason: format!("{} sample bytes for {} samples", bytes.len(), out.len()),
        });
    }
    let words = bytes.chunks_exact(SAMPLE_SIZE).map(|chunk| {
        let mut word = [0u8; SAMPLE_SIZE];
        word.copy_from_slice(chunk);
        u32::from_be_bytes(word)
    });
    match format {
        FORMAT_IBM => {
            for (sample, word) in out.iter_mut().zip(words) {
                *sample = ibm_to_ieee(word);
            }
        }
        FORMAT_IEEE => {
            for (sample, word) in out.iter_mut().zip(words) {
                *sample = f32::from_bits(word);
            }
        }
        other => {
            return Err(SegyError::Codec {
                reason: format!("unsupported sample format code {other}"),
            });
        }
    }
    Ok(())
}

/// Encode host floats as big-endian IEEE samples.
pub fn encode_samples(samples: &[f32], out: &mut [u8]) -> Result<()> {
    if out.len() < samples.len() * SAMPLE_SIZE {
        return Err(SegyError::Codec {
            reason: format!("{} bytes for {} samples", out.len(), samples.len()),
        });
    }
    for (chunk, sample) in out.chunks_exact_mut(SAMPLE_SIZE).zip(samples) {
        chunk.copy_from_slice(&sample.to_bits().to_be_bytes());
    }
    Ok(())
}

pub(crate) fn read_i32(buf: &[u8], at: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    i32::from_be_bytes(word)
}

pub(crate) fn read_i16(buf: &[u8], at: usize) -> i16 {
    let mut half = [0u8; 2];
    half.copy_from_slice(&buf[at..at + 2]);
    i16::from_be_bytes(half)
}

pub(crate) fn write_i32(buf: &mut [u8], at: usize, value: i32) {
    buf[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

pub(crate) fn write_i16(buf: &mut [u8], at: usize, value: i16) {
    buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
}
