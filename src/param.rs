//! Columnar per-trace metadata blocks.
//!
//! A [`Param`] holds `size` records laid out as five column families (floats,
//! longs, shorts, indices and raw header copies). Every family has exactly
//! `size * count` slots where `count` is the matching per-kind count of the
//! block's [`Rule`]. Record `i`, ordinal `n` lives at `i * count + n`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::constants::TRACE_HEADER_SIZE;
use crate::error::{Result, SegyError};
use crate::meta::Meta;
use crate::rule::{Rule, RuleEntry, RuleKind};

/// Conversion between caller-facing numbers and the column element types.
pub trait ParamValue: Copy {
    fn from_float(value: f64) -> Self;
    fn from_long(value: i64) -> Self;
    fn from_short(value: i16) -> Self;
    fn from_index(value: u64) -> Self;
    fn to_float(self) -> f64;
    fn to_long(self) -> i64;
    fn to_short(self) -> i16;
    fn to_index(self) -> u64;
}

macro_rules! impl_param_value_int {
    ($($ty:ty),*) => {$(
        impl ParamValue for $ty {
            fn from_float(value: f64) -> Self { value.round() as $ty }
            fn from_long(value: i64) -> Self { value as $ty }
            fn from_short(value: i16) -> Self { value as $ty }
            fn from_index(value: u64) -> Self { value as $ty }
            fn to_float(self) -> f64 { self as f64 }
            fn to_long(self) -> i64 { self as i64 }
            fn to_short(self) -> i16 { self as i16 }
            fn to_index(self) -> u64 { self as u64 }
        }
    )*};
}

macro_rules! impl_param_value_float {
    ($($ty:ty),*) => {$(
        impl ParamValue for $ty {
            fn from_float(value: f64) -> Self { value as $ty }
            fn from_long(value: i64) -> Self { value as $ty }
            fn from_short(value: i16) -> Self { value as $ty }
            fn from_index(value: u64) -> Self { value as $ty }
            fn to_float(self) -> f64 { self as f64 }
            fn to_long(self) -> i64 { self.round() as i64 }
            fn to_short(self) -> i16 { self.round() as i16 }
            fn to_index(self) -> u64 { self.round() as u64 }
        }
    )*};
}

impl_param_value_int!(i16, i32, i64, u32, u64, usize);
impl_param_value_float!(f32, f64);

/// Columnar container of trace metadata addressed through a [`Rule`].
#[derive(Debug, Clone)]
pub struct Param {
    rule: Arc<Rule>,
    size: usize,
    pub(crate) floats: Vec<f64>,
    pub(crate) longs: Vec<i64>,
    pub(crate) shorts: Vec<i16>,
    pub(crate) indices: Vec<u64>,
    pub(crate) copy: Vec<u8>,
}

impl Param {
    /// Block of `size` zeroed records shaped by `rule`.
    #[must_use]
    pub fn new(rule: Arc<Rule>, size: usize) -> Self {
        let copy = if rule.num_copy() > 0 {
            vec![0u8; size * TRACE_HEADER_SIZE]
        } else {
            Vec::new()
        };
        Self {
            floats: vec![0.0; size * rule.num_float()],
            longs: vec![0; size * rule.num_long()],
            shorts: vec![0; size * rule.num_short()],
            indices: vec![0; size * rule.num_index()],
            copy,
            rule,
            size,
        }
    }

    /// Block using the default SEG-Y rule set.
    #[must_use]
    pub fn with_default_rule(size: usize) -> Self {
        Self::new(Arc::new(Rule::default()), size)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.size * self.rule.per_record_memory()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.size {
            return Err(SegyError::OutOfRange {
                offset: index,
                nt: self.size,
            });
        }
        Ok(())
    }

    /// Read attribute `meta` of record `index`, converted to `T`.
    pub fn get<T: ParamValue>(&self, index: usize, meta: Meta) -> Result<T> {
        self.check_index(index)?;
        let entry = self.rule.entry(meta)?;
        let num = entry.num();
        Ok(match entry {
            RuleEntry::ScaledFloat { .. } => {
                T::from_float(self.floats[index * self.rule.num_float() + num])
            }
            RuleEntry::Long { .. } => T::from_long(self.longs[index * self.rule.num_long() + num]),
            RuleEntry::Short { .. } => {
                T::from_short(self.shorts[index * self.rule.num_short() + num])
            }
            RuleEntry::Index { .. } => {
                T::from_index(self.indices[index * self.rule.num_index() + num])
            }
            RuleEntry::Copy { .. } => {
                return Err(SegyError::TypeMismatch {
                    meta,
                    expected: "numeric",
                    found: RuleKind::Copy.name(),
                });
            }
        })
    }

    /// Write attribute `meta` of record `index`, converted to the column type.
    pub fn set<T: ParamValue>(&mut self, index: usize, meta: Meta, value: T) -> Result<()> {
        self.check_index(index)?;
        let entry = *self.rule.entry(meta)?;
        let num = entry.num();
        match entry {
            RuleEntry::ScaledFloat { .. } => {
                let at = index * self.rule.num_float() + num;
                self.floats[at] = value.to_float();
            }
            RuleEntry::Long { .. } => {
                let at = index * self.rule.num_long() + num;
                self.longs[at] = value.to_long();
            }
            RuleEntry::Short { .. } => {
                let at = index * self.rule.num_short() + num;
                self.shorts[at] = value.to_short();
            }
            RuleEntry::Index { .. } => {
                let at = index * self.rule.num_index() + num;
                self.indices[at] = value.to_index();
            }
            RuleEntry::Copy { .. } => {
                return Err(SegyError::TypeMismatch {
                    meta,
                    expected: "numeric",
                    found: RuleKind::Copy.name(),
                });
            }
        }
        Ok(())
    }

    /// Raw trace header bytes buffered for record `index`, if the rule set copies them.
    #[must_use]
    pub fn raw_header(&self, index: usize) -> Option<&[u8]> {
        if self.copy.is_empty() || index >= self.size {
            return None;
        }
        let at = index * TRACE_HEADER_SIZE;
        Some(&self.copy[at..at + TRACE_HEADER_SIZE])
    }

    pub(crate) fn raw_header_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        if self.copy.is_empty() || index >= self.size {
            return None;
        }
        let at = index * TRACE_HEADER_SIZE;
        Some(&mut self.copy[at..at + TRACE_HEADER_SIZE])
    }

    /// New block holding `rows` of this one, in the given order.
    pub fn select(&self, rows: &[usize]) -> Result<Param> {
        let mut out = Param::new(Arc::clone(&self.rule), rows.len());
        for (to, &from) in rows.iter().enumerate() {
            self.check_index(from)?;
            out.copy_columns(to, self, from);
        }
        Ok(out)
    }

    /// Records `[start, end)` as a serializable column set.
    pub fn rows(&self, start: usize, end: usize) -> Result<ParamRows> {
        if start > end || end > self.size {
            return Err(SegyError::OutOfRange {
                offset: end,
                nt: self.size,
            });
        }
        let rule = &self.rule;
        let slice = |width: usize| start * width..end * width;
        let copy_width = if self.copy.is_empty() {
            0
        } else {
            TRACE_HEADER_SIZE
        };
        Ok(ParamRows {
            size: end - start,
            floats: self.floats[slice(rule.num_float())].to_vec(),
            longs: self.longs[slice(rule.num_long())].to_vec(),
            shorts: self.shorts[slice(rule.num_short())].to_vec(),
            indices: self.indices[slice(rule.num_index())].to_vec(),
            copy: self.copy[slice(copy_width)].to_vec(),
        })
    }

    /// Block shaped by `rule` holding `rows`, checked against the rule's widths.
    pub fn from_rows(rule: Arc<Rule>, rows: ParamRows) -> Result<Param> {
        let size = rows.size;
        let copy_len = if rule.num_copy() > 0 {
            size * TRACE_HEADER_SIZE
        } else {
            0
        };
        let shaped = rows.floats.len() == size * rule.num_float()
            && rows.longs.len() == size * rule.num_long()
            && rows.shorts.len() == size * rule.num_short()
            && rows.indices.len() == size * rule.num_index()
            && rows.copy.len() == copy_len;
        if !shaped {
            return Err(SegyError::Codec {
                reason: format!("{size} received records do not match the rule set"),
            });
        }
        Ok(Param {
            rule,
            size,
            floats: rows.floats,
            longs: rows.longs,
            shorts: rows.shorts,
            indices: rows.indices,
            copy: rows.copy,
        })
    }

    /// Records of `self` followed by those of `other`. Both must share a rule set.
    pub fn concat(&self, other: &Param) -> Result<Param> {
        if !Arc::ptr_eq(&self.rule, &other.rule) {
            return Err(SegyError::Codec {
                reason: "cannot concatenate blocks with different rule sets".into(),
            });
        }
        let mut out = self.clone();
        out.size += other.size;
        out.floats.extend_from_slice(&other.floats);
        out.longs.extend_from_slice(&other.longs);
        out.shorts.extend_from_slice(&other.shorts);
        out.indices.extend_from_slice(&other.indices);
        out.copy.extend_from_slice(&other.copy);
        Ok(out)
    }

    fn copy_columns(&mut self, dst: usize, src: &Param, from: usize) {
        fn copy_family<T: Copy>(dst: &mut [T], src: &[T], width: usize, to: usize, from: usize) {
            if width > 0 {
                dst[to * width..(to + 1) * width]
                    .copy_from_slice(&src[from * width..(from + 1) * width]);
            }
        }
        let rule = &self.rule;
        copy_family(&mut self.floats, &src.floats, rule.num_float(), dst, from);
        copy_family(&mut self.longs, &src.longs, rule.num_long(), dst, from);
        copy_family(&mut self.shorts, &src.shorts, rule.num_short(), dst, from);
        copy_family(&mut self.indices, &src.indices, rule.num_index(), dst, from);
        let copy_width = if self.copy.is_empty() {
            0
        } else {
            TRACE_HEADER_SIZE
        };
        copy_family(&mut self.copy, &src.copy, copy_width, dst, from);
    }
}

/// Plain column data of a run of records, used to move records between ranks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamRows {
    pub size: usize,
    pub floats: Vec<f64>,
    pub longs: Vec<i64>,
    pub shorts: Vec<i16>,
    pub indices: Vec<u64>,
    pub copy: Vec<u8>,
}

/// Copy record `src_index` of `src` into record `dst_index` of `dst`.
///
/// Blocks sharing one rule set are copied column by column. Otherwise a raw
/// header copy in `src` is decoded into `dst` first, then every attribute
/// present in both rule sets with the same kind is copied over it.
pub fn copy_record(src: &Param, src_index: usize, dst: &mut Param, dst_index: usize) -> Result<()> {
    src.check_index(src_index)?;
    dst.check_index(dst_index)?;

    if Arc::ptr_eq(&src.rule, &dst.rule) {
        dst.copy_columns(dst_index, src, src_index);
        return Ok(());
    }

    if let Some(raw) = src.raw_header(src_index) {
        let raw = raw.to_vec();
        if let Some(target) = dst.raw_header_mut(dst_index) {
            target.copy_from_slice(&raw);
        }
        let rule = Arc::clone(&dst.rule);
        codec::decode_record(&raw, 0, &rule, dst, dst_index);
    }

    for (meta, entry) in src.rule.iter() {
        let Some(target) = dst.rule.get(meta) else {
            continue;
        };
        if target.kind() != entry.kind() {
            continue;
        }
        let (from, to) = (entry.num(), target.num());
        match entry.kind() {
            RuleKind::Float => {
                let value = src.floats[src_index * src.rule.num_float() + from];
                let at = dst_index * dst.rule.num_float() + to;
                dst.floats[at] = value;
            }
            RuleKind::Long => {
                let value = src.longs[src_index * src.rule.num_long() + from];
                let at = dst_index * dst.rule.num_long() + to;
                dst.longs[at] = value;
            }
            RuleKind::Short => {
                let value = src.shorts[src_index * src.rule.num_short() + from];
                let at = dst_index * dst.rule.num_short() + to;
                dst.shorts[at] = value;
            }
            RuleKind::Index => {
                let value = src.indices[src_index * src.rule.num_index() + from];
                let at = dst_index * dst.rule.num_index() + to;
                dst.indices[at] = value;
            }
            RuleKind::Copy => {}
        }
    }
    Ok(())
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.floats == other.floats
            && self.longs == other.longs
            && self.shorts == other.shorts
            && self.indices == other.indices
            && self.copy == other.copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn il_xl_rule() -> Arc<Rule> {
        let mut rule = Rule::new(false);
        rule.add_default(Meta::Il);
        rule.add_default(Meta::Xl);
        rule.add_default(Meta::XSrc);
        rule.add_default(Meta::Gtn);
        Arc::new(rule)
    }

    #[test]
    fn columns_are_sized_by_rule_counts() {
        let prm = Param::new(il_xl_rule(), 7);
        assert_eq!(prm.longs.len(), 14);
        assert_eq!(prm.floats.len(), 7);
        assert_eq!(prm.indices.len(), 7);
        assert!(prm.shorts.is_empty());
        assert!(prm.copy.is_empty());
    }

    #[test]
    fn get_set_dispatch_on_entry_kind() {
        let mut prm = Param::new(il_xl_rule(), 3);
        prm.set(1, Meta::Il, 1200_i64).unwrap();
        prm.set(1, Meta::Xl, 33_i32).unwrap();
        prm.set(2, Meta::XSrc, 1.25_f64).unwrap();
        prm.set(2, Meta::Gtn, 99_usize).unwrap();

        assert_eq!(prm.get::<i64>(1, Meta::Il).unwrap(), 1200);
        assert_eq!(prm.get::<i64>(1, Meta::Xl).unwrap(), 33);
        assert_eq!(prm.get::<f64>(2, Meta::XSrc).unwrap(), 1.25);
        assert_eq!(prm.get::<usize>(2, Meta::Gtn).unwrap(), 99);
        assert_eq!(prm.get::<i64>(0, Meta::Il).unwrap(), 0);
    }

    #[test]
    fn unknown_attribute_and_bad_index_fail() {
        let mut prm = Param::new(il_xl_rule(), 2);
        assert!(matches!(
            prm.get::<f64>(0, Meta::YRcv),
            Err(SegyError::RuleNotFound { .. })
        ));
        assert!(matches!(
            prm.set(2, Meta::Il, 1_i64),
            Err(SegyError::OutOfRange { offset: 2, nt: 2 })
        ));
    }

    #[test]
    fn copy_record_same_rule_copies_every_column() {
        let rule = il_xl_rule();
        let mut src = Param::new(Arc::clone(&rule), 2);
        src.set(1, Meta::Il, 5_i64).unwrap();
        src.set(1, Meta::XSrc, 2.5_f64).unwrap();
        src.set(1, Meta::Gtn, 8_u64).unwrap();
        let mut dst = Param::new(rule, 1);
        copy_record(&src, 1, &mut dst, 0).unwrap();
        assert_eq!(dst.get::<i64>(0, Meta::Il).unwrap(), 5);
        assert_eq!(dst.get::<f64>(0, Meta::XSrc).unwrap(), 2.5);
        assert_eq!(dst.get::<u64>(0, Meta::Gtn).unwrap(), 8);
    }

    #[test]
    fn copy_record_across_rules_skips_absent_and_mismatched() {
        let mut src = Param::new(il_xl_rule(), 1);
        src.set(0, Meta::Il, 10_i64).unwrap();
        src.set(0, Meta::Xl, 20_i64).unwrap();
        src.set(0, Meta::XSrc, 3.0_f64).unwrap();

        let mut rule = Rule::new(false);
        rule.add_default(Meta::Il);
        rule.add_short(Meta::Xl, 193).unwrap();
        let mut dst = Param::new(Arc::new(rule), 1);
        copy_record(&src, 0, &mut dst, 0).unwrap();

        assert_eq!(dst.get::<i64>(0, Meta::Il).unwrap(), 10);
        assert_eq!(dst.get::<i64>(0, Meta::Xl).unwrap(), 0);
    }

    #[test]
    fn copy_rule_decodes_unmodelled_fields_into_destination() {
        let mut rule = Rule::new(true);
        rule.add_copy();
        rule.add_default(Meta::Il);
        let mut src = Param::new(Arc::new(rule), 1);
        {
            let raw = src.raw_header_mut(0).unwrap();
            // crossline 77 at bytes 193..197
            raw[192..196].copy_from_slice(&77_i32.to_be_bytes());
        }
        src.set(0, Meta::Il, 4_i64).unwrap();

        let mut dst_rule = Rule::new(false);
        dst_rule.add_default(Meta::Il);
        dst_rule.add_default(Meta::Xl);
        let mut dst = Param::new(Arc::new(dst_rule), 1);
        copy_record(&src, 0, &mut dst, 0).unwrap();

        assert_eq!(dst.get::<i64>(0, Meta::Xl).unwrap(), 77);
        assert_eq!(dst.get::<i64>(0, Meta::Il).unwrap(), 4);
    }

    #[test]
    fn equality_is_columnwise() {
        let rule = il_xl_rule();
        let mut a = Param::new(Arc::clone(&rule), 2);
        let b = Param::new(rule, 2);
        assert_eq!(a, b);
        a.set(0, Meta::XSrc, 1e-9_f64).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rows_travel_and_reassemble() {
        let rule = il_xl_rule();
        let mut prm = Param::new(Arc::clone(&rule), 4);
        for i in 0..4 {
            prm.set(i, Meta::Il, i as i64 * 10).unwrap();
            prm.set(i, Meta::Gtn, i).unwrap();
        }
        let rows = prm.rows(1, 3).unwrap();
        assert_eq!(rows.size, 2);
        let tail = Param::from_rows(Arc::clone(&rule), rows).unwrap();
        assert_eq!(tail.get::<i64>(0, Meta::Il).unwrap(), 10);

        let picked = prm.select(&[3, 0]).unwrap();
        assert_eq!(picked.get::<u64>(0, Meta::Gtn).unwrap(), 3);
        assert_eq!(picked.get::<u64>(1, Meta::Gtn).unwrap(), 0);

        let joined = picked.concat(&tail).unwrap();
        assert_eq!(joined.size(), 4);
        assert_eq!(joined.get::<i64>(3, Meta::Il).unwrap(), 20);

        let other = Param::new(il_xl_rule(), 1);
        assert!(joined.concat(&other).is_err());
        assert!(prm.rows(3, 5).is_err());
    }
}
