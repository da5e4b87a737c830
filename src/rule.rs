//! Trace metadata rule sets.
//!
//! A [`Rule`] maps each registered [`Meta`] attribute to a [`RuleEntry`]: where
//! the value lives inside the 240-byte trace header, how it is encoded, and which
//! column slot it occupies in a [`crate::Param`] block.
//!
//! Invariants:
//! - ordinals are dense per kind: the entries of one kind always number `0..count`.
//!   Removing an entry renumbers the survivors of the same kind.
//! - the cached extent covers every byte touched by a `Long`, `Short` or
//!   `ScaledFloat` entry, including the shared scalar of scaled floats.

use std::collections::BTreeMap;
use std::mem::size_of;

use once_cell::sync::OnceCell;

use crate::constants::TRACE_HEADER_SIZE;
use crate::error::{Result, SegyError};
use crate::meta::{Encoding, Meta};

/// Storage class of a rule entry; each class owns one column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Long,
    Short,
    Float,
    Index,
    Copy,
}

impl RuleKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            RuleKind::Long => "long",
            RuleKind::Short => "short",
            RuleKind::Float => "scaled-float",
            RuleKind::Index => "index",
            RuleKind::Copy => "copy",
        }
    }
}

/// One schema mapping. Locations are 1-based SEG-Y trace header byte numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEntry {
    /// 4-byte big-endian two's complement integer.
    Long { num: usize, loc: usize },
    /// 2-byte big-endian two's complement integer.
    Short { num: usize, loc: usize },
    /// 4-byte integer scaled by the 2-byte SEG-Y scalar at `scalar_loc`.
    ScaledFloat {
        num: usize,
        loc: usize,
        scalar_loc: usize,
    },
    /// Memory-only sequence number.
    Index { num: usize },
    /// Verbatim copy of the whole trace header.
    Copy { num: usize },
}

impl RuleEntry {
    /// Column ordinal within the entry's kind.
    #[must_use]
    pub const fn num(&self) -> usize {
        match *self {
            RuleEntry::Long { num, .. }
            | RuleEntry::Short { num, .. }
            | RuleEntry::ScaledFloat { num, .. }
            | RuleEntry::Index { num }
            | RuleEntry::Copy { num } => num,
        }
    }

    fn set_num(&mut self, value: usize) {
        match self {
            RuleEntry::Long { num, .. }
            | RuleEntry::Short { num, .. }
            | RuleEntry::ScaledFloat { num, .. }
            | RuleEntry::Index { num }
            | RuleEntry::Copy { num } => *num = value,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        match self {
            RuleEntry::Long { .. } => RuleKind::Long,
            RuleEntry::Short { .. } => RuleKind::Short,
            RuleEntry::ScaledFloat { .. } => RuleKind::Float,
            RuleEntry::Index { .. } => RuleKind::Index,
            RuleEntry::Copy { .. } => RuleKind::Copy,
        }
    }

    /// Zero-based `[start, end)` byte span inside the trace header, if the
    /// entry is stored there field by field.
    #[must_use]
    pub fn span(&self) -> Option<(usize, usize)> {
        match *self {
            RuleEntry::Long { loc, .. } => Some((loc - 1, loc - 1 + 4)),
            RuleEntry::Short { loc, .. } => Some((loc - 1, loc - 1 + 2)),
            RuleEntry::ScaledFloat {
                loc, scalar_loc, ..
            } => Some((
                loc.min(scalar_loc) - 1,
                (loc - 1 + 4).max(scalar_loc - 1 + 2),
            )),
            RuleEntry::Index { .. } | RuleEntry::Copy { .. } => None,
        }
    }
}

/// Zero-based `[start, end)` byte window of the trace header a rule set needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub start: usize,
    pub end: usize,
}

impl Extent {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ColumnCounts {
    long: usize,
    short: usize,
    float: usize,
    index: usize,
    copy: usize,
}

impl ColumnCounts {
    fn slot(&mut self, kind: RuleKind) -> &mut usize {
        match kind {
            RuleKind::Long => &mut self.long,
            RuleKind::Short => &mut self.short,
            RuleKind::Float => &mut self.float,
            RuleKind::Index => &mut self.index,
            RuleKind::Copy => &mut self.copy,
        }
    }
}

/// Schema mapping attributes to trace header encodings.
#[derive(Debug, Clone)]
pub struct Rule {
    entries: BTreeMap<Meta, RuleEntry>,
    counts: ColumnCounts,
    full: bool,
    extent: OnceCell<Extent>,
}

impl Rule {
    /// Empty rule set. In `full` mode the extent is always the whole trace header.
    #[must_use]
    pub fn new(full: bool) -> Self {
        Self {
            entries: BTreeMap::new(),
            counts: ColumnCounts::default(),
            full,
            extent: OnceCell::new(),
        }
    }

    /// Rule set holding the conventional SEG-Y defaults (see [`Meta::DEFAULTS`]).
    #[must_use]
    pub fn with_defaults(full: bool) -> Self {
        let mut rule = Self::new(full);
        for meta in Meta::DEFAULTS {
            rule.insert(meta, meta.default_encoding());
        }
        rule
    }

    /// Rule set holding the default encodings of `metas`.
    #[must_use]
    pub fn from_metas(metas: &[Meta], full: bool) -> Self {
        let mut rule = Self::new(full);
        for &meta in metas {
            rule.insert(meta, meta.default_encoding());
        }
        rule
    }

    /// Register `meta` with its catalogue encoding.
    pub fn add_default(&mut self, meta: Meta) {
        self.insert(meta, meta.default_encoding());
    }

    /// Register `meta` with an explicit catalogue encoding.
    pub fn add_rule(&mut self, meta: Meta, encoding: Encoding) {
        self.insert(meta, encoding);
    }

    pub fn add_long(&mut self, meta: Meta, loc: usize) -> Result<()> {
        check_location(meta, loc, 4)?;
        self.place(meta, RuleKind::Long, |num| RuleEntry::Long { num, loc });
        Ok(())
    }

    pub fn add_short(&mut self, meta: Meta, loc: usize) -> Result<()> {
        check_location(meta, loc, 2)?;
        self.place(meta, RuleKind::Short, |num| RuleEntry::Short { num, loc });
        Ok(())
    }

    pub fn add_scaled_float(&mut self, meta: Meta, loc: usize, scalar_loc: usize) -> Result<()> {
        check_location(meta, loc, 4)?;
        check_location(meta, scalar_loc, 2)?;
        self.place(meta, RuleKind::Float, |num| RuleEntry::ScaledFloat {
            num,
            loc,
            scalar_loc,
        });
        Ok(())
    }

    pub fn add_index(&mut self, meta: Meta) {
        self.place(meta, RuleKind::Index, |num| RuleEntry::Index { num });
    }

    /// Buffer the whole trace header verbatim alongside the modelled fields.
    pub fn add_copy(&mut self) {
        self.place(Meta::Copy, RuleKind::Copy, |num| RuleEntry::Copy { num });
    }

    fn insert(&mut self, meta: Meta, encoding: Encoding) {
        match encoding {
            Encoding::Long(loc) => {
                let loc = loc.loc();
                self.place(meta, RuleKind::Long, |num| RuleEntry::Long { num, loc });
            }
            Encoding::Short(loc) => {
                let loc = loc.loc();
                self.place(meta, RuleKind::Short, |num| RuleEntry::Short { num, loc });
            }
            Encoding::ScaledFloat { loc, scalar } => {
                let (loc, scalar_loc) = (loc.loc(), scalar.loc());
                self.place(meta, RuleKind::Float, |num| RuleEntry::ScaledFloat {
                    num,
                    loc,
                    scalar_loc,
                });
            }
            Encoding::Index => self.add_index(meta),
            Encoding::Copy => self.add_copy(),
        }
    }

    fn place(&mut self, meta: Meta, kind: RuleKind, build: impl FnOnce(usize) -> RuleEntry) {
        self.remove_rule(meta);
        let slot = self.counts.slot(kind);
        let entry = build(*slot);
        *slot += 1;
        self.entries.insert(meta, entry);
        self.invalidate();
    }

    /// Remove the entry for `meta`. Absent attributes are ignored.
    pub fn remove_rule(&mut self, meta: Meta) {
        let Some(removed) = self.entries.remove(&meta) else {
            return;
        };
        let kind = removed.kind();
        for entry in self.entries.values_mut() {
            if entry.kind() == kind && entry.num() > removed.num() {
                let num = entry.num();
                entry.set_num(num - 1);
            }
        }
        *self.counts.slot(kind) -= 1;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if !self.full {
            self.extent = OnceCell::new();
        }
    }

    /// Entry for `meta`, failing with [`SegyError::RuleNotFound`] when absent.
    pub fn entry(&self, meta: Meta) -> Result<&RuleEntry> {
        self.entries
            .get(&meta)
            .ok_or(SegyError::RuleNotFound { meta })
    }

    #[must_use]
    pub fn get(&self, meta: Meta) -> Option<&RuleEntry> {
        self.entries.get(&meta)
    }

    #[must_use]
    pub fn contains(&self, meta: Meta) -> bool {
        self.entries.contains_key(&meta)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Meta, &RuleEntry)> {
        self.entries.iter().map(|(meta, entry)| (*meta, entry))
    }

    /// Byte window of the trace header this rule set reads and writes.
    pub fn extent(&self) -> Extent {
        *self.extent.get_or_init(|| self.compute_extent())
    }

    fn compute_extent(&self) -> Extent {
        if self.full || self.counts.copy > 0 {
            return Extent {
                start: 0,
                end: TRACE_HEADER_SIZE,
            };
        }
        let mut spans = self.entries.values().filter_map(RuleEntry::span);
        let Some(first) = spans.next() else {
            return Extent::default();
        };
        let (start, end) = spans.fold(first, |(lo, hi), (s, e)| (lo.min(s), hi.max(e)));
        Extent { start, end }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full
    }

    #[must_use]
    pub fn num_long(&self) -> usize {
        self.counts.long
    }

    #[must_use]
    pub fn num_short(&self) -> usize {
        self.counts.short
    }

    #[must_use]
    pub fn num_float(&self) -> usize {
        self.counts.float
    }

    #[must_use]
    pub fn num_index(&self) -> usize {
        self.counts.index
    }

    #[must_use]
    pub fn num_copy(&self) -> usize {
        self.counts.copy
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate heap and inline footprint of the rule set itself.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.entries.len() * (size_of::<Meta>() + size_of::<RuleEntry>())
    }

    /// Bytes one record of a [`crate::Param`] block built on this rule set occupies.
    #[must_use]
    pub fn per_record_memory(&self) -> usize {
        let copy = if self.counts.copy > 0 {
            TRACE_HEADER_SIZE
        } else {
            0
        };
        self.counts.long * size_of::<i64>()
            + self.counts.short * size_of::<i16>()
            + self.counts.float * size_of::<f64>()
            + self.counts.index * size_of::<u64>()
            + copy
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::with_defaults(true)
    }
}

fn check_location(meta: Meta, loc: usize, width: usize) -> Result<()> {
    if loc == 0 || loc - 1 + width > TRACE_HEADER_SIZE {
        return Err(SegyError::Config {
            reason: format!(
                "{meta:?}: a {width}-byte field at byte {loc} does not fit in the trace header"
            ),
        });
    }
    Ok(())
}
