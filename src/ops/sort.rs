//! Distributed sort of trace parameters by neighbour exchange.
//!
//! Each rank sorts its records, then repeatedly trades a boundary region with
//! both neighbours. The two ranks at a boundary merge the same pair of regions
//! with the same comparator, so they agree on which half each keeps. Rounds
//! stop once no rank took in a record from a neighbour.
//!
//! The comparator must be a strict total order; the built-in [`SortType`]s end
//! with the global trace number to guarantee it.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::comm::{Collective, CollectiveExt};
use crate::constants::SORT_MIN_LOCAL;
use crate::error::{Result, SegyError};
use crate::file::ReadSegy;
use crate::log::Layer;
use crate::meta::Meta;
use crate::param::{Param, ParamRows};
use crate::piol::Piol;
use crate::rule::Rule;

/// Ordering of two records of one block.
pub type Compare<'a> = &'a dyn Fn(&Param, usize, usize) -> Ordering;

/// Built-in trace orderings.
///
/// `Off` is the source-receiver distance computed from the coordinates, `ROff`
/// the offset recorded in the trace header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortType {
    SrcRcv,
    SrcOff,
    SrcROff,
    RcvOff,
    RcvROff,
    LineOff,
    LineROff,
    OffLine,
    ROffLine,
}

const COORDS: [Meta; 4] = [Meta::XSrc, Meta::YSrc, Meta::XRcv, Meta::YRcv];

fn value(prm: &Param, index: usize, meta: Meta) -> f64 {
    debug_assert!(prm.rule().contains(meta), "sort key {meta:?} missing from the rule");
    prm.get::<f64>(index, meta).unwrap_or_default()
}

fn computed_offset(prm: &Param, index: usize) -> f64 {
    let dx = value(prm, index, Meta::XSrc) - value(prm, index, Meta::XRcv);
    let dy = value(prm, index, Meta::YSrc) - value(prm, index, Meta::YRcv);
    dx.hypot(dy)
}

impl SortType {
    /// Attributes read to evaluate the ordering, besides `Meta::Gtn`.
    #[must_use]
    pub fn metas(self) -> Vec<Meta> {
        let mut metas = match self {
            Self::SrcRcv | Self::SrcOff | Self::RcvOff => COORDS.to_vec(),
            Self::SrcROff => vec![Meta::XSrc, Meta::YSrc, Meta::Offset],
            Self::RcvROff => vec![Meta::XRcv, Meta::YRcv, Meta::Offset],
            Self::LineOff | Self::OffLine => {
                let mut metas = vec![Meta::Il, Meta::Xl];
                metas.extend(COORDS);
                metas
            }
            Self::LineROff | Self::ROffLine => vec![Meta::Il, Meta::Xl, Meta::Offset],
        };
        metas.push(Meta::Gtn);
        metas
    }

    /// Minimal rule set holding the sort keys.
    #[must_use]
    pub fn rule(self) -> Rule {
        Rule::from_metas(&self.metas(), false)
    }

    fn keys(self, prm: &Param, i: usize) -> [f64; 4] {
        let v = |meta| value(prm, i, meta);
        match self {
            Self::SrcRcv => [v(Meta::XSrc), v(Meta::YSrc), v(Meta::XRcv), v(Meta::YRcv)],
            Self::SrcOff => [v(Meta::XSrc), v(Meta::YSrc), computed_offset(prm, i), 0.0],
            Self::SrcROff => [v(Meta::XSrc), v(Meta::YSrc), v(Meta::Offset), 0.0],
            Self::RcvOff => [v(Meta::XRcv), v(Meta::YRcv), computed_offset(prm, i), 0.0],
            Self::RcvROff => [v(Meta::XRcv), v(Meta::YRcv), v(Meta::Offset), 0.0],
            Self::LineOff => [v(Meta::Il), v(Meta::Xl), computed_offset(prm, i), 0.0],
            Self::LineROff => [v(Meta::Il), v(Meta::Xl), v(Meta::Offset), 0.0],
            Self::OffLine => [computed_offset(prm, i), v(Meta::Il), v(Meta::Xl), 0.0],
            Self::ROffLine => [v(Meta::Offset), v(Meta::Il), v(Meta::Xl), 0.0],
        }
    }

    /// Compare records `a` and `b`, falling back to the global trace number.
    #[must_use]
    pub fn compare(self, prm: &Param, a: usize, b: usize) -> Ordering {
        let (ka, kb) = (self.keys(prm, a), self.keys(prm, b));
        ka.iter()
            .zip(&kb)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| by_trace_number(prm, a, b))
    }
}

fn by_trace_number(prm: &Param, a: usize, b: usize) -> Ordering {
    debug_assert!(prm.rule().contains(Meta::Gtn), "trace number missing from the rule");
    let gtn = |i| prm.get::<u64>(i, Meta::Gtn).unwrap_or_default();
    gtn(a).cmp(&gtn(b))
}

fn sorted_order(prm: &Param, compare: Compare<'_>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..prm.size()).collect();
    order.sort_by(|&a, &b| compare(prm, a, b));
    order
}

fn sort_local(prm: &Param, compare: Compare<'_>) -> Result<Param> {
    prm.select(&sorted_order(prm, compare))
}

fn span(start: usize, end: usize) -> Vec<usize> {
    (start..end).collect()
}

/// Globally sort `block` across ranks, keeping every rank's record count.
fn neighbour_sort(comm: &dyn Collective, block: &Param, compare: Compare<'_>) -> Result<Param> {
    let mut work = sort_local(block, compare)?;
    let num_rank = comm.num_rank();
    if num_rank == 1 {
        return Ok(work);
    }
    let min_local = comm.min(block.size() as u64)? as usize;
    if min_local < SORT_MIN_LOCAL {
        return Err(SegyError::InsufficientData {
            min_local,
            required: SORT_MIN_LOCAL,
        });
    }

    let rank = comm.rank();
    let region = min_local / 2;
    let mut rounds = 0_usize;
    loop {
        rounds += 1;
        let size = work.size();
        let to_left = if rank > 0 {
            work.rows(0, region)?
        } else {
            ParamRows::default()
        };
        let to_right = if rank + 1 < num_rank {
            work.rows(size - region, size)?
        } else {
            ParamRows::default()
        };
        let (from_left, from_right) = comm.exchange(&to_left, &to_right)?;

        let mut changed = false;
        let mut low = work.select(&span(0, region))?;
        let mut high = work.select(&span(size - region, size))?;
        if let Some(rows) = from_right {
            let theirs = Param::from_rows(Arc::clone(work.rule()), rows)?;
            let merged = high.concat(&theirs)?;
            let order = sorted_order(&merged, compare);
            changed |= order[..region].iter().any(|&i| i >= region);
            high = merged.select(&order[..region])?;
        }
        if let Some(rows) = from_left {
            let theirs = Param::from_rows(Arc::clone(work.rule()), rows)?;
            let merged = theirs.concat(&low)?;
            let order = sorted_order(&merged, compare);
            changed |= order[region..].iter().any(|&i| i < region);
            low = merged.select(&order[region..])?;
        }
        if changed {
            let middle = work.select(&span(region, size - region))?;
            work = sort_local(&low.concat(&middle)?.concat(&high)?, compare)?;
        }
        if !comm.any(changed)? {
            break;
        }
    }
    tracing::debug!(rank, rounds, region, "neighbour sort converged");
    Ok(work)
}

/// Sort the records of `prm` across all ranks. Collective.
///
/// `Meta::Gtn` of each record must hold its position in the input
/// distribution. With `file_order` the result gives, for each local input
/// record, its position in the sorted order. Otherwise it gives, for each
/// local slot of the sorted order, the input position of the record there.
///
/// With more than one rank every rank must hold at least three records, or
/// [`SegyError::InsufficientData`] is returned on every rank.
pub fn sort(piol: &Piol, prm: &Param, compare: Compare<'_>, file_order: bool) -> Result<Vec<usize>> {
    let comm = piol.comm();
    prm.rule().entry(Meta::Gtn)?;
    let offset = comm.offset(prm.size())?;

    let sorted = neighbour_sort(comm, prm, compare).map_err(|err| report(piol, err))?;
    if !file_order {
        return (0..sorted.size())
            .map(|i| sorted.get::<usize>(i, Meta::Gtn))
            .collect();
    }

    // Route each record's sorted position back to the rank holding its input
    // slot by sorting (input position, sorted position) pairs on the former.
    let mut rule = Rule::new(false);
    rule.add_index(Meta::Gtn);
    rule.add_index(Meta::Ltn);
    let mut pairs = Param::new(Arc::new(rule), sorted.size());
    for i in 0..sorted.size() {
        pairs.set(i, Meta::Gtn, sorted.get::<u64>(i, Meta::Gtn)?)?;
        pairs.set(i, Meta::Ltn, offset + i)?;
    }
    let routed = neighbour_sort(comm, &pairs, &by_trace_number).map_err(|err| report(piol, err))?;
    (0..routed.size())
        .map(|i| routed.get::<usize>(i, Meta::Ltn))
        .collect()
}

fn report(piol: &Piol, err: SegyError) -> SegyError {
    if matches!(err, SegyError::InsufficientData { .. }) {
        piol.warn(Layer::Ops, err.to_string());
        err
    } else {
        piol.fail(Layer::Ops, err)
    }
}

/// Sort traces `[offset, offset + size)` of `store` by `sort_type`. Collective.
pub fn sort_file(
    piol: &Piol,
    store: &mut ReadSegy,
    offset: usize,
    size: usize,
    sort_type: SortType,
    file_order: bool,
) -> Result<Vec<usize>> {
    let mut prm = Param::new(Arc::new(sort_type.rule()), size);
    store.read_param(offset, size, &mut prm, 0)?;
    sort(piol, &prm, &|p, a, b| sort_type.compare(p, a, b), file_order)
}

/// Whether the whole file is ordered by `sort_type`, given each rank's shard. Collective.
pub fn check_order(
    piol: &Piol,
    store: &mut ReadSegy,
    offset: usize,
    size: usize,
    sort_type: SortType,
) -> Result<bool> {
    let with_next = size > 0 && offset + size < store.read_nt();
    let count = size + usize::from(with_next);
    let mut prm = Param::new(Arc::new(sort_type.rule()), count);
    store.read_param(offset, count, &mut prm, 0)?;
    let ordered = (1..count).all(|i| sort_type.compare(&prm, i - 1, i) != Ordering::Greater);
    let disordered = piol.comm().any(!ordered).map_err(|err| piol.fail(Layer::Comm, err))?;
    Ok(!disordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalCluster;
    use crate::config::PiolConfig;
    use crate::ops::decompose;

    fn key_rule() -> Arc<Rule> {
        let mut rule = Rule::new(false);
        rule.add_default(Meta::Il);
        rule.add_index(Meta::Gtn);
        Arc::new(rule)
    }

    fn by_il(prm: &Param, a: usize, b: usize) -> Ordering {
        let il = |i| prm.get::<i64>(i, Meta::Il).unwrap_or_default();
        il(a).cmp(&il(b)).then_with(|| by_trace_number(prm, a, b))
    }

    /// Keys for the whole dataset, deterministic per seed.
    fn dataset(total: usize, seed: u64) -> Vec<i64> {
        let mut rng = fastrand::Rng::with_seed(seed);
        (0..total).map(|_| rng.i64(0..50)).collect()
    }

    fn shard(keys: &[i64], offset: usize, size: usize) -> Param {
        let mut prm = Param::new(key_rule(), size);
        for i in 0..size {
            prm.set(i, Meta::Il, keys[offset + i]).unwrap();
            prm.set(i, Meta::Gtn, offset + i).unwrap();
        }
        prm
    }

    /// Sorted position of every input record, computed on one process.
    fn expected_positions(keys: &[i64]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&i| (keys[i], i));
        let mut position = vec![0; keys.len()];
        for (p, &i) in order.iter().enumerate() {
            position[i] = p;
        }
        position
    }

    fn run_sort(keys: &[i64], sizes: &[usize], file_order: bool) -> Vec<Result<Vec<usize>>> {
        let offsets: Vec<usize> = sizes
            .iter()
            .scan(0, |acc, &s| {
                let o = *acc;
                *acc += s;
                Some(o)
            })
            .collect();
        LocalCluster::run(sizes.len(), |comm| {
            let rank = comm.rank();
            let piol = Piol::new(Arc::new(comm), PiolConfig::default());
            let prm = shard(keys, offsets[rank], sizes[rank]);
            sort(&piol, &prm, &by_il, file_order)
        }).expect("cluster")
    }

    #[test]
    fn file_order_matches_a_serial_sort() {
        let keys = dataset(40, 11);
        let sizes: Vec<usize> = (0..4).map(|r| decompose(40, 4, r).1).collect();
        let result: Vec<usize> = run_sort(&keys, &sizes, true)
            .into_iter()
            .flat_map(|r| r.expect("sort"))
            .collect();
        assert_eq!(result, expected_positions(&keys));
    }

    #[test]
    fn sorted_order_lists_input_positions() {
        let keys = dataset(30, 3);
        let sizes: Vec<usize> = (0..3).map(|r| decompose(30, 3, r).1).collect();
        let result: Vec<usize> = run_sort(&keys, &sizes, false)
            .into_iter()
            .flat_map(|r| r.expect("sort"))
            .collect();
        let mut expected: Vec<usize> = (0..keys.len()).collect();
        expected.sort_by_key(|&i| (keys[i], i));
        assert_eq!(result, expected);
    }

    #[test]
    fn skewed_shards_and_reversed_input_converge() {
        let keys: Vec<i64> = (0..60).rev().collect();
        let sizes = [3, 40, 3, 14];
        let result: Vec<usize> = run_sort(&keys, &sizes, true)
            .into_iter()
            .flat_map(|r| r.expect("sort"))
            .collect();
        assert_eq!(result, expected_positions(&keys));
    }

    #[test]
    fn tiny_shard_is_reported_on_every_rank() {
        let keys = dataset(20, 5);
        for result in run_sort(&keys, &[9, 2, 9], true) {
            assert!(matches!(
                result,
                Err(SegyError::InsufficientData {
                    min_local: 2,
                    required: 3
                })
            ));
        }
    }

    #[test]
    fn single_rank_sorts_any_size() {
        let piol = Piol::serial();
        let keys = vec![5, 1];
        let prm = shard(&keys, 0, 2);
        assert_eq!(sort(&piol, &prm, &by_il, true).expect("sort"), vec![1, 0]);
        assert!(!piol.is_err());
    }

    #[test]
    fn sort_types_chain_keys_then_trace_number() {
        let rule = Arc::new(SortType::LineROff.rule());
        let mut prm = Param::new(rule, 3);
        for (i, (il, xl, off)) in [(5, 2, 300), (5, 2, 100), (5, 1, 900)].into_iter().enumerate() {
            prm.set(i, Meta::Il, il as i64).unwrap();
            prm.set(i, Meta::Xl, xl as i64).unwrap();
            prm.set(i, Meta::Offset, off as i64).unwrap();
            prm.set(i, Meta::Gtn, i).unwrap();
        }
        assert_eq!(sorted_order(&prm, &|p, a, b| SortType::LineROff.compare(p, a, b)), vec![2, 1, 0]);
        assert_eq!(
            sorted_order(&prm, &|p, a, b| SortType::ROffLine.compare(p, a, b)),
            vec![1, 0, 2]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "sort key Offset missing")]
    fn comparing_without_a_key_in_the_rule_panics() {
        let mut rule = Rule::new(false);
        rule.add_default(Meta::Il);
        rule.add_default(Meta::Xl);
        rule.add_index(Meta::Gtn);
        let prm = Param::new(Arc::new(rule), 2);
        let _ = SortType::LineROff.compare(&prm, 0, 1);
    }

    #[test]
    fn computed_offset_uses_both_coordinates() {
        let rule = Arc::new(SortType::SrcOff.rule());
        let mut prm = Param::new(rule, 1);
        prm.set(0, Meta::XRcv, 3.0).unwrap();
        prm.set(0, Meta::YRcv, 4.0).unwrap();
        assert_eq!(computed_offset(&prm, 0), 5.0);
    }
}
