//! Inline/crossline gathers of a file sorted by line.
//!
//! Every rank scans its shard for runs of equal (il, xl). A run that
//! continues from the previous rank belongs to that rank, which absorbs the
//! counts of every following shard the run spills into.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::comm::{Collective, CollectiveExt};
use crate::error::Result;
use crate::file::ReadSegy;
use crate::meta::Meta;
use crate::ops::decompose;
use crate::param::Param;
use crate::piol::Piol;
use crate::rule::Rule;

/// One gather: `count` consecutive traces sharing `il` and `xl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherInfo {
    pub count: usize,
    pub il: i64,
    pub xl: i64,
    /// Global trace number of the first trace.
    pub start: usize,
}

/// This rank's share of the global gather list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherDist {
    local: Vec<GatherInfo>,
    offset: usize,
    total: usize,
}

impl GatherDist {
    /// Gathers owned by this rank.
    #[must_use]
    pub fn local(&self) -> &[GatherInfo] {
        &self.local
    }

    /// Global index of the first local gather.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of gathers over all ranks.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Gather at `index` of the global list, if this rank owns it.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&GatherInfo> {
        index
            .checked_sub(self.offset)
            .and_then(|i| self.local.get(i))
    }

    /// The whole list on every rank. Collective.
    pub fn all(&self, comm: &dyn Collective) -> Result<Vec<GatherInfo>> {
        Ok(comm.all_gather(&self.local)?.into_iter().flatten().collect())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Edge {
    first: (i64, i64, usize),
    last: (i64, i64, usize),
    runs: usize,
}

fn local_runs(prm: &Param, offset: usize) -> Result<Vec<GatherInfo>> {
    let mut runs: Vec<GatherInfo> = Vec::new();
    for i in 0..prm.size() {
        let il = prm.get::<i64>(i, Meta::Il)?;
        let xl = prm.get::<i64>(i, Meta::Xl)?;
        match runs.last_mut() {
            Some(run) if run.il == il && run.xl == xl => run.count += 1,
            _ => runs.push(GatherInfo {
                count: 1,
                il,
                xl,
                start: offset + i,
            }),
        }
    }
    Ok(runs)
}

/// Resolve runs that straddle rank boundaries. Collective.
///
/// `prm` holds the il/xl of this rank's shard, which starts at global trace
/// `offset`. Shards must be consecutive in rank order and the data sorted so
/// that equal (il, xl) are adjacent.
pub fn assemble(comm: &dyn Collective, prm: &Param, offset: usize) -> Result<GatherDist> {
    let mut runs = local_runs(prm, offset)?;
    let edge = match (runs.first(), runs.last()) {
        (Some(first), Some(last)) => Some(Edge {
            first: (first.il, first.xl, first.count),
            last: (last.il, last.xl, last.count),
            runs: runs.len(),
        }),
        _ => None,
    };
    let edges = comm.all_gather(&edge)?;
    let rank = comm.rank();

    let continues_previous = match (edges[..rank].iter().rev().flatten().next(), &edge) {
        (Some(prev), Some(mine)) => (prev.last.0, prev.last.1) == (mine.first.0, mine.first.1),
        _ => false,
    };
    if continues_previous {
        runs.remove(0);
    }

    if let Some(last) = runs.last_mut() {
        for next in edges[rank + 1..].iter().flatten() {
            if (next.first.0, next.first.1) != (last.il, last.xl) {
                break;
            }
            last.count += next.first.2;
            if next.runs > 1 {
                break;
            }
        }
    }

    let offset = comm.offset(runs.len())?;
    let total = comm.sum(runs.len() as u64)? as usize;
    tracing::debug!(rank, owned = runs.len(), offset, total, "gathers assembled");
    Ok(GatherDist {
        local: runs,
        offset,
        total,
    })
}

/// Gathers of a line-sorted file, each rank reading its block of traces. Collective.
pub fn gathers(piol: &Piol, store: &mut ReadSegy) -> Result<GatherDist> {
    let (offset, size) = decompose(store.read_nt(), piol.num_rank(), piol.rank());
    let rule = Arc::new(Rule::from_metas(&[Meta::Il, Meta::Xl], false));
    let mut prm = Param::new(rule, size);
    store.read_param(offset, size, &mut prm, 0)?;
    assemble(piol.comm(), &prm, offset)
}
