use serde::{Deserialize, Serialize};

use crate::comm::{Collective, CollectiveExt};
use crate::error::{Result, SegyError};
use crate::meta::Meta;
use crate::param::Param;

/// An extreme value and the global trace number where it was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordElem {
    pub val: f64,
    pub num: usize,
}

impl CoordElem {
    fn pick(self, other: Self, want: std::cmp::Ordering) -> Self {
        match other.val.total_cmp(&self.val) {
            o if o == want => other,
            std::cmp::Ordering::Equal if other.num < self.num => other,
            _ => self,
        }
    }
}

/// Fold two `[min x, max x, min y, max y]` results with the same tie rule.
pub(crate) fn combine(a: [CoordElem; 4], b: [CoordElem; 4]) -> [CoordElem; 4] {
    [
        a[0].pick(b[0], std::cmp::Ordering::Less),
        a[1].pick(b[1], std::cmp::Ordering::Greater),
        a[2].pick(b[2], std::cmp::Ordering::Less),
        a[3].pick(b[3], std::cmp::Ordering::Greater),
    ]
}

fn local_extremes(prm: &Param, offset: usize, meta: Meta) -> Result<Option<[CoordElem; 2]>> {
    let mut extremes: Option<[CoordElem; 2]> = None;
    for i in 0..prm.size() {
        let elem = CoordElem {
            val: prm.get::<f64>(i, meta)?,
            num: offset + i,
        };
        extremes = Some(match extremes {
            None => [elem, elem],
            Some([lo, hi]) => [
                lo.pick(elem, std::cmp::Ordering::Less),
                hi.pick(elem, std::cmp::Ordering::Greater),
            ],
        });
    }
    Ok(extremes)
}

/// Global minimum and maximum of two attributes. Collective.
///
/// `offset` is the global trace number of the first local record. Returns
/// `[min x, max x, min y, max y]`; ties go to the smallest trace number.
pub fn min_max(
    comm: &dyn Collective,
    offset: usize,
    prm: &Param,
    meta_x: Meta,
    meta_y: Meta,
) -> Result<[CoordElem; 4]> {
    let local = match (
        local_extremes(prm, offset, meta_x)?,
        local_extremes(prm, offset, meta_y)?,
    ) {
        (Some([x_lo, x_hi]), Some([y_lo, y_hi])) => Some([x_lo, x_hi, y_lo, y_hi]),
        _ => None,
    };

    let mut global: Option<[CoordElem; 4]> = None;
    for part in comm.all_gather(&local)?.into_iter().flatten() {
        global = Some(match global {
            None => part,
            Some(acc) => combine(acc, part),
        });
    }
    global.ok_or_else(|| SegyError::Config {
        reason: "min/max over an empty dataset".into(),
    })
}
