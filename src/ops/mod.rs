//! Collective operations over distributed trace parameters.

mod decomp;
pub mod gather;
mod minmax;
pub mod sort;

pub use decomp::decompose;
pub use gather::{GatherDist, GatherInfo, gathers};
pub use minmax::{CoordElem, min_max};
pub(crate) use minmax::combine as combine_min_max;
pub use sort::{SortType, check_order, sort, sort_file};
