//! Block I/O beneath the trace stores.

mod driver;

pub use driver::{BlockIo, FileDriver, FileMode};
