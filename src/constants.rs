//! SEG-Y layout constants.

/// Size of the free-text (EBCDIC/ASCII) file header.
pub const TEXT_HEADER_SIZE: usize = 3200;
/// Size of the binary file header that follows the text header.
pub const BINARY_HEADER_SIZE: usize = 400;
/// Text plus binary header.
pub const FILE_HEADER_SIZE: usize = TEXT_HEADER_SIZE + BINARY_HEADER_SIZE;
/// Size of a trace header.
pub const TRACE_HEADER_SIZE: usize = 240;
/// Bytes per trace sample (IBM or IEEE single precision).
pub const SAMPLE_SIZE: usize = 4;

// Binary file header fields, 1-based absolute byte locations.
pub const BH_INTERVAL: usize = 3217;
pub const BH_NS: usize = 3221;
pub const BH_FORMAT: usize = 3225;
pub const BH_SORT: usize = 3229;
pub const BH_UNITS: usize = 3255;
pub const BH_SEGY_REVISION: usize = 3501;
pub const BH_FIXED_TRACE: usize = 3503;
pub const BH_EXTENSIONS: usize = 3505;

/// Sample intervals are stored in microseconds.
pub const MICROSECONDS: f64 = 1e-6;

/// Largest sample count the 16-bit header field can hold.
pub const MAX_NS: usize = u16::MAX as usize;

/// Format code for IBM System/360 floats.
pub const FORMAT_IBM: i16 = 1;
/// Format code for IEEE big-endian floats.
pub const FORMAT_IEEE: i16 = 5;

/// Minimum records per rank for the neighbour-exchange sort.
pub const SORT_MIN_LOCAL: usize = 3;

/// Default memory budget for a single streaming I/O chunk.
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024 * 1024;

/// Size of a whole trace record on disk.
#[must_use]
pub const fn trace_size(ns: usize) -> usize {
    TRACE_HEADER_SIZE + ns * SAMPLE_SIZE
}

/// Absolute byte location of the start of trace `offset`.
#[must_use]
pub const fn trace_location(offset: usize, ns: usize) -> usize {
    FILE_HEADER_SIZE + offset * trace_size(ns)
}

/// Absolute byte location of the sample data of trace `offset`.
#[must_use]
pub const fn trace_data_location(offset: usize, ns: usize) -> usize {
    trace_location(offset, ns) + TRACE_HEADER_SIZE
}

/// Size of a file holding `nt` traces of `ns` samples.
#[must_use]
pub const fn file_size(nt: usize, ns: usize) -> usize {
    FILE_HEADER_SIZE + nt * trace_size(ns)
}

/// Number of whole traces that fit in a file of `size` bytes.
#[must_use]
pub const fn trace_count(size: usize, ns: usize) -> usize {
    if size <= FILE_HEADER_SIZE {
        0
    } else {
        (size - FILE_HEADER_SIZE) / trace_size(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layout_arithmetic() {
        assert_eq!(trace_size(1000), 4240);
        assert_eq!(file_size(10, 1000), 3600 + 42_400);
        assert_eq!(trace_count(file_size(10, 1000), 1000), 10);
        assert_eq!(trace_count(3600, 1000), 0);
        assert_eq!(trace_data_location(2, 10), 3600 + 2 * 280 + 240);
    }
}
