//! The 3600-byte SEG-Y file header: free text followed by the binary header.

use crate::codec::{read_i16, write_i16};
use crate::constants::{
    BH_EXTENSIONS, BH_FIXED_TRACE, BH_FORMAT, BH_INTERVAL, BH_NS, BH_SEGY_REVISION, BH_SORT,
    BH_UNITS, FILE_HEADER_SIZE, FORMAT_IEEE, TEXT_HEADER_SIZE,
};
use crate::error::{Result, SegyError};

/// SEG-Y revision 1.0, stored as major byte then minor byte.
const REVISION_1: i16 = 0x0100;

/// Fields of the binary file header this crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryHeader {
    /// Sample interval in microseconds.
    pub interval_us: u16,
    pub ns: u16,
    pub format: i16,
    pub sort: i16,
    pub units: i16,
    pub revision: i16,
    pub fixed_trace: i16,
    pub extensions: i16,
}

impl Default for BinaryHeader {
    fn default() -> Self {
        Self {
            interval_us: 0,
            ns: 0,
            format: FORMAT_IEEE,
            sort: 0,
            units: 0,
            revision: REVISION_1,
            fixed_trace: 1,
            extensions: 0,
        }
    }
}

fn check_len(len: usize) -> Result<()> {
    if len < FILE_HEADER_SIZE {
        return Err(SegyError::InvalidHeader {
            reason: format!("file header needs {FILE_HEADER_SIZE} bytes, got {len}"),
        });
    }
    Ok(())
}

impl BinaryHeader {
    /// Decode from a buffer holding the whole file header.
    pub fn decode(file_header: &[u8]) -> Result<Self> {
        check_len(file_header.len())?;
        let field = |loc: usize| read_i16(file_header, loc - 1);
        Ok(Self {
            interval_us: field(BH_INTERVAL) as u16,
            ns: field(BH_NS) as u16,
            format: field(BH_FORMAT),
            sort: field(BH_SORT),
            units: field(BH_UNITS),
            revision: field(BH_SEGY_REVISION),
            fixed_trace: field(BH_FIXED_TRACE),
            extensions: field(BH_EXTENSIONS),
        })
    }

    /// Encode into a buffer holding the whole file header. Other bytes are untouched.
    pub fn encode(&self, file_header: &mut [u8]) -> Result<()> {
        check_len(file_header.len())?;
        let mut field = |loc: usize, value: i16| write_i16(file_header, loc - 1, value);
        field(BH_INTERVAL, self.interval_us as i16);
        field(BH_NS, self.ns as i16);
        field(BH_FORMAT, self.format);
        field(BH_SORT, self.sort);
        field(BH_UNITS, self.units);
        field(BH_SEGY_REVISION, self.revision);
        field(BH_FIXED_TRACE, self.fixed_trace);
        field(BH_EXTENSIONS, self.extensions);
        Ok(())
    }
}

/// Text header bytes for `text`, space padded or truncated to 3200 bytes.
#[must_use]
pub fn encode_text(text: &str) -> Vec<u8> {
    let mut out = vec![b' '; TEXT_HEADER_SIZE];
    let bytes = text.as_bytes();
    let len = bytes.len().min(TEXT_HEADER_SIZE);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

#[must_use]
pub fn decode_text(bytes: &[u8]) -> String {
    let len = bytes.len().min(TEXT_HEADER_SIZE);
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_fields_land_at_their_offsets() {
        let header = BinaryHeader {
            interval_us: 4000,
            ns: 40_000,
            ..BinaryHeader::default()
        };
        let mut buf = vec![0u8; FILE_HEADER_SIZE];
        header.encode(&mut buf).expect("encode");
        assert_eq!(&buf[3216..3218], &4000_u16.to_be_bytes());
        assert_eq!(&buf[3220..3222], &40_000_u16.to_be_bytes());
        assert_eq!(&buf[3224..3226], &5_i16.to_be_bytes());
        assert_eq!(&buf[3500..3502], &[1, 0]);

        let back = BinaryHeader::decode(&buf).expect("decode");
        assert_eq!(back, header);
    }

    #[test]
    fn short_buffers_are_invalid() {
        assert!(matches!(
            BinaryHeader::decode(&[0u8; 3599]),
            Err(SegyError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn text_is_space_padded() {
        let bytes = encode_text("C 1 CLIENT");
        assert_eq!(bytes.len(), TEXT_HEADER_SIZE);
        assert_eq!(&bytes[..10], b"C 1 CLIENT");
        assert!(bytes[10..].iter().all(|&b| b == b' '));
        assert!(decode_text(&bytes).starts_with("C 1 CLIENT "));

        let long = "x".repeat(4000);
        assert_eq!(encode_text(&long).len(), TEXT_HEADER_SIZE);
    }
}
