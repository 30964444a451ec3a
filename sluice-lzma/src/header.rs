//! Fixed-size stream header.
//!
//! ```text
//! offset  size  field
//! 0       1     (pb * 5 + lp) * 9 + lc
//! 1       4     dictionary size, u32 LE
//! 5       8     original size, u64 LE (u64::MAX = unknown, end marker follows)
//! ```

use crate::model::LzmaProperties;
use sluice_core::error::{Result, SluiceError};
use sluice_core::io::read_chunk;
use std::io::Read;

/// Length of the parameter block.
pub const PROPS_SIZE: usize = 5;

/// Length of the whole header.
pub const HEADER_SIZE: usize = PROPS_SIZE + 8;

/// Original size value meaning "unknown; payload ends with an end marker".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Serialize a parameter block and original size.
pub fn encode_header(props: &[u8; PROPS_SIZE], original_size: u64) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[..PROPS_SIZE].copy_from_slice(props);
    out[PROPS_SIZE..].copy_from_slice(&original_size.to_le_bytes());
    out
}

/// Parse the first [`HEADER_SIZE`] bytes of `bytes`.
///
/// Bytes past the header are ignored.
pub fn decode_header(bytes: &[u8]) -> Result<([u8; PROPS_SIZE], u64)> {
    if bytes.len() < HEADER_SIZE {
        return Err(SluiceError::header_truncated(HEADER_SIZE, bytes.len()));
    }

    let mut props = [0u8; PROPS_SIZE];
    props.copy_from_slice(&bytes[..PROPS_SIZE]);

    let mut size = [0u8; 8];
    size.copy_from_slice(&bytes[PROPS_SIZE..HEADER_SIZE]);

    Ok((props, u64::from_le_bytes(size)))
}

/// Decoded stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Parameter block.
    pub props: [u8; PROPS_SIZE],
    /// Original (uncompressed) size.
    pub original_size: u64,
}

impl Header {
    /// Create a header.
    pub fn new(props: [u8; PROPS_SIZE], original_size: u64) -> Self {
        Self {
            props,
            original_size,
        }
    }

    /// Read exactly one header from `reader`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let n = read_chunk(reader, &mut buf)?;
        let (props, original_size) = decode_header(&buf[..n])?;
        Ok(Self::new(props, original_size))
    }

    /// Serialize.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        encode_header(&self.props, self.original_size)
    }

    /// Whether the original size is recorded.
    pub fn size_known(&self) -> bool {
        self.original_size != UNKNOWN_SIZE
    }

    /// Dictionary size from the parameter block.
    pub fn dict_size(&self) -> u32 {
        u32::from_le_bytes([self.props[1], self.props[2], self.props[3], self.props[4]])
    }

    /// lc/lp/pb from the parameter block.
    pub fn properties(&self) -> Result<LzmaProperties> {
        LzmaProperties::from_byte(self.props[0]).ok_or_else(|| {
            SluiceError::invalid_parameters(format!(
                "invalid lc/lp/pb byte 0x{:02X}",
                self.props[0]
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_zero_size_round_trip() {
        let props = [0x5D, 0, 0, 1, 0];
        let bytes = encode_header(&props, 0);
        assert_eq!(&bytes[PROPS_SIZE..], &[0u8; 8]);
        assert_eq!(decode_header(&bytes).unwrap(), (props, 0));
    }

    #[test]
    fn test_truncated() {
        let bytes = encode_header(&[0x5D, 0, 0, 1, 0], 42);
        for len in 0..HEADER_SIZE {
            let err = decode_header(&bytes[..len]).unwrap_err();
            assert!(matches!(
                err,
                SluiceError::HeaderTruncated { expected: HEADER_SIZE, found } if found == len
            ));
        }
    }

    #[test]
    fn test_read_from_leaves_payload() {
        let mut data = encode_header(&[0x5D, 0, 0, 1, 0], 200_000).to_vec();
        data.extend_from_slice(b"payload");
        let mut cursor = Cursor::new(data);

        let header = Header::read_from(&mut cursor).unwrap();
        assert_eq!(header.original_size, 200_000);
        assert_eq!(header.dict_size(), 1 << 16);
        assert!(header.size_known());
        assert_eq!(header.properties().unwrap(), LzmaProperties::new(3, 0, 2));
        assert_eq!(cursor.position(), HEADER_SIZE as u64);
    }

    #[test]
    fn test_read_from_short_source() {
        let mut cursor = Cursor::new(vec![0x5D, 0, 0]);
        let err = Header::read_from(&mut cursor).unwrap_err();
        assert!(matches!(
            err,
            SluiceError::HeaderTruncated {
                expected: HEADER_SIZE,
                found: 3
            }
        ));
    }

    #[test]
    fn test_unknown_size_and_bad_props() {
        let header = Header::new([0xFF, 0, 0, 1, 0], UNKNOWN_SIZE);
        assert!(!header.size_known());
        assert!(matches!(
            header.properties(),
            Err(SluiceError::InvalidParameters { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_header_round_trip(props in any::<[u8; PROPS_SIZE]>(), size in any::<u64>()) {
            let bytes = encode_header(&props, size);
            prop_assert_eq!(decode_header(&bytes).unwrap(), (props, size));
            prop_assert_eq!(Header::new(props, size).to_bytes(), bytes);
        }
    }
}
