//! Encoder configuration.

use crate::model::{LC_MAX, LP_MAX, LzmaProperties, MATCH_LEN_MAX, PB_MAX};
use sluice_core::error::{Result, SluiceError};

/// Highest compression level.
pub const LEVEL_MAX: u32 = 9;

/// Smallest accepted dictionary size (4 KiB).
pub const DICT_SIZE_MIN: u32 = 1 << 12;

/// Largest accepted dictionary size (1.5 GiB).
pub const DICT_SIZE_MAX: u32 = 3 << 29;

/// Shortest accepted nice length.
pub const NICE_LEN_MIN: u32 = 5;

/// Longest accepted nice length.
pub const NICE_LEN_MAX: u32 = MATCH_LEN_MAX as u32;

/// Dictionary size used by [`LzmaParams::preset`] for each level.
const PRESET_DICT_SIZES: [u32; 10] = [
    1 << 16, // 64 KB
    1 << 18, // 256 KB
    1 << 19, // 512 KB
    1 << 20, // 1 MB
    1 << 21, // 2 MB
    1 << 22, // 4 MB
    1 << 23, // 8 MB
    1 << 24, // 16 MB
    1 << 25, // 32 MB
    1 << 26, // 64 MB
];

/// LZMA encoder parameters.
///
/// The defaults are a fast, small-window setup: 64 KiB dictionary, nice
/// length 128, lc/lp/pb 3/0/2. Use [`LzmaParams::preset`] for the
/// level-driven dictionary sizes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaParams {
    /// Compression level (0-9); controls match finder effort.
    pub level: u32,
    /// Dictionary size in bytes.
    pub dict_size: u32,
    /// Literal context bits (0-8).
    pub lc: u32,
    /// Literal position bits (0-4).
    pub lp: u32,
    /// Position bits (0-4).
    pub pb: u32,
    /// Match length at which the match finder stops searching.
    pub nice_len: u32,
    /// Terminate the payload with an end marker.
    pub end_marker: bool,
}

impl Default for LzmaParams {
    fn default() -> Self {
        Self {
            level: 5,
            dict_size: 1 << 16,
            lc: 3,
            lp: 0,
            pb: 2,
            nice_len: 128,
            end_marker: false,
        }
    }
}

impl LzmaParams {
    /// Parameters for a compression level.
    pub fn preset(level: u32) -> Result<Self> {
        if level > LEVEL_MAX {
            return Err(SluiceError::invalid_parameters(format!(
                "compression level {level} is above {LEVEL_MAX}"
            )));
        }

        let nice_len = match level {
            0..=2 => 32,
            3..=5 => 64,
            _ => 128,
        };

        Ok(Self {
            level,
            dict_size: PRESET_DICT_SIZES[level as usize],
            nice_len,
            ..Self::default()
        })
    }

    /// Set the compression level, keeping the other parameters.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Set the dictionary size.
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size;
        self
    }

    /// Set the literal context, literal position and position bits.
    pub fn with_lc_lp_pb(mut self, lc: u32, lp: u32, pb: u32) -> Self {
        self.lc = lc;
        self.lp = lp;
        self.pb = pb;
        self
    }

    /// Set the nice length.
    pub fn with_nice_len(mut self, nice_len: u32) -> Self {
        self.nice_len = nice_len;
        self
    }

    /// Terminate the payload with an end marker.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }

    /// Check every field against its accepted range.
    pub fn validate(&self) -> Result<()> {
        if self.level > LEVEL_MAX {
            return Err(SluiceError::invalid_parameters(format!(
                "compression level {} is above {LEVEL_MAX}",
                self.level
            )));
        }
        if !(DICT_SIZE_MIN..=DICT_SIZE_MAX).contains(&self.dict_size) {
            return Err(SluiceError::invalid_parameters(format!(
                "dictionary size {} is outside {DICT_SIZE_MIN}..={DICT_SIZE_MAX}",
                self.dict_size
            )));
        }
        if self.lc > LC_MAX || self.lp > LP_MAX || self.pb > PB_MAX {
            return Err(SluiceError::invalid_parameters(format!(
                "lc/lp/pb {}/{}/{} exceed {LC_MAX}/{LP_MAX}/{PB_MAX}",
                self.lc, self.lp, self.pb
            )));
        }
        if !(NICE_LEN_MIN..=NICE_LEN_MAX).contains(&self.nice_len) {
            return Err(SluiceError::invalid_parameters(format!(
                "nice length {} is outside {NICE_LEN_MIN}..={NICE_LEN_MAX}",
                self.nice_len
            )));
        }
        Ok(())
    }

    /// Literal/position bit settings.
    pub fn lzma_properties(&self) -> LzmaProperties {
        LzmaProperties::new(self.lc, self.lp, self.pb)
    }

    /// The 5-byte parameter block written at the front of the stream.
    pub fn properties(&self) -> [u8; 5] {
        let dict = self.dict_size.to_le_bytes();
        [
            self.lzma_properties().to_byte(),
            dict[0],
            dict[1],
            dict[2],
            dict[3],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = LzmaParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.properties(), [0x5D, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_presets() {
        assert_eq!(LzmaParams::preset(0).unwrap().dict_size, 1 << 16);
        assert_eq!(LzmaParams::preset(6).unwrap().dict_size, 1 << 23);
        assert_eq!(LzmaParams::preset(9).unwrap().dict_size, 1 << 26);
        for level in 0..=LEVEL_MAX {
            assert!(LzmaParams::preset(level).unwrap().validate().is_ok());
        }
        assert!(LzmaParams::preset(10).is_err());
    }

    #[test]
    fn test_validate_rejects() {
        let base = LzmaParams::default();
        let bad = [
            base.with_level(10),
            base.with_dict_size(DICT_SIZE_MIN - 1),
            base.with_dict_size(DICT_SIZE_MAX + 1),
            base.with_lc_lp_pb(9, 0, 2),
            base.with_lc_lp_pb(3, 5, 2),
            base.with_lc_lp_pb(3, 0, 5),
            base.with_nice_len(4),
            base.with_nice_len(274),
        ];
        for params in bad {
            let err = params.validate().unwrap_err();
            assert!(
                matches!(err, SluiceError::InvalidParameters { .. }),
                "{params:?}"
            );
        }
    }

    #[test]
    fn test_bounds_accepted() {
        let params = LzmaParams::default()
            .with_dict_size(DICT_SIZE_MAX)
            .with_lc_lp_pb(8, 4, 4)
            .with_nice_len(NICE_LEN_MAX);
        assert!(params.validate().is_ok());
        assert_eq!(params.properties()[0], ((4 * 5 + 4) * 9 + 8) as u8);
    }
}
