//! Bit-granular field access over Mode S frame buffers.
//!
//! Bit 0 is the most significant bit of the first byte, matching the field
//! numbering used in the Mode S / ADS-B message layouts.

use crate::types::DecodeError;

/// Widest field a single read may return.
pub const MAX_WIDTH: u32 = 32;

/// Read `width` bits starting at `start` (big-endian, MSB-first).
///
/// Fails with `OutOfRange` when the field runs past the end of `buf` or
/// `width` exceeds [`MAX_WIDTH`].
pub fn read_bits(buf: &[u8], start: usize, width: u32) -> Result<u32, DecodeError> {
    let len = buf.len() * 8;
    let end = start + width as usize;
    if width > MAX_WIDTH || end > len {
        return Err(DecodeError::OutOfRange { start, width, len });
    }

    let mut value = 0u64;
    for bit in start..end {
        let byte = buf[bit / 8];
        let b = (byte >> (7 - bit % 8)) & 1;
        value = (value << 1) | b as u64;
    }
    Ok(value as u32)
}

/// Read a single flag bit.
pub fn read_flag(buf: &[u8], bit: usize) -> Result<bool, DecodeError> {
    Ok(read_bits(buf, bit, 1)? == 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KLM: [u8; 14] = [
        0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0, 0x57, 0x60, 0x98,
    ];

    #[test]
    fn test_read_df_and_icao() {
        assert_eq!(read_bits(&KLM, 0, 5).unwrap(), 17);
        assert_eq!(read_bits(&KLM, 8, 24).unwrap(), 0x4840D6);
        assert_eq!(read_bits(&KLM, 32, 5).unwrap(), 4);
    }

    #[test]
    fn test_read_unaligned() {
        // 0x8D = 1000_1101: bits 5..8 are "101"
        assert_eq!(read_bits(&KLM, 5, 3).unwrap(), 0b101);
        // Spanning a byte boundary: last 4 bits of 0x48, first 4 of 0x40
        assert_eq!(read_bits(&KLM, 12, 8).unwrap(), 0x84);
    }

    #[test]
    fn test_read_full_width() {
        assert_eq!(read_bits(&KLM, 0, 32).unwrap(), 0x8D4840D6);
    }

    #[test]
    fn test_read_zero_width() {
        assert_eq!(read_bits(&KLM, 112, 0).unwrap(), 0);
    }

    #[test]
    fn test_read_last_bit() {
        // 0x98 = 1001_1000
        assert!(!read_flag(&KLM, 111).unwrap());
        assert!(read_flag(&KLM, 107).unwrap());
    }

    #[test]
    fn test_out_of_range() {
        let err = read_bits(&KLM, 100, 13).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfRange {
                start: 100,
                width: 13,
                len: 112
            }
        ));
        assert!(err.is_internal());
    }

    #[test]
    fn test_width_too_large() {
        assert!(read_bits(&KLM, 0, 33).is_err());
    }
}
