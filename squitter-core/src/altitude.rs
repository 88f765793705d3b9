//! Barometric altitude from the 12-bit AC field of airborne position squitters.
//!
//! Field layout (MSB first, M bit omitted):
//! `C1 A1 C2 A2 C4 A4 B1 Q B2 D2 B4 D4`
//!
//! - Q=1: 11-bit binary count of 25 ft steps, offset -1000 ft
//! - Q=0: Gillham gray code in 100 ft steps (above 50,175 ft)

/// Decode a 12-bit AC altitude code. `None` when unavailable or invalid.
pub fn decode_ac12(code: u32) -> Option<i32> {
    let code = code & 0xFFF;
    if code == 0 {
        return None;
    }

    if code & 0x010 != 0 {
        // Drop the Q bit to get the 11-bit count
        let n = ((code >> 5) << 4) | (code & 0x0F);
        Some(n as i32 * 25 - 1000)
    } else {
        decode_gillham(code)
    }
}

/// Gray-coded 100 ft altitude (Q=0).
///
/// The 500 ft band is a gray code over D2 D4 A1 A2 A4 B1 B2 B4; the 100 ft
/// step is a reflected gray code over C1 C2 C4 that counts backwards in odd
/// 500 ft bands.
fn decode_gillham(code: u32) -> Option<i32> {
    let bit = |n: u32| (code >> n) & 1 == 1;

    let (c1, a1, c2, a2, c4, a4) = (bit(11), bit(10), bit(9), bit(8), bit(7), bit(6));
    let (b1, b2, d2, b4, d4) = (bit(5), bit(3), bit(2), bit(1), bit(0));

    if !(c1 || c2 || c4) {
        return None;
    }

    let mut one_hundreds: i32 = 0;
    for (set, mask) in [(c1, 0x7), (c2, 0x3), (c4, 0x1)] {
        if set {
            one_hundreds ^= mask;
        }
    }
    // 7 is not a legal C value; it stands in for 5
    if one_hundreds & 5 == 5 {
        one_hundreds ^= 2;
    }
    if one_hundreds > 5 {
        return None;
    }

    let mut five_hundreds: i32 = 0;
    for (set, mask) in [
        (d2, 0xFF),
        (d4, 0x7F),
        (a1, 0x3F),
        (a2, 0x1F),
        (a4, 0x0F),
        (b1, 0x07),
        (b2, 0x03),
        (b4, 0x01),
    ] {
        if set {
            five_hundreds ^= mask;
        }
    }

    if five_hundreds & 1 == 1 {
        one_hundreds = 6 - one_hundreds;
    }

    Some((five_hundreds * 5 + one_hundreds - 13) * 100)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0xC38, 38000)]
    #[case(0x010, -1000)]
    #[case(0x011, -975)]
    #[case(0x030, -600)]
    fn test_q_bit_altitudes(#[case] code: u32, #[case] expected: i32) {
        assert_eq!(decode_ac12(code), Some(expected));
    }

    #[test]
    fn test_zero_is_unavailable() {
        assert_eq!(decode_ac12(0), None);
    }

    #[rstest]
    #[case(0x080, -1200)] // C4
    #[case(0x200, -1000)] // C2
    #[case(0x800, -800)] // C1
    #[case(0x082, -300)] // C4 + B4: odd 500 ft band reverses the C count
    fn test_gillham_altitudes(#[case] code: u32, #[case] expected: i32) {
        assert_eq!(decode_ac12(code), Some(expected));
    }

    #[test]
    fn test_gillham_requires_c_bits() {
        // Only B1 set: no C bits
        assert_eq!(decode_ac12(0x020), None);
    }

    #[test]
    fn test_gillham_rejects_illegal_c() {
        // C1 + C4 -> gray 6, not a legal 100 ft step
        assert_eq!(decode_ac12(0x880), None);
    }

    #[test]
    fn test_gillham_range() {
        let mut valid = 0;
        for code in 0..0x1000u32 {
            if code & 0x010 != 0 {
                continue;
            }
            if let Some(alt) = decode_ac12(code) {
                assert!(
                    (-1200..=126_700).contains(&alt),
                    "code 0x{code:03X} gave {alt}"
                );
                valid += 1;
            }
        }
        assert!(valid > 0);
    }
}
