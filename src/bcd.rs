//! Packed binary-coded-decimal helpers.
//!
//! Every supported RTC stores its calendar fields as two BCD digits per
//! byte: the tens digit in bits 7..4 and the units digit in bits 3..0.

/// Packs a decimal value (0-99) into one BCD byte.
///
/// Values above 99 are not rejected; the tens digit simply spills past
/// bit 7 and wraps, so callers must range-check first.
#[inline]
pub const fn encode(value: u8) -> u8 {
    ((value / 10) << 4).wrapping_add(value % 10)
}

/// Unpacks one BCD byte into its decimal value.
///
/// Flag bits sharing the register must be masked off before calling this.
#[inline]
pub const fn decode(byte: u8) -> u8 {
    (byte >> 4) * 10 + (byte & 0x0F)
}

/// Unpacks one BCD byte, or `None` if either nibble is above 9.
#[inline]
pub const fn decode_checked(byte: u8) -> Option<u8> {
    if byte >> 4 > 9 || byte & 0x0F > 9 {
        None
    } else {
        Some(decode(byte))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(0), 0x00);
        assert_eq!(encode(9), 0x09);
        assert_eq!(encode(10), 0x10);
        assert_eq!(encode(45), 0x45);
        assert_eq!(encode(59), 0x59);
        assert_eq!(encode(99), 0x99);
    }

    #[test]
    fn test_decode_known_values() {
        assert_eq!(decode(0x00), 0);
        assert_eq!(decode(0x07), 7);
        assert_eq!(decode(0x23), 23);
        assert_eq!(decode(0x99), 99);
    }

    #[test]
    fn test_decode_checked_rejects_non_decimal_nibbles() {
        assert_eq!(decode_checked(0x59), Some(59));
        assert_eq!(decode_checked(0x00), Some(0));
        assert_eq!(decode_checked(0x4A), None);
        assert_eq!(decode_checked(0xFA), None);
        assert_eq!(decode_checked(0xA0), None);
    }

    #[test]
    fn test_roundtrip_all_decimal_values() {
        for v in 0..=99u8 {
            assert_eq!(decode(encode(v)), v, "BCD roundtrip failed for {}", v);
        }
    }

    #[test]
    fn test_out_of_range_does_not_panic() {
        // 123 -> tens 12 spills past the nibble; only needs to be deterministic
        assert_eq!(encode(123), 0xC3);
        assert_eq!(encode(255), 0x95);
    }
}
