use std::ops::{BitAnd, Shl, Shr};

use num::Integer;

/// Make an n_bits-long mask (all ones)
pub fn mask<T>(n_bits: T) -> T
where
    T: Integer + Shl<Output = T>,
{
    (T::one() << n_bits) - T::one()
}

/// Obtain value[end:start] (verilog notation) from value
pub fn extract_field<T>(value: T, end: T, start: T) -> T
where
    T: Copy + Integer + Shl<Output = T> + Shr<Output = T> + BitAnd<Output = T>,
{
    mask(end - start + T::one()) & (value >> start)
}

pub fn interpret_u32_as_signed(value: u32) -> i32 {
    i32::from_ne_bytes(value.to_ne_bytes())
}

pub fn interpret_i32_as_unsigned(value: i32) -> u32 {
    u32::from_ne_bytes(value.to_ne_bytes())
}

/// Take an unsigned value (u8, u16 or u32), and a bit position for the
/// sign bit, and copy the value of the sign bit into all the higher bits
/// of the u32.
pub fn sign_extend<T: Into<u32>>(value: T, sign_bit_position: u32) -> u32 {
    let value: u32 = value.into();
    let sign_bit = 1 & (value >> sign_bit_position);
    if sign_bit == 1 {
        let sign_extension = 0xffff_ffff - mask(sign_bit_position);
        value | sign_extension
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_mask() {
        assert_eq!(mask(7u32), 0x7f);
        assert_eq!(mask(3u32), 0b111);
        assert_eq!(mask(12u32), 0xfff);
    }

    #[test]
    fn check_extract_field() {
        assert_eq!(extract_field(0xdead_beefu32, 15, 8), 0xbe);
        assert_eq!(extract_field(0xdead_beefu32, 31, 28), 0xd);
        assert_eq!(extract_field(0xdead_beefu32, 3, 0), 0xf);
    }

    #[test]
    fn check_sign_extend_negative() {
        assert_eq!(sign_extend(0x800u32, 11), 0xffff_f800);
        assert_eq!(sign_extend(0xffu8, 7), 0xffff_ffff);
    }

    #[test]
    fn check_sign_extend_positive() {
        assert_eq!(sign_extend(0x7ffu32, 11), 0x7ff);
        assert_eq!(sign_extend(0x7fu8, 7), 0x7f);
    }

    #[test]
    fn check_reinterpret_round_trip() {
        assert_eq!(interpret_u32_as_signed(0xffff_ffff), -1);
        assert_eq!(interpret_i32_as_unsigned(-1), 0xffff_ffff);
        assert_eq!(interpret_i32_as_unsigned(i32::MIN), 0x8000_0000);
    }
}
