//! Program loading
//!
//! Guest programs arrive as a hex string: two ASCII digits per byte,
//! whitespace ignored, bytes written in order from a base address.
//! The whole string is validated before anything is written, so a
//! rejected program leaves the target untouched.

use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("hex program has an odd number of digits")]
    OddLength,
    #[error("invalid hex digit {0:?}")]
    InvalidDigit(char),
    #[error("program byte does not fit in memory at 0x{addr:x}")]
    DoesNotFit { addr: u32 },
}

/// Something a program can be loaded into, one byte at a time
pub trait ProgramLoadable {
    fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), LoadError>;
}

/// Decode a hex program and write it to the target starting at base.
/// Returns the number of bytes written.
pub fn load_hex(
    target: &mut impl ProgramLoadable,
    program: &str,
    base: u32,
) -> Result<u32, LoadError> {
    let digits: Vec<char> = program
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(LoadError::OddLength);
    }
    if let Some(bad) = digits.iter().find(|c| !c.is_ascii_hexdigit()) {
        return Err(LoadError::InvalidDigit(*bad));
    }

    let mut count = 0;
    for (high, low) in digits.into_iter().tuples() {
        let byte = 16 * high.to_digit(16).expect("digits were validated above")
            + low.to_digit(16).expect("digits were validated above");
        let addr = base
            .checked_add(count)
            .ok_or(LoadError::DoesNotFit { addr: u32::MAX })?;
        target.write_byte(addr, byte as u8)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct ByteMap {
        bytes: HashMap<u32, u8>,
    }

    impl ProgramLoadable for ByteMap {
        fn write_byte(&mut self, addr: u32, data: u8) -> Result<(), LoadError> {
            if addr >= 64 {
                return Err(LoadError::DoesNotFit { addr });
            }
            self.bytes.insert(addr, data);
            Ok(())
        }
    }

    #[test]
    fn check_bytes_land_in_order() {
        let mut target = ByteMap::default();
        let count = load_hex(&mut target, "b3830462", 0).unwrap();
        assert_eq!(count, 4);
        assert_eq!(target.bytes[&0], 0xb3);
        assert_eq!(target.bytes[&1], 0x83);
        assert_eq!(target.bytes[&2], 0x04);
        assert_eq!(target.bytes[&3], 0x62);
    }

    #[test]
    fn check_whitespace_is_ignored() {
        let mut target = ByteMap::default();
        let count = load_hex(&mut target, " de ad\nbe\tef\r\n", 8).unwrap();
        assert_eq!(count, 4);
        assert_eq!(target.bytes[&8], 0xde);
        assert_eq!(target.bytes[&11], 0xef);
    }

    #[test]
    fn check_mixed_case_digits() {
        let mut target = ByteMap::default();
        load_hex(&mut target, "aAbB", 0).unwrap();
        assert_eq!(target.bytes[&0], 0xaa);
        assert_eq!(target.bytes[&1], 0xbb);
    }

    #[test]
    fn check_odd_length_is_rejected_before_writing() {
        let mut target = ByteMap::default();
        assert_eq!(load_hex(&mut target, "abc", 0), Err(LoadError::OddLength));
        assert!(target.bytes.is_empty());
    }

    #[test]
    fn check_bad_digit_is_rejected_before_writing() {
        let mut target = ByteMap::default();
        assert_eq!(
            load_hex(&mut target, "abxg", 0),
            Err(LoadError::InvalidDigit('x'))
        );
        assert!(target.bytes.is_empty());
    }

    #[test]
    fn check_overflowing_program_fails() {
        let mut target = ByteMap::default();
        assert_eq!(
            load_hex(&mut target, "ffff", 63),
            Err(LoadError::DoesNotFit { addr: 64 })
        );
    }

    #[test]
    fn check_empty_program_is_fine() {
        let mut target = ByteMap::default();
        assert_eq!(load_hex(&mut target, "  \n", 0), Ok(0));
    }
}
