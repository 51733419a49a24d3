//! Bit-level field codec
//!
//! Extracts and packs bit fields inside a frame payload. The codec knows
//! nothing about signals: it only sees a buffer, a start bit, a length and
//! a byte order.
//!
//! Bit addressing uses the DBC convention: bit `n` is bit `n % 8` (LSB = 0)
//! of byte `n / 8`.
//!
//! - Little-endian (Intel): `bit_start` is the field LSB; field bits move
//!   upward through the byte and continue at bit 0 of the next byte.
//! - Big-endian (Motorola): `bit_start` is the field MSB; field bits move
//!   downward through the byte and continue at bit 7 of the next byte.

use crate::types::{CodecError, Result, ValueKind};
use serde::{Deserialize, Serialize};

/// Widest field that can be read as a number
pub const MAX_NUMERIC_BITS: usize = 64;

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    #[default]
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// One field bit mapped onto the buffer
#[derive(Debug, Clone, Copy)]
struct FieldBit {
    byte_idx: usize,
    bit_in_byte: usize,
    /// Weight of this bit in the assembled value (0 = LSB)
    value_bit: usize,
}

/// Walks every bit of a field in buffer order.
///
/// The walk is only meaningful after [`check_bounds`] succeeded.
fn field_bits(bit_start: usize, bit_length: usize, order: ByteOrder) -> impl Iterator<Item = FieldBit> {
    let mut byte_idx = bit_start / 8;
    let mut bit_in_byte = bit_start % 8;

    (0..bit_length).map(move |i| match order {
        ByteOrder::LittleEndian => {
            let bit_pos = bit_start + i;
            FieldBit {
                byte_idx: bit_pos / 8,
                bit_in_byte: bit_pos % 8,
                value_bit: i,
            }
        }
        ByteOrder::BigEndian => {
            let bit = FieldBit {
                byte_idx,
                bit_in_byte,
                value_bit: bit_length - 1 - i,
            };
            if bit_in_byte == 0 {
                byte_idx += 1;
                bit_in_byte = 7;
            } else {
                bit_in_byte -= 1;
            }
            bit
        }
    })
}

/// Index of the last byte touched by a field
fn last_byte(bit_start: usize, bit_length: usize, order: ByteOrder) -> usize {
    match order {
        ByteOrder::LittleEndian => (bit_start + bit_length - 1) / 8,
        ByteOrder::BigEndian => {
            // Bits available in the first byte, counting down from bit_start
            let first = bit_start % 8 + 1;
            if bit_length <= first {
                bit_start / 8
            } else {
                bit_start / 8 + (bit_length - first).div_ceil(8)
            }
        }
    }
}

/// Reject empty fields and fields that leave the buffer
fn check_bounds(buffer_len: usize, bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<()> {
    let out_of_bounds = || CodecError::OutOfBounds {
        start: bit_start,
        length: bit_length,
        bytes: buffer_len,
    };

    if bit_length == 0 {
        return Err(out_of_bounds());
    }
    bit_start.checked_add(bit_length).ok_or_else(out_of_bounds)?;
    if last_byte(bit_start, bit_length, order) >= buffer_len {
        return Err(out_of_bounds());
    }
    Ok(())
}

fn check_numeric(buffer_len: usize, bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<()> {
    if bit_length == 0 || bit_length > MAX_NUMERIC_BITS {
        return Err(CodecError::BitLength {
            length: bit_length,
            max: MAX_NUMERIC_BITS,
        });
    }
    check_bounds(buffer_len, bit_start, bit_length, order)
}

fn check_float(kind: ValueKind, expected: usize, bit_length: usize) -> Result<()> {
    if bit_length != expected {
        return Err(CodecError::EncodingMismatch {
            kind,
            expected,
            length: bit_length,
        });
    }
    Ok(())
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}

/// Extract an unsigned field of 1..=64 bits
pub fn extract_unsigned(buffer: &[u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<u64> {
    check_numeric(buffer.len(), bit_start, bit_length, order)?;

    let mut result: u64 = 0;
    for bit in field_bits(bit_start, bit_length, order) {
        let bit_value = (buffer[bit.byte_idx] >> bit.bit_in_byte) & 0x01;
        result |= (bit_value as u64) << bit.value_bit;
    }
    Ok(result)
}

/// Extract a two's-complement field of 1..=64 bits
pub fn extract_signed(buffer: &[u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<i64> {
    let raw = extract_unsigned(buffer, bit_start, bit_length, order)?;
    Ok(sign_extend(raw, bit_length))
}

/// Extract an IEEE-754 single; the field must be exactly 32 bits
pub fn extract_f32(buffer: &[u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<f32> {
    check_float(ValueKind::Float, 32, bit_length)?;
    let raw = extract_unsigned(buffer, bit_start, bit_length, order)?;
    Ok(f32::from_bits(raw as u32))
}

/// Extract an IEEE-754 double; the field must be exactly 64 bits
pub fn extract_f64(buffer: &[u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<f64> {
    check_float(ValueKind::Double, 64, bit_length)?;
    let raw = extract_unsigned(buffer, bit_start, bit_length, order)?;
    Ok(f64::from_bits(raw))
}

/// Write the low `bit_length` bits of `value` into the field.
///
/// Bits outside the field are left untouched.
pub fn pack_unsigned(
    value: u64,
    buffer: &mut [u8],
    bit_start: usize,
    bit_length: usize,
    order: ByteOrder,
) -> Result<()> {
    check_numeric(buffer.len(), bit_start, bit_length, order)?;

    for bit in field_bits(bit_start, bit_length, order) {
        let mask = 1u8 << bit.bit_in_byte;
        if (value >> bit.value_bit) & 0x01 != 0 {
            buffer[bit.byte_idx] |= mask;
        } else {
            buffer[bit.byte_idx] &= !mask;
        }
    }
    Ok(())
}

/// Write a two's-complement value truncated to `bit_length` bits
pub fn pack_signed(
    value: i64,
    buffer: &mut [u8],
    bit_start: usize,
    bit_length: usize,
    order: ByteOrder,
) -> Result<()> {
    pack_unsigned(value as u64, buffer, bit_start, bit_length, order)
}

pub fn pack_f32(
    value: f32,
    buffer: &mut [u8],
    bit_start: usize,
    bit_length: usize,
    order: ByteOrder,
) -> Result<()> {
    check_float(ValueKind::Float, 32, bit_length)?;
    pack_unsigned(value.to_bits() as u64, buffer, bit_start, bit_length, order)
}

pub fn pack_f64(
    value: f64,
    buffer: &mut [u8],
    bit_start: usize,
    bit_length: usize,
    order: ByteOrder,
) -> Result<()> {
    check_float(ValueKind::Double, 64, bit_length)?;
    pack_unsigned(value.to_bits(), buffer, bit_start, bit_length, order)
}

/// Set every bit of the field to 1 (the "not available" pattern)
pub fn set_all_bits(buffer: &mut [u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<()> {
    check_bounds(buffer.len(), bit_start, bit_length, order)?;
    for bit in field_bits(bit_start, bit_length, order) {
        buffer[bit.byte_idx] |= 1u8 << bit.bit_in_byte;
    }
    Ok(())
}

/// True if every bit of the field is 1
pub fn is_all_bits_set(buffer: &[u8], bit_start: usize, bit_length: usize, order: ByteOrder) -> Result<bool> {
    check_bounds(buffer.len(), bit_start, bit_length, order)?;
    Ok(field_bits(bit_start, bit_length, order)
        .all(|bit| (buffer[bit.byte_idx] >> bit.bit_in_byte) & 0x01 != 0))
}

/// Copy a byte-aligned run out of the buffer (array and string fields)
pub fn decode_text(buffer: &[u8], bit_start: usize, bit_length: usize) -> Result<Vec<u8>> {
    if bit_start % 8 != 0 || bit_length % 8 != 0 {
        return Err(CodecError::Unaligned {
            start: bit_start,
            length: bit_length,
        });
    }
    check_bounds(buffer.len(), bit_start, bit_length, ByteOrder::LittleEndian)?;

    let first = bit_start / 8;
    Ok(buffer[first..first + bit_length / 8].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::ByteOrder::{BigEndian, LittleEndian};

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_unsigned(&data, 0, 8, LittleEndian), Ok(0xAB));
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_unsigned(&data, 0, 16, LittleEndian), Ok(0xCDAB));
        // Nibble straddling bytes 0 and 1
        assert_eq!(extract_unsigned(&data, 4, 8, LittleEndian), Ok(0xDA));
    }

    #[test]
    fn test_extract_big_endian_simple() {
        // Signal: 8 bits with MSB at bit 7 (byte 0)
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_unsigned(&data, 7, 8, BigEndian), Ok(0xAB));
    }

    #[test]
    fn test_extract_big_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(extract_unsigned(&data, 7, 16, BigEndian), Ok(0xABCD));
        // 12 bits: low nibble of byte 0 then all of byte 1
        assert_eq!(extract_unsigned(&data, 3, 12, BigEndian), Ok(0xBCD));
    }

    #[test]
    fn test_orders_are_distinct_walks() {
        let data = vec![0x01, 0x80];
        // LE 16 at bit 0 = 0x8001, BE 16 with MSB at bit 7 = 0x0180
        assert_eq!(extract_unsigned(&data, 0, 16, LittleEndian), Ok(0x8001));
        assert_eq!(extract_unsigned(&data, 7, 16, BigEndian), Ok(0x0180));
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x8000, 16), -32768);
        assert_eq!(sign_extend(1, 1), -1);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_bit_length_limits() {
        let data = [0u8; 16];
        assert!(matches!(
            extract_unsigned(&data, 0, 0, LittleEndian),
            Err(CodecError::BitLength { length: 0, .. })
        ));
        assert!(matches!(
            extract_unsigned(&data, 0, 65, LittleEndian),
            Err(CodecError::BitLength { length: 65, .. })
        ));
        assert!(extract_unsigned(&data, 0, 64, LittleEndian).is_ok());
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let data = [0xFFu8; 2];
        assert!(matches!(
            extract_unsigned(&data, 9, 8, LittleEndian),
            Err(CodecError::OutOfBounds { .. })
        ));
        assert!(extract_unsigned(&data, 8, 8, LittleEndian).is_ok());
        // BE field with MSB at bit 15 walks into byte 2
        assert!(extract_unsigned(&data, 15, 9, BigEndian).is_err());
        assert!(extract_unsigned(&data, 7, 16, BigEndian).is_ok());
        assert!(extract_unsigned(&data, usize::MAX, 8, LittleEndian).is_err());
    }

    #[test]
    fn test_float_lengths() {
        let data = 1.5f32.to_bits().to_le_bytes();
        assert_eq!(extract_f32(&data, 0, 32, LittleEndian), Ok(1.5));
        assert!(matches!(
            extract_f32(&data, 0, 16, LittleEndian),
            Err(CodecError::EncodingMismatch { expected: 32, .. })
        ));

        let data = (-2.25f64).to_bits().to_be_bytes();
        assert_eq!(extract_f64(&data, 7, 64, BigEndian), Ok(-2.25));
        assert!(extract_f64(&data, 7, 32, BigEndian).is_err());
    }

    #[test]
    fn test_pack_leaves_neighbours_untouched() {
        let mut data = [0xFFu8; 3];
        pack_unsigned(0, &mut data, 4, 8, LittleEndian).unwrap();
        assert_eq!(data, [0x0F, 0xF0, 0xFF]);

        let mut data = [0x00u8; 3];
        pack_unsigned(0xABC, &mut data, 3, 12, BigEndian).unwrap();
        assert_eq!(data, [0x0A, 0xBC, 0x00]);
    }

    #[test]
    fn test_pack_truncates_to_field_width() {
        let mut data = [0u8; 2];
        pack_unsigned(0x1FF, &mut data, 0, 8, LittleEndian).unwrap();
        assert_eq!(data, [0xFF, 0x00]);

        pack_signed(-1, &mut data, 8, 4, LittleEndian).unwrap();
        assert_eq!(data, [0xFF, 0x0F]);
    }

    #[test]
    fn test_pack_float_roundtrip() {
        let mut data = [0u8; 8];
        pack_f32(-3.75, &mut data, 16, 32, LittleEndian).unwrap();
        assert_eq!(extract_f32(&data, 16, 32, LittleEndian), Ok(-3.75));
        assert!(pack_f32(1.0, &mut data, 0, 31, LittleEndian).is_err());

        pack_f64(1.0e-3, &mut data, 7, 64, BigEndian).unwrap();
        assert_eq!(extract_f64(&data, 7, 64, BigEndian), Ok(1.0e-3));
    }

    #[test]
    fn test_all_bits_set() {
        for order in [LittleEndian, BigEndian] {
            let mut data = [0u8; 4];
            set_all_bits(&mut data, 6, 11, order).unwrap();
            assert_eq!(is_all_bits_set(&data, 6, 11, order), Ok(true));

            for bit in field_bits(6, 11, order) {
                let mut flipped = data;
                flipped[bit.byte_idx] ^= 1 << bit.bit_in_byte;
                assert_eq!(is_all_bits_set(&flipped, 6, 11, order), Ok(false));
            }
        }
    }

    #[test]
    fn test_huge_field_length_is_out_of_bounds() {
        for order in [LittleEndian, BigEndian] {
            let mut data = [0u8; 2];
            assert!(matches!(
                set_all_bits(&mut data, 0, usize::MAX, order),
                Err(CodecError::OutOfBounds { .. })
            ));
            assert!(matches!(
                is_all_bits_set(&data, 7, usize::MAX - 7, order),
                Err(CodecError::OutOfBounds { .. })
            ));
            assert_eq!(data, [0, 0]);
        }
    }

    #[test]
    fn test_decode_text() {
        let data = b"\x01HELLO\x00\x00";
        assert_eq!(decode_text(data, 8, 40).unwrap(), b"HELLO".to_vec());
        assert!(matches!(decode_text(data, 4, 40), Err(CodecError::Unaligned { .. })));
        assert!(matches!(decode_text(data, 8, 64), Err(CodecError::OutOfBounds { .. })));
        assert!(decode_text(data, 0, 0).is_err());
    }
}
