//! Core types for the CAN signal codec
//!
//! This module defines the error type, the raw frame handed in by an external
//! transport layer, and the tagged value that a signal caches after each
//! decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the codec
pub type Timestamp = DateTime<Utc>;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Convert nanoseconds since 1970 into a UTC timestamp.
///
/// Returns `None` when the value does not fit chrono's representable range.
pub fn timestamp_from_ns(ns1970: u64) -> Option<Timestamp> {
    let secs = (ns1970 / 1_000_000_000) as i64;
    let nsecs = (ns1970 % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nsecs)
}

/// Raw CAN frame as delivered by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// Timestamp in nanoseconds since epoch
    pub timestamp_ns: u64,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Frame data bytes (0-8 bytes for classic CAN, up to 64 for CAN-FD)
    pub data: Vec<u8>,
}

impl CanFrame {
    pub fn new(can_id: u32, data: Vec<u8>, timestamp_ns: u64) -> Self {
        Self {
            timestamp_ns,
            can_id,
            data,
        }
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Option<Timestamp> {
        timestamp_from_ns(self.timestamp_ns)
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors reported by the codec
///
/// None of these are fatal: layout errors come back from the bit codec,
/// validity errors from the read accessors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid bit length {length} (allowed 1..={max})")]
    BitLength { length: usize, max: usize },

    #[error("Bit field start {start} length {length} exceeds a {bytes} byte buffer")]
    OutOfBounds {
        start: usize,
        length: usize,
        bytes: usize,
    },

    #[error("{kind} value requires {expected} bits, got {length}")]
    EncodingMismatch {
        kind: ValueKind,
        expected: usize,
        length: usize,
    },

    #[error("Text field start {start} length {length} is not byte aligned")]
    Unaligned { start: usize, length: usize },

    #[error("Signal '{0}' has no valid sample")]
    InvalidSample(String),

    #[error("Value {value} does not fit in {target}")]
    Narrowing { value: String, target: &'static str },

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),
}

/// Numeric encoding of a signal's bit field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Two's-complement integer
    #[default]
    Signed,
    /// Plain unsigned integer (or a raw byte array above 64 bits)
    Unsigned,
    /// IEEE-754 single precision, always 32 bits
    Float,
    /// IEEE-754 double precision, always 64 bits
    Double,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Signed => write!(f, "Signed"),
            ValueKind::Unsigned => write!(f, "Unsigned"),
            ValueKind::Float => write!(f, "Float"),
            ValueKind::Double => write!(f, "Double"),
        }
    }
}

/// A decoded channel value
///
/// Exactly one variant is meaningful per signal, selected by its
/// [`ValueKind`]. `Float` carries both single and double precision data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl SignalValue {
    /// The zero value for a given value kind
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Signed => SignalValue::Signed(0),
            ValueKind::Unsigned => SignalValue::Unsigned(0),
            ValueKind::Float | ValueKind::Double => SignalValue::Float(0.0),
        }
    }

    /// Widen to f64. Byte arrays have no numeric meaning and yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Signed(v) => Some(*v as f64),
            SignalValue::Unsigned(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Bytes(_) => None,
        }
    }

    /// Integer key used for enumeration lookups
    pub fn as_enum_key(&self) -> Option<i64> {
        match self {
            SignalValue::Signed(v) => Some(*v),
            SignalValue::Unsigned(v) => i64::try_from(*v).ok(),
            SignalValue::Float(_) | SignalValue::Bytes(_) => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Signed(v) => write!(f, "{}", v),
            SignalValue::Unsigned(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{}", v),
            SignalValue::Bytes(bytes) => {
                let text: String = bytes
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                write!(f, "{}", text)
            }
        }
    }
}

/// Explicit, fallible conversion from a cached channel value into the
/// numeric type a caller asks for.
///
/// Integer targets reject values they cannot hold instead of wrapping.
/// Float sources truncate toward zero when read as an integer and are
/// rejected when non-finite or out of range. Integer-to-float and
/// `f64`-to-`f32` conversions round to the nearest representable value.
pub trait FromChannel: Sized {
    fn from_i64(value: i64) -> Result<Self>;
    fn from_u64(value: u64) -> Result<Self>;
    fn from_f64(value: f64) -> Result<Self>;

    fn from_signal_value(value: &SignalValue) -> Result<Self> {
        match value {
            SignalValue::Signed(v) => Self::from_i64(*v),
            SignalValue::Unsigned(v) => Self::from_u64(*v),
            SignalValue::Float(v) => Self::from_f64(*v),
            SignalValue::Bytes(_) => Err(CodecError::Narrowing {
                value: "byte array".to_string(),
                target: std::any::type_name::<Self>(),
            }),
        }
    }
}

fn narrowing<T>(value: impl fmt::Display) -> CodecError {
    CodecError::Narrowing {
        value: value.to_string(),
        target: std::any::type_name::<T>(),
    }
}

macro_rules! impl_from_channel_int {
    ($($t:ty),*) => {$(
        impl FromChannel for $t {
            fn from_i64(value: i64) -> Result<Self> {
                <$t>::try_from(value).map_err(|_| narrowing::<$t>(value))
            }

            fn from_u64(value: u64) -> Result<Self> {
                <$t>::try_from(value).map_err(|_| narrowing::<$t>(value))
            }

            fn from_f64(value: f64) -> Result<Self> {
                let truncated = value.trunc();
                // i64/u64 MAX are not exactly representable; compare against 2^bits
                if !truncated.is_finite()
                    || truncated < <$t>::MIN as f64
                    || truncated >= (<$t>::MAX as f64) + 1.0
                {
                    return Err(narrowing::<$t>(value));
                }
                Ok(truncated as $t)
            }
        }
    )*};
}

impl_from_channel_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromChannel for f64 {
    fn from_i64(value: i64) -> Result<Self> {
        Ok(value as f64)
    }

    fn from_u64(value: u64) -> Result<Self> {
        Ok(value as f64)
    }

    fn from_f64(value: f64) -> Result<Self> {
        Ok(value)
    }
}

impl FromChannel for f32 {
    fn from_i64(value: i64) -> Result<Self> {
        Ok(value as f32)
    }

    fn from_u64(value: u64) -> Result<Self> {
        Ok(value as f32)
    }

    fn from_f64(value: f64) -> Result<Self> {
        if value.is_finite() && value.abs() > f32::MAX as f64 {
            return Err(narrowing::<f32>(value));
        }
        Ok(value as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_value_zero_matches_kind() {
        assert_eq!(SignalValue::zero(ValueKind::Signed), SignalValue::Signed(0));
        assert_eq!(SignalValue::zero(ValueKind::Unsigned), SignalValue::Unsigned(0));
        assert_eq!(SignalValue::zero(ValueKind::Double), SignalValue::Float(0.0));
    }

    #[test]
    fn test_signal_value_display() {
        assert_eq!(format!("{}", SignalValue::Signed(-42)), "-42");
        assert_eq!(format!("{}", SignalValue::Float(2.5)), "2.5");
        assert_eq!(format!("{}", SignalValue::Bytes(b"VIN\0\0".to_vec())), "VIN");
    }

    #[test]
    fn test_integer_narrowing_does_not_wrap() {
        assert_eq!(u8::from_u64(255), Ok(255));
        assert!(u8::from_u64(256).is_err());
        assert!(u32::from_i64(-1).is_err());
        assert_eq!(i16::from_i64(-32768), Ok(-32768));
    }

    #[test]
    fn test_float_to_integer_narrowing() {
        assert_eq!(i32::from_f64(-12.9), Ok(-12));
        assert!(u8::from_f64(-1.0).is_err());
        assert!(i64::from_f64(f64::NAN).is_err());
        assert!(u64::from_f64(1.0e20).is_err());
        assert!(f32::from_f64(1.0e300).is_err());
    }

    #[test]
    fn test_bytes_are_not_numeric() {
        let value = SignalValue::Bytes(vec![1, 2]);
        assert!(f64::from_signal_value(&value).is_err());
        assert_eq!(value.as_f64(), None);
    }

    #[test]
    fn test_frame_timestamp() {
        let frame = CanFrame::new(0x123, vec![0; 8], 1_500_000_000);
        let ts = frame.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1);
        assert_eq!(ts.timestamp_subsec_nanos(), 500_000_000);
        assert_eq!(frame.dlc(), 8);
    }
}
