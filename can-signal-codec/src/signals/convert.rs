//! Channel ↔ engineering unit conversion

use crate::types::{CodecError, FromChannel, Result, SignalValue};
use std::collections::BTreeMap;

/// Scale/offset/enumeration semantics on top of a raw channel value
#[derive(Debug, Clone, Copy)]
pub struct EngineeringConverter<'a> {
    scale: f64,
    offset: f64,
    enums: &'a BTreeMap<i64, String>,
}

impl<'a> EngineeringConverter<'a> {
    pub fn new(scale: f64, offset: f64, enums: &'a BTreeMap<i64, String>) -> Self {
        Self {
            scale,
            offset,
            enums,
        }
    }

    /// False for enumerations and for an identity scaling, where the raw
    /// value passes through without a round trip via f64.
    pub fn needs_conversion(&self) -> bool {
        self.enums.is_empty() && !(self.scale == 1.0 && self.offset == 0.0)
    }

    /// `raw * scale + offset` in double precision, narrowed to `T`
    pub fn to_engineering<T: FromChannel>(&self, channel: &SignalValue) -> Result<T> {
        if !self.needs_conversion() {
            return T::from_signal_value(channel);
        }
        let raw = channel.as_f64().ok_or_else(|| CodecError::Narrowing {
            value: "byte array".to_string(),
            target: std::any::type_name::<T>(),
        })?;
        T::from_f64(raw * self.scale + self.offset)
    }

    /// Inverse of [`Self::to_engineering`], used when packing a frame
    ///
    /// A zero scale maps every raw value to `offset` and has no inverse.
    pub fn to_channel(&self, engineering: f64) -> Result<f64> {
        if !self.needs_conversion() {
            return Ok(engineering);
        }
        if self.scale == 0.0 {
            return Err(CodecError::Narrowing {
                value: engineering.to_string(),
                target: "channel value of a zero-scale signal",
            });
        }
        Ok((engineering - self.offset) / self.scale)
    }

    /// Label for an exact enumeration key
    pub fn lookup_enum(&self, key: i64) -> Option<&'a str> {
        self.enums.get(&key).map(String::as_str)
    }
}
