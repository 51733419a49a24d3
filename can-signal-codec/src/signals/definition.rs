//! Static signal metadata
//!
//! A [`SignalDefinition`] is what an external database loader hands to the
//! codec: layout, numeric kind, scaling, enumeration and multiplexing. It is
//! serde-friendly so definitions can come straight out of a config file.

use crate::bit_codec::{ByteOrder, MAX_NUMERIC_BITS};
use crate::types::{CodecError, Result, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Multiplexing role of a signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxKind {
    /// Always present in the frame
    #[default]
    NotMultiplexed,
    /// Carries the selector value other signals are switched by
    Multiplexor,
    /// Present when the multiplexor equals `mux_value`
    Multiplexed,
    /// Present when the multiplexor falls in one of the extended mux ranges
    ExtendedMultiplexor,
}

impl fmt::Display for MuxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxKind::NotMultiplexed => write!(f, ""),
            MuxKind::Multiplexor => write!(f, "Multiplexor"),
            MuxKind::Multiplexed => write!(f, "Multiplexed"),
            MuxKind::ExtendedMultiplexor => write!(f, "Extended Multiplexor"),
        }
    }
}

/// Extended multiplexing: selection by inclusive value ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedMux {
    /// Name of the governing multiplexor signal
    pub multiplexor: String,
    /// Inclusive `(low, high)` ranges in declaration order
    #[serde(default)]
    pub ranges: Vec<(u64, u64)>,
}

impl ExtendedMux {
    pub fn new(multiplexor: impl Into<String>) -> Self {
        Self {
            multiplexor: multiplexor.into(),
            ranges: Vec::new(),
        }
    }

    /// Builder method: append an inclusive range
    pub fn with_range(mut self, low: u64, high: u64) -> Self {
        self.ranges.push((low, high));
        self
    }

    /// Closed-interval containment test.
    ///
    /// Ranges may overlap. The first range in declaration order that
    /// contains `value` decides the match; overlaps are not reported.
    pub fn in_range(&self, value: u64) -> bool {
        self.ranges
            .iter()
            .any(|&(low, high)| low <= value && value <= high)
    }
}

/// Attribute value types, passed through without interpretation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    String(String),
    /// One of a fixed set of named choices
    Enumerate { value: String, choices: Vec<String> },
}

/// Opaque named metadata attached to a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// CAN ID of the frame that carries this signal
    #[serde(default)]
    pub message_id: u32,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub bit_start: usize,
    /// Length in bits
    pub bit_length: usize,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub value_kind: ValueKind,
    #[serde(default)]
    pub mux: MuxKind,
    /// Selector value for `MuxKind::Multiplexed`
    #[serde(default)]
    pub mux_value: u64,
    /// Range selection for `MuxKind::ExtendedMultiplexor`
    #[serde(default)]
    pub extended_mux: Option<ExtendedMux>,
    /// Scale factor to convert raw value to physical value
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Offset to add after scaling
    #[serde(default)]
    pub offset: f64,
    /// Minimum physical value
    #[serde(default)]
    pub min: f64,
    /// Maximum physical value
    #[serde(default)]
    pub max: f64,
    /// Value table for enum-like values (raw_value -> description)
    #[serde(default, with = "enum_table")]
    pub enums: BTreeMap<i64, String>,
    /// Receiving ECU names
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

fn default_scale() -> f64 {
    1.0
}

/// Enumeration tables keep integer keys in memory but text keys on disk,
/// since TOML and JSON object keys are always strings.
mod enum_table {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        table: &BTreeMap<i64, String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(table.iter().map(|(key, label)| (key.to_string(), label)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<i64, String>, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, label)| {
                key.trim()
                    .parse::<i64>()
                    .map(|key| (key, label))
                    .map_err(|_| D::Error::custom(format!("enumeration key '{}' is not an integer", key)))
            })
            .collect()
    }
}

impl SignalDefinition {
    /// Create an unscaled, non-multiplexed, little-endian signed signal
    pub fn new(name: impl Into<String>, bit_start: usize, bit_length: usize) -> Self {
        Self {
            name: name.into(),
            unit: None,
            comment: None,
            message_id: 0,
            bit_start,
            bit_length,
            byte_order: ByteOrder::default(),
            value_kind: ValueKind::default(),
            mux: MuxKind::default(),
            mux_value: 0,
            extended_mux: None,
            scale: default_scale(),
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            enums: BTreeMap::new(),
            receivers: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Builder method: set the byte order
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Builder method: set the numeric encoding
    pub fn with_value_kind(mut self, value_kind: ValueKind) -> Self {
        self.value_kind = value_kind;
        self
    }

    /// Builder method: set scale and offset
    pub fn with_scaling(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Builder method: set the physical range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_message_id(mut self, message_id: u32) -> Self {
        self.message_id = message_id;
        self
    }

    /// Builder method: add an enumeration label
    pub fn with_enum(mut self, key: i64, label: impl Into<String>) -> Self {
        self.enums.insert(key, label.into());
        self
    }

    /// Builder method: mark this signal as the frame's multiplexor
    pub fn as_multiplexor(mut self) -> Self {
        self.mux = MuxKind::Multiplexor;
        self
    }

    /// Builder method: select this signal on an exact multiplexor value
    pub fn multiplexed_by(mut self, mux_value: u64) -> Self {
        self.mux = MuxKind::Multiplexed;
        self.mux_value = mux_value;
        self
    }

    /// Builder method: select this signal on multiplexor value ranges
    pub fn extended_multiplexed_by(mut self, extended_mux: ExtendedMux) -> Self {
        self.mux = MuxKind::ExtendedMultiplexor;
        self.extended_mux = Some(extended_mux);
        self
    }

    /// Check that the multiplex role, numeric kind and length agree.
    ///
    /// Whether the field fits a given frame is only known at decode time.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(CodecError::InvalidSignalDefinition(format!(
                "'{}': {}",
                self.name, reason
            )))
        };

        if self.bit_length == 0 {
            return invalid("bit length is zero");
        }
        match self.value_kind {
            ValueKind::Float if self.bit_length != 32 => {
                return invalid("float signals must be 32 bits")
            }
            ValueKind::Double if self.bit_length != 64 => {
                return invalid("double signals must be 64 bits")
            }
            ValueKind::Signed if self.bit_length > MAX_NUMERIC_BITS => {
                return invalid("signed signals are limited to 64 bits")
            }
            ValueKind::Unsigned
                if self.bit_length > MAX_NUMERIC_BITS
                    && (self.bit_start % 8 != 0 || self.bit_length % 8 != 0) =>
            {
                return invalid("array signals must be byte aligned")
            }
            _ => {}
        }
        match (self.mux, &self.extended_mux) {
            (MuxKind::ExtendedMultiplexor, None) => {
                invalid("extended multiplexed signal has no range data")
            }
            (MuxKind::ExtendedMultiplexor, Some(_)) | (_, None) => Ok(()),
            (_, Some(_)) => invalid("range data on a signal that is not extended multiplexed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_mux_inclusive_bounds() {
        let mux = ExtendedMux::new("Mode").with_range(2, 4);
        assert!(!mux.in_range(1));
        assert!(mux.in_range(2));
        assert!(mux.in_range(4));
        assert!(!mux.in_range(5));
    }

    #[test]
    fn test_extended_mux_overlapping_ranges_are_allowed() {
        let mux = ExtendedMux::new("Mode").with_range(0, 10).with_range(5, 6);
        assert!(mux.in_range(5));
        assert!(mux.in_range(10));
        assert!(!mux.in_range(11));
    }

    #[test]
    fn test_builder() {
        let def = SignalDefinition::new("EngineSpeed", 0, 16)
            .with_value_kind(ValueKind::Unsigned)
            .with_scaling(0.25, 0.0)
            .with_unit("rpm")
            .multiplexed_by(3);

        assert_eq!(def.scale, 0.25);
        assert_eq!(def.mux, MuxKind::Multiplexed);
        assert_eq!(def.mux_value, 3);
        assert_eq!(def.unit.as_deref(), Some("rpm"));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_definitions() {
        let def = SignalDefinition::new("Temp", 0, 16).with_value_kind(ValueKind::Double);
        assert!(def.validate().is_err());

        let mut def = SignalDefinition::new("Mode", 0, 8);
        def.mux = MuxKind::ExtendedMultiplexor;
        assert!(def.validate().is_err());

        let mut def = SignalDefinition::new("Plain", 0, 8);
        def.extended_mux = Some(ExtendedMux::new("Mode"));
        assert!(def.validate().is_err());

        let def = SignalDefinition::new("Vin", 3, 136).with_value_kind(ValueKind::Unsigned);
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{ "name": "Speed", "bit_start": 8, "bit_length": 12 }"#;
        let def: SignalDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.scale, 1.0);
        assert_eq!(def.byte_order, ByteOrder::LittleEndian);
        assert_eq!(def.value_kind, ValueKind::Signed);
        assert_eq!(def.mux, MuxKind::NotMultiplexed);
    }

    #[test]
    fn test_enum_table_uses_text_keys() {
        let def = SignalDefinition::new("Gear", 0, 4)
            .with_enum(-1, "Fault")
            .with_enum(1, "Drive");
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains(r#""enums":{"-1":"Fault","1":"Drive"}"#));

        let back: SignalDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.enums.get(&-1).map(String::as_str), Some("Fault"));

        let bad = r#"{ "name": "G", "bit_start": 0, "bit_length": 4, "enums": { "x": "y" } }"#;
        assert!(serde_json::from_str::<SignalDefinition>(bad).is_err());
    }

    #[test]
    fn test_attribute_values_deserialize_by_shape() {
        let json = r#"[
            { "name": "StartValue", "value": 3 },
            { "name": "Factor", "value": 0.5 },
            { "name": "Comment", "value": "text" },
            { "name": "SendType", "value": { "value": "Cyclic", "choices": ["Cyclic", "OnChange"] } }
        ]"#;
        let attributes: Vec<Attribute> = serde_json::from_str(json).unwrap();
        assert_eq!(attributes[0].value, AttributeValue::Integer(3));
        assert_eq!(attributes[1].value, AttributeValue::Float(0.5));
        assert_eq!(attributes[2].value, AttributeValue::String("text".to_string()));
        assert_eq!(
            attributes[3].value,
            AttributeValue::Enumerate {
                value: "Cyclic".to_string(),
                choices: vec!["Cyclic".to_string(), "OnChange".to_string()],
            }
        );
    }
}
