//! Signal instance: definition plus the last decoded sample
//!
//! A `Signal` is written by exactly one ingestion path. There is no internal
//! locking; callers that share a signal between threads must serialize
//! calls to [`Signal::parse_message`] themselves.

use crate::bit_codec::{self, MAX_NUMERIC_BITS};
use crate::signals::convert::EngineeringConverter;
use crate::signals::definition::{Attribute, ExtendedMux, MuxKind, SignalDefinition};
use crate::signals::mux;
use crate::signals::observer::{ObserverHandle, ObserverHub, SampleObserver};
use crate::types::{
    timestamp_from_ns, CodecError, FromChannel, Result, SignalValue, Timestamp, ValueKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a call to [`Signal::parse_message`] did
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// The frame does not carry this signal; nothing changed
    Skipped,
    /// A new sample was stored and observers were notified
    Updated,
    /// The field could not be extracted; the sample is now invalid
    Failed(CodecError),
}

#[derive(Debug)]
pub struct Signal {
    definition: SignalDefinition,

    /// Unscaled value of the last decode
    channel_value: SignalValue,
    channel_valid: bool,

    /// Externally controlled; gates every read
    valid: bool,
    sample_time_ns: u64,
    sample_can_id: u32,
    sample_counter: usize,

    observers: ObserverHub,
}

impl Signal {
    pub fn new(definition: SignalDefinition) -> Self {
        let channel_value = cleared_value(&definition);
        Self {
            definition,
            channel_value,
            channel_valid: false,
            valid: true,
            sample_time_ns: 0,
            sample_can_id: 0,
            sample_counter: 0,
            observers: ObserverHub::new(),
        }
    }

    pub fn definition(&self) -> &SignalDefinition {
        &self.definition
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn unit(&self) -> Option<&str> {
        self.definition.unit.as_deref()
    }

    pub fn message_id(&self) -> u32 {
        self.definition.message_id
    }

    pub fn value_kind(&self) -> ValueKind {
        self.definition.value_kind
    }

    pub fn mux(&self) -> MuxKind {
        self.definition.mux
    }

    /// Display name of the value kind, e.g. `Unsigned`
    pub fn value_kind_name(&self) -> String {
        self.definition.value_kind.to_string()
    }

    /// Display name of the multiplexing role; empty when not multiplexed
    pub fn mux_kind_name(&self) -> String {
        self.definition.mux.to_string()
    }

    pub fn is_multiplexed(&self) -> bool {
        matches!(
            self.definition.mux,
            MuxKind::Multiplexed | MuxKind::ExtendedMultiplexor
        )
    }

    pub fn enums(&self) -> &BTreeMap<i64, String> {
        &self.definition.enums
    }

    pub fn receivers(&self) -> &[String] {
        &self.definition.receivers
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.definition.attributes
    }

    /// Attach a copy of an attribute definition and return it for editing
    pub fn create_attribute(&mut self, definition: &Attribute) -> &mut Attribute {
        let attributes = &mut self.definition.attributes;
        attributes.push(definition.clone());
        let last = attributes.len() - 1;
        &mut attributes[last]
    }

    /// Extended multiplex data, created empty if the signal has none yet
    pub fn extended_mux_mut(&mut self) -> &mut ExtendedMux {
        self.definition
            .extended_mux
            .get_or_insert_with(ExtendedMux::default)
    }

    pub fn converter(&self) -> EngineeringConverter<'_> {
        EngineeringConverter::new(
            self.definition.scale,
            self.definition.offset,
            &self.definition.enums,
        )
    }

    /// Enumeration label for a raw key, `None` if the key is unmapped
    pub fn enum_label(&self, key: i64) -> Option<&str> {
        self.converter().lookup_enum(key)
    }

    /// Extract this signal's field from a payload without touching state
    pub fn decode(&self, data: &[u8]) -> Result<SignalValue> {
        let def = &self.definition;
        let (start, length, order) = (def.bit_start, def.bit_length, def.byte_order);

        let value = match def.value_kind {
            ValueKind::Signed => {
                SignalValue::Signed(bit_codec::extract_signed(data, start, length, order)?)
            }
            ValueKind::Unsigned if length > MAX_NUMERIC_BITS => {
                SignalValue::Bytes(bit_codec::decode_text(data, start, length)?)
            }
            ValueKind::Unsigned => {
                SignalValue::Unsigned(bit_codec::extract_unsigned(data, start, length, order)?)
            }
            ValueKind::Float => {
                SignalValue::Float(bit_codec::extract_f32(data, start, length, order)? as f64)
            }
            ValueKind::Double => {
                SignalValue::Float(bit_codec::extract_f64(data, start, length, order)?)
            }
        };
        Ok(value)
    }

    /// Decode a frame that carries no multiplexor context.
    ///
    /// Multiplexed signals are skipped; use
    /// [`Signal::parse_message_with_mux`] or a [`crate::Message`] for those.
    pub fn parse_message(&mut self, data: &[u8], timestamp_ns: u64, can_id: u32) -> SampleOutcome {
        self.parse_message_with_mux(data, timestamp_ns, can_id, None)
    }

    /// Decode a frame whose multiplexor has already been resolved
    pub fn parse_message_with_mux(
        &mut self,
        data: &[u8],
        timestamp_ns: u64,
        can_id: u32,
        mux_value: Option<u64>,
    ) -> SampleOutcome {
        if !mux::is_applicable(&self.definition, mux_value) {
            log::trace!(
                "Signal '{}' not present in frame 0x{:X} (mux value {:?})",
                self.definition.name,
                can_id,
                mux_value
            );
            return SampleOutcome::Skipped;
        }

        // A failed attempt is still recorded as an attempt
        self.sample_time_ns = timestamp_ns;
        self.sample_can_id = can_id;

        match self.decode(data) {
            Ok(value) => {
                self.channel_value = value;
                self.channel_valid = true;
                self.sample_counter += 1;
                self.observers.notify(self);
                SampleOutcome::Updated
            }
            Err(e) => {
                log::warn!(
                    "Signal '{}' could not be decoded from frame 0x{:X} ({} bytes): {}",
                    self.definition.name,
                    can_id,
                    data.len(),
                    e
                );
                self.channel_value = cleared_value(&self.definition);
                self.channel_valid = false;
                SampleOutcome::Failed(e)
            }
        }
    }

    /// Clear the cached sample back to invalid/zero
    pub fn reset(&mut self) {
        self.channel_value = cleared_value(&self.definition);
        self.channel_valid = false;
        self.sample_time_ns = 0;
        self.sample_can_id = 0;
    }

    pub fn reset_sample_counter(&mut self) {
        self.sample_counter = 0;
    }

    /// Number of successful decodes since construction or the last reset
    pub fn sample_counter(&self) -> usize {
        self.sample_counter
    }

    /// Time of the last decode attempt, nanoseconds since 1970
    pub fn sample_time_ns(&self) -> u64 {
        self.sample_time_ns
    }

    pub fn sample_timestamp(&self) -> Option<Timestamp> {
        timestamp_from_ns(self.sample_time_ns)
    }

    /// CAN ID of the frame behind the last decode attempt
    pub fn sample_can_id(&self) -> u32 {
        self.sample_can_id
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True when both the external flag and the last decode are valid
    pub fn has_valid_sample(&self) -> bool {
        self.valid && self.channel_valid
    }

    fn checked_sample(&self) -> Result<&SignalValue> {
        if !self.has_valid_sample() {
            return Err(CodecError::InvalidSample(self.definition.name.clone()));
        }
        Ok(&self.channel_value)
    }

    /// The cached unscaled value as a tagged value
    pub fn channel_raw(&self) -> Result<&SignalValue> {
        self.checked_sample()
    }

    /// The cached unscaled value, narrowed to `T`.
    ///
    /// Fails on an invalid sample or when `T` cannot hold the value;
    /// `unwrap_or_default()` gives the zeroed reading.
    pub fn channel_value<T: FromChannel>(&self) -> Result<T> {
        T::from_signal_value(self.checked_sample()?)
    }

    /// Channel value as text; array signals are read up to the first NUL
    pub fn channel_text(&self) -> Result<String> {
        Ok(self.checked_sample()?.to_string())
    }

    /// The cached value in engineering units, narrowed to `T`
    pub fn engineering_value<T: FromChannel>(&self) -> Result<T> {
        let channel = self.checked_sample()?;
        self.converter().to_engineering(channel)
    }

    /// Enumeration label of the cached sample, `None` if its value is unmapped
    pub fn enum_text(&self) -> Result<Option<&str>> {
        let channel = self.checked_sample()?;
        Ok(channel.as_enum_key().and_then(|key| self.enum_label(key)))
    }

    /// Engineering value as text: the enumeration label when one matches,
    /// the scaled number otherwise
    pub fn engineering_text(&self) -> Result<String> {
        if let Some(label) = self.enum_text()? {
            return Ok(label.to_string());
        }
        let channel = self.checked_sample()?;
        match channel {
            SignalValue::Bytes(_) => Ok(channel.to_string()),
            _ => Ok(self.engineering_value::<f64>()?.to_string()),
        }
    }

    pub fn attach_observer(&mut self, observer: &Arc<dyn SampleObserver>) -> ObserverHandle {
        self.observers.attach(observer)
    }

    pub fn detach_observer(&mut self, handle: ObserverHandle) -> bool {
        self.observers.detach(handle)
    }

    /// Write a channel value into a payload at this signal's position
    pub fn pack_channel(&self, value: &SignalValue, buffer: &mut [u8]) -> Result<()> {
        let def = &self.definition;
        let (start, length, order) = (def.bit_start, def.bit_length, def.byte_order);

        match (def.value_kind, value) {
            (ValueKind::Signed, SignalValue::Signed(v)) => {
                check_signed_fits(*v, length)?;
                bit_codec::pack_signed(*v, buffer, start, length, order)
            }
            (ValueKind::Unsigned, SignalValue::Unsigned(v)) => {
                check_unsigned_fits(*v, length)?;
                bit_codec::pack_unsigned(*v, buffer, start, length, order)
            }
            (ValueKind::Float, SignalValue::Float(v)) => {
                bit_codec::pack_f32(f32::from_f64(*v)?, buffer, start, length, order)
            }
            (ValueKind::Double, SignalValue::Float(v)) => {
                bit_codec::pack_f64(*v, buffer, start, length, order)
            }
            (kind, other) => Err(CodecError::InvalidSignalDefinition(format!(
                "'{}' is {} but got {:?}",
                def.name, kind, other
            ))),
        }
    }

    /// Convert an engineering value back to channel units and pack it.
    ///
    /// Integer signals round to the nearest raw value.
    pub fn pack_engineering(&self, engineering: f64, buffer: &mut [u8]) -> Result<()> {
        let channel = self.converter().to_channel(engineering)?;
        let value = match self.definition.value_kind {
            ValueKind::Signed => SignalValue::Signed(i64::from_f64(channel.round())?),
            ValueKind::Unsigned => SignalValue::Unsigned(u64::from_f64(channel.round())?),
            ValueKind::Float | ValueKind::Double => SignalValue::Float(channel),
        };
        self.pack_channel(&value, buffer)
    }

    /// Fill the field with the all-ones "not available" pattern
    pub fn pack_unavailable(&self, buffer: &mut [u8]) -> Result<()> {
        let def = &self.definition;
        bit_codec::set_all_bits(buffer, def.bit_start, def.bit_length, def.byte_order)
    }

    /// True if the payload carries the "not available" pattern for this field
    pub fn is_unavailable(&self, data: &[u8]) -> Result<bool> {
        let def = &self.definition;
        bit_codec::is_all_bits_set(data, def.bit_start, def.bit_length, def.byte_order)
    }
}

fn cleared_value(definition: &SignalDefinition) -> SignalValue {
    match definition.value_kind {
        ValueKind::Unsigned if definition.bit_length > MAX_NUMERIC_BITS => {
            SignalValue::Bytes(Vec::new())
        }
        kind => SignalValue::zero(kind),
    }
}

fn check_unsigned_fits(value: u64, bit_length: usize) -> Result<()> {
    if bit_length < 64 && value >> bit_length != 0 {
        return Err(CodecError::Narrowing {
            value: value.to_string(),
            target: "unsigned bit field",
        });
    }
    Ok(())
}

fn check_signed_fits(value: i64, bit_length: usize) -> Result<()> {
    if bit_length == 0 || bit_length >= 64 {
        return Ok(());
    }
    let min = -(1i64 << (bit_length - 1));
    let max = (1i64 << (bit_length - 1)) - 1;
    if value < min || value > max {
        return Err(CodecError::Narrowing {
            value: value.to_string(),
            target: "signed bit field",
        });
    }
    Ok(())
}
