//! Message: the set of signals carried by one CAN ID
//!
//! Resolves the multiplexor value of each signal from the raw payload before
//! handing the frame to the signal itself, and packs signals back into a
//! payload for encoding.

use crate::bit_codec;
use crate::signals::definition::{MuxKind, SignalDefinition};
use crate::signals::mux;
use crate::signals::signal::{SampleOutcome, Signal};
use crate::types::{CanFrame, CodecError, Result};

/// Nested extended multiplexors deeper than this are treated as absent
const MAX_MUX_DEPTH: usize = 8;

/// A CAN message definition with live signals
#[derive(Debug)]
pub struct Message {
    /// CAN message ID
    id: u32,
    /// Message name
    name: String,
    /// Message size in bytes
    size: usize,
    /// Sender ECU name (optional)
    sender: Option<String>,
    signals: Vec<Signal>,
}

impl Message {
    pub fn new(id: u32, name: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            sender: None,
            signals: Vec::new(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Validate a definition and add it as a live signal.
    ///
    /// The signal's `message_id` is overwritten with this message's ID.
    pub fn add_signal(&mut self, mut definition: SignalDefinition) -> Result<&mut Signal> {
        definition.validate()?;
        if self.signal(&definition.name).is_some() {
            return Err(CodecError::InvalidSignalDefinition(format!(
                "duplicate signal '{}' in message '{}'",
                definition.name, self.name
            )));
        }
        if definition.mux == MuxKind::Multiplexor && self.multiplexor().is_some() {
            return Err(CodecError::InvalidSignalDefinition(format!(
                "message '{}' already has a multiplexor",
                self.name
            )));
        }

        definition.message_id = self.id;
        self.signals.push(Signal::new(definition));
        let last = self.signals.len() - 1;
        Ok(&mut self.signals[last])
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut [Signal] {
        &mut self.signals
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name() == name)
    }

    pub fn signal_mut(&mut self, name: &str) -> Option<&mut Signal> {
        self.signals.iter_mut().find(|s| s.name() == name)
    }

    /// The simple multiplexor of this message, if any
    pub fn multiplexor(&self) -> Option<&Signal> {
        self.signals.iter().find(|s| s.mux() == MuxKind::Multiplexor)
    }

    pub fn is_multiplexed(&self) -> bool {
        self.signals.iter().any(|s| s.is_multiplexed())
    }

    /// Value of the signal that selects `signal` in this payload.
    ///
    /// `None` when there is no governing signal, it is not present in this
    /// payload itself, or its field cannot be extracted.
    fn mux_value_for(&self, signal: &Signal, data: &[u8], depth: usize) -> Option<u64> {
        if depth > MAX_MUX_DEPTH {
            log::warn!("Multiplexor chain too deep at '{}' in '{}'", signal.name(), self.name);
            return None;
        }

        let governing = match signal.mux() {
            MuxKind::Multiplexed => self.multiplexor(),
            MuxKind::ExtendedMultiplexor => {
                let name = mux::governing_multiplexor(signal.definition())?;
                let found = self.signal(name);
                if found.is_none() {
                    log::warn!(
                        "Signal '{}' refers to unknown multiplexor '{}' in '{}'",
                        signal.name(),
                        name,
                        self.name
                    );
                }
                found
            }
            MuxKind::NotMultiplexed | MuxKind::Multiplexor => return None,
        }?;

        // A multiplexor that is itself switched must be present first
        if governing.is_multiplexed() {
            let outer = self.mux_value_for(governing, data, depth + 1);
            if !mux::is_applicable(governing.definition(), outer) {
                return None;
            }
        }

        let def = governing.definition();
        bit_codec::extract_unsigned(data, def.bit_start, def.bit_length, def.byte_order).ok()
    }

    /// Feed a payload to every signal.
    ///
    /// Returns the number of signals that stored a new sample.
    pub fn parse_message(&mut self, data: &[u8], timestamp_ns: u64, can_id: u32) -> usize {
        let mux_values: Vec<Option<u64>> = self
            .signals
            .iter()
            .map(|signal| self.mux_value_for(signal, data, 0))
            .collect();

        let mut updated = 0;
        for (signal, mux_value) in self.signals.iter_mut().zip(mux_values) {
            if signal.parse_message_with_mux(data, timestamp_ns, can_id, mux_value)
                == SampleOutcome::Updated
            {
                updated += 1;
            }
        }

        log::debug!(
            "Message '{}' (0x{:X}): {} of {} signals updated",
            self.name,
            can_id,
            updated,
            self.signals.len()
        );
        updated
    }

    pub fn parse_frame(&mut self, frame: &CanFrame) -> usize {
        self.parse_message(&frame.data, frame.timestamp_ns, frame.can_id)
    }

    /// Build a zero-filled payload with the given signals set from
    /// engineering values
    pub fn encode(&self, values: &[(&str, f64)]) -> Result<Vec<u8>> {
        let mut data = vec![0u8; self.size];
        for (name, value) in values {
            let signal = self
                .signal(name)
                .ok_or_else(|| CodecError::SignalNotFound(name.to_string()))?;
            signal.pack_engineering(*value, &mut data)?;
        }
        Ok(data)
    }
}
