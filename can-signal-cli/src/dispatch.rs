//! Frame dispatch: maps CAN IDs to messages and feeds them frames

use anyhow::{anyhow, bail, Context, Result};
use can_signal_codec::{CanFrame, Message, SampleObserver};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Dispatcher {
    messages: HashMap<u32, Message>,
}

impl Dispatcher {
    pub fn new(messages: HashMap<u32, Message>) -> Self {
        Self { messages }
    }

    /// Attach one observer to every signal of every message
    pub fn attach_to_all(&mut self, observer: &Arc<dyn SampleObserver>) {
        for message in self.messages.values_mut() {
            for signal in message.signals_mut() {
                signal.attach_observer(observer);
            }
        }
    }

    /// Decode a frame; returns the number of signals updated, or `None`
    /// for an unknown CAN ID
    pub fn dispatch(&mut self, frame: &CanFrame) -> Option<usize> {
        match self.messages.get_mut(&frame.can_id) {
            Some(message) => {
                log::debug!("Decoding message: {} (ID 0x{:X})", message.name(), frame.can_id);
                Some(message.parse_frame(frame))
            }
            None => {
                log::trace!("Unknown CAN ID: 0x{:X}", frame.can_id);
                None
            }
        }
    }

    /// Look a message up by name or by hex/decimal CAN ID
    pub fn find_message(&self, key: &str) -> Option<&Message> {
        if let Some(message) = self.messages.values().find(|m| m.name() == key) {
            return Some(message);
        }
        parse_can_id(key).ok().and_then(|id| self.messages.get(&id))
    }
}

/// Parse `0x1A0` style hex or a plain decimal CAN ID
pub fn parse_can_id(text: &str) -> Result<u32> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    };
    parsed.with_context(|| format!("Invalid CAN ID '{}'", text))
}

/// Parse a `candump` style frame: `123#DEADBEEF` (ID in hex)
pub fn parse_frame(text: &str, timestamp_ns: u64) -> Result<CanFrame> {
    let (id, payload) = text
        .trim()
        .split_once('#')
        .ok_or_else(|| anyhow!("Frame '{}' is not in ID#DATA form", text))?;

    let can_id = u32::from_str_radix(id, 16).with_context(|| format!("Invalid CAN ID '{}'", id))?;
    let payload: String = payload.chars().filter(|c| *c != '.').collect();
    if !payload.is_ascii() {
        bail!("Frame data '{}' is not hex", payload);
    }
    if payload.len() % 2 != 0 {
        bail!("Frame data '{}' has an odd number of hex digits", payload);
    }

    let data = (0..payload.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&payload[i..i + 2], 16)
                .with_context(|| format!("Invalid data byte '{}'", &payload[i..i + 2]))
        })
        .collect::<Result<Vec<u8>>>()?;

    Ok(CanFrame::new(can_id, data, timestamp_ns))
}

/// Format a payload back into `ID#DATA` form
pub fn format_frame(can_id: u32, data: &[u8]) -> String {
    let hex: String = data.iter().map(|b| format!("{:02X}", b)).collect();
    format!("{:03X}#{}", can_id, hex)
}
