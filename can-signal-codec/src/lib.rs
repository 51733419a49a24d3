//! CAN Signal Codec Library
//!
//! Decodes and encodes the bit fields of CAN frame payloads as described by
//! already-materialized signal metadata.
//!
//! # Architecture
//!
//! - [`bit_codec`] extracts and packs arbitrary bit fields (Intel and
//!   Motorola order; signed, unsigned, float and double encodings)
//! - [`Signal`] caches the last decoded sample of one signal, resolves
//!   multiplexing and notifies observers
//! - [`EngineeringConverter`] applies scale, offset and enumerations
//! - [`Message`] groups the signals of one CAN ID and resolves their
//!   multiplexor values
//!
//! The library does NOT:
//! - Parse DBC/ARXML files
//! - Read log files or talk to a bus
//! - Map CAN IDs to messages (that is the caller's dispatcher)
//!
//! # Example Usage
//!
//! ```
//! use can_signal_codec::{Message, SignalDefinition, ValueKind};
//!
//! let mut message = Message::new(0x123, "EngineData", 8);
//! message
//!     .add_signal(
//!         SignalDefinition::new("EngineTemp", 0, 8)
//!             .with_value_kind(ValueKind::Unsigned)
//!             .with_scaling(0.5, 10.0),
//!     )
//!     .unwrap();
//!
//! message.parse_message(&[0x14, 0, 0, 0, 0, 0, 0, 0], 0, 0x123);
//!
//! let temp = message.signal("EngineTemp").unwrap();
//! assert_eq!(temp.channel_value::<u64>(), Ok(20));
//! assert_eq!(temp.engineering_value::<f64>(), Ok(20.0));
//! ```

// Public modules
pub mod bit_codec;
pub mod message;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use bit_codec::ByteOrder;
pub use message::Message;
pub use signals::{
    Attribute, AttributeValue, EngineeringConverter, ExtendedMux, MuxKind, ObserverHandle,
    SampleObserver, SampleOutcome, Signal, SignalDefinition,
};
pub use types::{CanFrame, CodecError, FromChannel, Result, SignalValue, Timestamp, ValueKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
