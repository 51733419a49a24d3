//! Signal definitions and live signal state
//!
//! This module contains the static signal metadata, the multiplex and
//! engineering-unit rules applied on top of it, and the per-signal sample
//! cache with its observers.

pub mod convert;
pub mod definition;
pub mod mux;
pub mod observer;
pub mod signal;

// Re-export key types for convenience
pub use convert::EngineeringConverter;
pub use definition::{Attribute, AttributeValue, ExtendedMux, MuxKind, SignalDefinition};
pub use observer::{ObserverHandle, ObserverHub, SampleObserver};
pub use signal::{SampleOutcome, Signal};
