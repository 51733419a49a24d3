//! Multiplex resolution
//!
//! Decides whether a signal's bits carry meaning in the current frame. The
//! role of a signal is static; only the match outcome changes per frame.

use crate::signals::definition::{MuxKind, SignalDefinition};

/// Is the signal present in a frame whose multiplexor decoded to `mux_value`?
///
/// `mux_value` is `None` when no multiplexor was found or it failed to
/// decode; multiplexed signals are then treated as absent.
pub fn is_applicable(definition: &SignalDefinition, mux_value: Option<u64>) -> bool {
    match definition.mux {
        MuxKind::NotMultiplexed | MuxKind::Multiplexor => true,
        MuxKind::Multiplexed => mux_value == Some(definition.mux_value),
        MuxKind::ExtendedMultiplexor => match (&definition.extended_mux, mux_value) {
            (Some(extended), Some(value)) => extended.in_range(value),
            _ => false,
        },
    }
}

/// Name of the signal whose value selects this one, if any.
///
/// Simple multiplexing has exactly one multiplexor per frame, so it is
/// resolved by the owning message rather than by name.
pub fn governing_multiplexor(definition: &SignalDefinition) -> Option<&str> {
    match definition.mux {
        MuxKind::ExtendedMultiplexor => definition
            .extended_mux
            .as_ref()
            .map(|extended| extended.multiplexor.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::definition::ExtendedMux;

    #[test]
    fn test_not_multiplexed_is_always_applicable() {
        let def = SignalDefinition::new("Speed", 0, 8);
        assert!(is_applicable(&def, None));
        assert!(is_applicable(&def, Some(7)));

        let mux = SignalDefinition::new("Mode", 0, 8).as_multiplexor();
        assert!(is_applicable(&mux, None));
    }

    #[test]
    fn test_multiplexed_requires_exact_value() {
        let def = SignalDefinition::new("SignalA", 8, 8).multiplexed_by(3);
        assert!(is_applicable(&def, Some(3)));
        assert!(!is_applicable(&def, Some(2)));
        assert!(!is_applicable(&def, None));
    }

    #[test]
    fn test_extended_multiplexed_uses_ranges() {
        let def = SignalDefinition::new("SignalB", 8, 8)
            .extended_multiplexed_by(ExtendedMux::new("Mode").with_range(2, 4));
        assert!(is_applicable(&def, Some(4)));
        assert!(!is_applicable(&def, Some(5)));
        assert!(!is_applicable(&def, None));
        assert_eq!(governing_multiplexor(&def), Some("Mode"));
    }
}
