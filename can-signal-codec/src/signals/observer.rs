//! Sample observers
//!
//! Observers are held weakly: the hub never keeps one alive. Attaching
//! returns a handle that detaches it again.

use crate::signals::signal::Signal;
use std::sync::{Arc, Weak};

/// Receives a callback each time a signal decodes a new sample
pub trait SampleObserver: Send + Sync {
    fn on_sample(&self, signal: &Signal);
}

/// Token returned by [`ObserverHub::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Ordered list of weakly held observers
#[derive(Default)]
pub struct ObserverHub {
    observers: Vec<(ObserverHandle, Weak<dyn SampleObserver>)>,
    next_handle: u64,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, observer: &Arc<dyn SampleObserver>) -> ObserverHandle {
        // Drop entries whose owners are gone before growing the list
        self.observers.retain(|(_, weak)| weak.strong_count() > 0);

        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.observers.push((handle, Arc::downgrade(observer)));
        handle
    }

    /// Returns false if the handle was not attached
    pub fn detach(&mut self, handle: ObserverHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        self.observers.len() != before
    }

    /// Number of observers that are still alive
    pub fn len(&self) -> usize {
        self.observers
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every live observer in attachment order.
    ///
    /// An observer dropped by its owner, including one dropped by an earlier
    /// callback in the same pass, is skipped.
    pub fn notify(&self, signal: &Signal) {
        for (handle, weak) in &self.observers {
            match weak.upgrade() {
                Some(observer) => observer.on_sample(signal),
                None => log::trace!("Skipping dropped observer {:?} on '{}'", handle, signal.name()),
            }
        }
    }
}

impl std::fmt::Debug for ObserverHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHub")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::definition::SignalDefinition;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SampleObserver for Recorder {
        fn on_sample(&self, _signal: &Signal) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn SampleObserver> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_notify_in_attachment_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        let signal = Signal::new(SignalDefinition::new("Speed", 0, 8));

        let mut hub = ObserverHub::new();
        hub.attach(&first);
        hub.attach(&second);
        hub.notify(&signal);

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_detach_by_handle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        let signal = Signal::new(SignalDefinition::new("Speed", 0, 8));

        let mut hub = ObserverHub::new();
        let handle = hub.attach(&first);
        hub.attach(&second);
        assert!(hub.detach(handle));
        assert!(!hub.detach(handle));
        hub.notify(&signal);

        assert_eq!(*log.lock().unwrap(), vec!["second"]);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_dropped_observer_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        let signal = Signal::new(SignalDefinition::new("Speed", 0, 8));

        let mut hub = ObserverHub::new();
        hub.attach(&first);
        hub.attach(&second);
        drop(first);
        hub.notify(&signal);

        assert_eq!(*log.lock().unwrap(), vec!["second"]);
        assert!(!hub.is_empty());
    }
}
