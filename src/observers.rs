//! Lifecycle notification broadcast for Ironpad
//!
//! Collaborating components (toolbar commands, status surfaces, bookmark
//! tracking) register an observer here and receive every document lifecycle
//! event. Observers are invoked in registration order; no ordering contract
//! exists between independent observers, and none should be assumed.

use crate::document::{DocId, DocumentRecord};

/// Capability set broadcast to every registered observer.
///
/// All methods default to no-ops so observers implement only what they need.
#[allow(unused_variables)]
pub trait SessionObserver {
    /// A document was opened (new buffer or loaded file).
    fn on_document_open(&mut self, id: DocId, record: &DocumentRecord) {}

    /// A document is about to close. Fires while the record is still in the
    /// store and the tab slot still exists, so consumers may query both.
    fn on_document_close(&mut self, id: DocId, record: &DocumentRecord) {}

    /// A document was successfully saved.
    fn on_document_save(&mut self, id: DocId, record: &DocumentRecord) {}

    /// The selection is about to leave this document. Fires while it is
    /// still bound to the live editor, before the switch.
    fn on_tab_changing(&mut self, id: DocId) {}

    /// The selection arrived at this document; it is now live.
    fn on_tab_activated(&mut self, id: DocId) {}
}

/// Observer list, iterated in registration order.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<Box<dyn SessionObserver>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("count", &self.observers.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; it will be notified after all earlier ones.
    pub fn register(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn notify_document_open(&mut self, id: DocId, record: &DocumentRecord) {
        for obs in &mut self.observers {
            obs.on_document_open(id, record);
        }
    }

    pub fn notify_document_close(&mut self, id: DocId, record: &DocumentRecord) {
        for obs in &mut self.observers {
            obs.on_document_close(id, record);
        }
    }

    pub fn notify_document_save(&mut self, id: DocId, record: &DocumentRecord) {
        for obs in &mut self.observers {
            obs.on_document_save(id, record);
        }
    }

    pub fn notify_tab_changing(&mut self, id: DocId) {
        for obs in &mut self.observers {
            obs.on_tab_changing(id);
        }
    }

    pub fn notify_tab_activated(&mut self, id: DocId) {
        for obs in &mut self.observers {
            obs.on_tab_activated(id);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Encoding, EolFormat};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl SessionObserver for Recorder {
        fn on_document_open(&mut self, id: DocId, _record: &DocumentRecord) {
            self.log.borrow_mut().push(format!("{}:open:{}", self.label, id));
        }
        fn on_tab_activated(&mut self, id: DocId) {
            self.log
                .borrow_mut()
                .push(format!("{}:activated:{}", self.label, id));
        }
    }

    #[test]
    fn test_observers_fire_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.register(Box::new(Recorder {
            label: "first",
            log: Rc::clone(&log),
        }));
        registry.register(Box::new(Recorder {
            label: "second",
            log: Rc::clone(&log),
        }));

        let mut gen = crate::document::DocIdGenerator::new();
        let id = gen.mint();
        let record = DocumentRecord::new_untitled(Encoding::Utf8, EolFormat::Lf);
        registry.notify_document_open(id, &record);
        registry.notify_tab_activated(id);

        let log = log.borrow();
        assert_eq!(
            *log,
            vec![
                format!("first:open:{}", id),
                format!("second:open:{}", id),
                format!("first:activated:{}", id),
                format!("second:activated:{}", id),
            ]
        );
    }
}
