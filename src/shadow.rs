//! Listener shadow store: per-node records of listeners registered through
//! the document, with fire counts, kept in step with native registration.

use std::collections::HashMap;

use kuchiki::NodeRef;
use tracing::trace;

use crate::dom::events::{DispatchOutcome, Event};
use crate::dom::{Document, NodeTable, WeakDocument};
use crate::value::{Callback, Descriptor};

#[derive(Clone)]
struct TrackedListener {
    callback: Callback,
    capture: bool,
    /// The counting wrapper actually registered with the native target.
    adapter: Callback,
}

/// Introspection view of one tracked registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerRecord {
    pub event_type: String,
    pub callback: Callback,
    pub capture: bool,
}

#[derive(Default)]
pub(crate) struct ElementMetadata {
    listeners: Vec<(String, Vec<TrackedListener>)>,
    fired: HashMap<String, u64>,
}

impl ElementMetadata {
    fn listeners_mut(&mut self, event_type: &str) -> &mut Vec<TrackedListener> {
        let index = match self
            .listeners
            .iter()
            .position(|(existing, _)| existing == event_type)
        {
            Some(index) => index,
            None => {
                self.listeners.push((event_type.to_string(), Vec::new()));
                self.listeners.len() - 1
            }
        };
        &mut self.listeners[index].1
    }

    fn bump(&mut self, event_type: &str) {
        *self.fired.entry(event_type.to_string()).or_insert(0) += 1;
    }
}

#[derive(Default)]
pub(crate) struct ShadowStore {
    table: NodeTable<ElementMetadata>,
}

impl ShadowStore {
    fn bump(&mut self, node: &NodeRef, event_type: &str) {
        if let Some(metadata) = self.table.get_mut(node) {
            metadata.bump(event_type);
        }
    }
}

fn counting_adapter(document: WeakDocument, event_type: &str, original: Callback) -> Callback {
    let event_type = event_type.to_string();
    Callback::new(move |event: &Event| {
        if let (Some(document), Some(node)) = (document.upgrade(), event.current_target()) {
            document.inner.shadow.borrow_mut().bump(&node, &event_type);
        }
        original.call(event);
    })
}

impl Document {
    /// Attach listener metadata to `node`. Registrations made afterwards are
    /// tracked; earlier ones are not.
    pub fn observe(&self, node: &NodeRef) {
        self.inner.shadow.borrow_mut().table.entry(node);
    }

    pub fn is_observed(&self, node: &NodeRef) -> bool {
        self.inner.shadow.borrow().table.contains(node)
    }

    pub fn add_event_listener(
        &self,
        node: &NodeRef,
        event_type: &str,
        callback: &Callback,
        capture: bool,
    ) {
        let adapter = {
            let mut shadow = self.inner.shadow.borrow_mut();
            shadow.table.get_mut(node).map(|metadata| {
                metadata.fired.entry(event_type.to_string()).or_insert(0);
                let list = metadata.listeners_mut(event_type);
                match list
                    .iter()
                    .find(|l| l.callback.same(callback) && l.capture == capture)
                {
                    Some(existing) => existing.adapter.clone(),
                    None => {
                        let adapter =
                            counting_adapter(self.downgrade(), event_type, callback.clone());
                        list.push(TrackedListener {
                            callback: callback.clone(),
                            capture,
                            adapter: adapter.clone(),
                        });
                        trace!(target: "bliss::shadow", event_type, capture, "listener tracked");
                        adapter
                    }
                }
            })
        };

        let native = adapter.unwrap_or_else(|| callback.clone());
        self.add_native_listener(node, event_type, &native, capture);
    }

    /// Removing a callback that was never registered is a no-op.
    pub fn remove_event_listener(
        &self,
        node: &NodeRef,
        event_type: &str,
        callback: &Callback,
        capture: bool,
    ) {
        let adapter = {
            let mut shadow = self.inner.shadow.borrow_mut();
            shadow.table.get_mut(node).and_then(|metadata| {
                let list = metadata.listeners_mut(event_type);
                let index = list
                    .iter()
                    .position(|l| l.callback.same(callback) && l.capture == capture)?;
                trace!(target: "bliss::shadow", event_type, capture, "listener untracked");
                Some(list.remove(index).adapter)
            })
        };

        let native = adapter.unwrap_or_else(|| callback.clone());
        self.remove_native_listener(node, event_type, &native, capture);
    }

    /// Dispatch a bubbling, cancelable event and count it on observed nodes.
    pub(crate) fn fire_on(&self, node: &NodeRef, event_type: &str, properties: Descriptor) -> DispatchOutcome {
        let event = Event::new(event_type)
            .bubbling(true)
            .cancelable(true)
            .with_properties(properties);
        let outcome = self.dispatch_event(node, &event);
        self.inner.shadow.borrow_mut().bump(node, event_type);
        outcome
    }

    /// How often `event_type` has been observed on `node`: `None` if the node
    /// is unobserved or the type was never registered nor fired.
    pub fn fired(&self, node: &NodeRef, event_type: &str) -> Option<u64> {
        self.inner
            .shadow
            .borrow()
            .table
            .get(node)
            .and_then(|metadata| metadata.fired.get(event_type).copied())
    }

    /// Tracked listeners of `node`, grouped by type in first-registration order.
    pub fn listeners(&self, node: &NodeRef) -> Vec<ListenerRecord> {
        self.inner
            .shadow
            .borrow()
            .table
            .get(node)
            .map(|metadata| {
                metadata
                    .listeners
                    .iter()
                    .flat_map(|(event_type, list)| {
                        list.iter().map(move |l| ListenerRecord {
                            event_type: event_type.clone(),
                            callback: l.callback.clone(),
                            capture: l.capture,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Callback, Rc<Cell<u32>>) {
        let hits = Rc::new(Cell::new(0));
        let sink = Rc::clone(&hits);
        (Callback::new(move |_| sink.set(sink.get() + 1)), hits)
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let document = Document::new();
        let node = document.create_element("button");
        document.observe(&node);
        let (callback, hits) = counter();

        document.add_event_listener(&node, "click", &callback, false);
        document.add_event_listener(&node, "click", &callback, false);

        assert_eq!(document.listeners(&node).len(), 1);
        assert_eq!(document.native_listener_count(&node, "click"), 1);

        document.dispatch_event(&node, &Event::new("click"));
        assert_eq!(hits.get(), 1);
        assert_eq!(document.fired(&node, "click"), Some(1));
    }

    #[test]
    fn capture_flag_distinguishes_registrations() {
        let document = Document::new();
        let node = document.create_element("div");
        document.observe(&node);
        let (callback, _) = counter();

        document.add_event_listener(&node, "click", &callback, false);
        document.add_event_listener(&node, "click", &callback, true);
        assert_eq!(document.listeners(&node).len(), 2);

        document.remove_event_listener(&node, "click", &callback, true);
        let remaining = document.listeners(&node);
        assert_eq!(remaining.len(), 1);
        assert!(!remaining[0].capture);
        assert_eq!(document.native_listener_count(&node, "click"), 1);
    }

    #[test]
    fn dispatch_counts_each_execution() {
        let document = Document::new();
        let node = document.create_element("div");
        document.observe(&node);
        let (callback, hits) = counter();
        document.add_event_listener(&node, "click", &callback, false);
        assert_eq!(document.fired(&node, "click"), Some(0));

        for _ in 0..3 {
            document.dispatch_event(&node, &Event::new("click"));
        }
        assert_eq!(document.fired(&node, "click"), Some(3));
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn fire_counts_without_listeners() {
        let document = Document::new();
        let node = document.create_element("div");
        document.observe(&node);
        assert_eq!(document.fired(&node, "custom"), None);

        document.fire_on(&node, "custom", Descriptor::new());
        document.fire_on(&node, "custom", Descriptor::new());
        assert_eq!(document.fired(&node, "custom"), Some(2));
    }

    #[test]
    fn unobserved_nodes_register_natively_only() {
        let document = Document::new();
        let node = document.create_element("div");
        let (callback, hits) = counter();

        document.add_event_listener(&node, "click", &callback, false);
        document.fire_on(&node, "click", Descriptor::new());

        assert_eq!(hits.get(), 1);
        assert!(document.listeners(&node).is_empty());
        assert_eq!(document.fired(&node, "click"), None);

        document.remove_event_listener(&node, "click", &callback, false);
        assert_eq!(document.native_listener_count(&node, "click"), 0);
    }

    #[test]
    fn removing_unknown_callback_is_a_no_op() {
        let document = Document::new();
        let node = document.create_element("div");
        document.observe(&node);
        let (registered, hits) = counter();
        let (stranger, _) = counter();
        document.add_event_listener(&node, "click", &registered, false);

        document.remove_event_listener(&node, "click", &stranger, false);
        document.remove_event_listener(&node, "keyup", &stranger, false);

        document.dispatch_event(&node, &Event::new("click"));
        assert_eq!(hits.get(), 1);
        assert_eq!(document.listeners(&node).len(), 1);
    }

    #[test]
    fn removal_with_original_reference_unregisters_adapter() {
        let document = Document::new();
        let node = document.create_element("div");
        document.observe(&node);
        let (callback, hits) = counter();
        document.add_event_listener(&node, "click", &callback, false);
        document.remove_event_listener(&node, "click", &callback, false);

        document.dispatch_event(&node, &Event::new("click"));
        assert_eq!(hits.get(), 0);
        assert_eq!(document.native_listener_count(&node, "click"), 0);
    }
}
