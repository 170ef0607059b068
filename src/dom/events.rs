use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use kuchiki::NodeRef;
use tracing::trace;

use super::Document;
use crate::value::{Callback, Descriptor, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// A DOM event. Flags use interior mutability so listeners receive `&Event`.
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    properties: Descriptor,
    target: RefCell<Option<NodeRef>>,
    current_target: RefCell<Option<NodeRef>>,
    phase: Cell<EventPhase>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: false,
            cancelable: false,
            properties: Descriptor::new(),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            phase: Cell::new(EventPhase::None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
        }
    }

    pub fn bubbling(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// Extra properties merged onto the event object.
    pub fn with_properties(mut self, properties: Descriptor) -> Self {
        for (key, value) in properties {
            self.properties.insert(key, value);
        }
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    pub fn target(&self) -> Option<NodeRef> {
        self.target.borrow().clone()
    }

    pub fn current_target(&self) -> Option<NodeRef> {
        self.current_target.borrow().clone()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    fn set_current_target(&self, node: Option<&NodeRef>) {
        *self.current_target.borrow_mut() = node.cloned();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

#[derive(Clone)]
pub(crate) struct NativeListener {
    pub(crate) callback: Callback,
    pub(crate) capture: bool,
}

impl NativeListener {
    fn matches(&self, callback: &Callback, capture: bool) -> bool {
        self.callback.same(callback) && self.capture == capture
    }
}

/// Native listener lists of one node, by event type, in registration order.
#[derive(Default)]
pub(crate) struct TargetListeners {
    by_type: HashMap<String, Vec<NativeListener>>,
}

impl TargetListeners {
    fn contains(&self, event_type: &str, callback: &Callback, capture: bool) -> bool {
        self.by_type
            .get(event_type)
            .map(|list| list.iter().any(|l| l.matches(callback, capture)))
            .unwrap_or(false)
    }
}

impl Document {
    /// Register directly with the native target, bypassing the shadow store.
    /// An identical (callback, capture) pair is ignored.
    pub(crate) fn add_native_listener(
        &self,
        node: &NodeRef,
        event_type: &str,
        callback: &Callback,
        capture: bool,
    ) {
        let mut targets = self.inner.targets.borrow_mut();
        let entry = targets.entry(node);
        let list = entry.by_type.entry(event_type.to_string()).or_default();
        if list.iter().any(|l| l.matches(callback, capture)) {
            return;
        }
        list.push(NativeListener {
            callback: callback.clone(),
            capture,
        });
    }

    pub(crate) fn remove_native_listener(
        &self,
        node: &NodeRef,
        event_type: &str,
        callback: &Callback,
        capture: bool,
    ) {
        let mut targets = self.inner.targets.borrow_mut();
        if let Some(entry) = targets.get_mut(node) {
            if let Some(list) = entry.by_type.get_mut(event_type) {
                list.retain(|l| !l.matches(callback, capture));
            }
        }
    }

    /// Number of native registrations for `event_type` on `node`.
    pub fn native_listener_count(&self, node: &NodeRef, event_type: &str) -> usize {
        self.inner
            .targets
            .borrow()
            .get(node)
            .and_then(|entry| entry.by_type.get(event_type))
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Dispatch `event` at `target` through capture, target and bubble phases.
    pub fn dispatch_event(&self, target: &NodeRef, event: &Event) -> DispatchOutcome {
        *event.target.borrow_mut() = Some(target.clone());
        let ancestors: Vec<NodeRef> = target.ancestors().collect();
        trace!(
            target: "bliss::events",
            event_type = %event.event_type,
            depth = ancestors.len(),
            "dispatching event"
        );

        event.phase.set(EventPhase::Capturing);
        for node in ancestors.iter().rev() {
            if event.propagation_stopped.get() {
                break;
            }
            self.invoke_listeners(node, event);
        }

        if !event.propagation_stopped.get() {
            event.phase.set(EventPhase::AtTarget);
            self.invoke_listeners(target, event);
        }

        if event.bubbles {
            event.phase.set(EventPhase::Bubbling);
            for node in &ancestors {
                if event.propagation_stopped.get() {
                    break;
                }
                self.invoke_listeners(node, event);
            }
        }

        event.phase.set(EventPhase::None);
        event.set_current_target(None);

        DispatchOutcome {
            default_prevented: event.default_prevented.get(),
            propagation_stopped: event.propagation_stopped.get(),
        }
    }

    fn invoke_listeners(&self, node: &NodeRef, event: &Event) {
        let phase = event.phase.get();
        event.set_current_target(Some(node));

        // Snapshot so listeners may add or remove listeners while we iterate.
        let snapshot: Vec<NativeListener> = self
            .inner
            .targets
            .borrow()
            .get(node)
            .and_then(|entry| entry.by_type.get(&event.event_type))
            .map(|list| {
                list.iter()
                    .filter(|l| match phase {
                        EventPhase::Capturing => l.capture,
                        EventPhase::Bubbling => !l.capture,
                        _ => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for listener in snapshot {
            if event.immediate_propagation_stopped.get() {
                return;
            }
            let still_registered = self
                .inner
                .targets
                .borrow()
                .get(node)
                .map(|entry| entry.contains(&event.event_type, &listener.callback, listener.capture))
                .unwrap_or(false);
            if !still_registered {
                continue;
            }
            listener.callback.call(event);
        }

        if phase == EventPhase::Capturing || event.immediate_propagation_stopped.get() {
            return;
        }
        if let Some(handler) = self.inline_handler(node, &event.event_type) {
            handler.call(event);
        }
    }
}
