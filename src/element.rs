//! Fluent views over nodes. `Element` wraps one node, `Elements` a list, and
//! the document-level functions accept either through [`Subject`].

use std::iter;

use kuchiki::NodeRef;

use crate::deferred::Deferred;
use crate::dom::events::DispatchOutcome;
use crate::dom::{self, Document};
use crate::error::Result;
use crate::handlers::{self, Special};
use crate::set::{self, configure};
use crate::shadow::ListenerRecord;
use crate::transition::transition;
use crate::value::{Callback, Descriptor, Value};

/// Single-node view. Creating one attaches listener metadata to the node.
#[derive(Clone)]
pub struct Element {
    document: Document,
    node: NodeRef,
}

impl Element {
    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn set(&self, descriptor: &Descriptor) -> Result<&Self> {
        configure(&self.document, &self.node, descriptor)?;
        Ok(self)
    }

    /// Run one special handler directly.
    pub fn apply(&self, special: Special, value: impl Into<Value>) -> Result<&Self> {
        special.apply(&self.document, &self.node, &value.into())?;
        Ok(self)
    }

    pub fn style(&self, declarations: Descriptor) -> Result<&Self> {
        self.apply(Special::Style, declarations)
    }

    pub fn attributes(&self, attributes: Descriptor) -> Result<&Self> {
        self.apply(Special::Attributes, attributes)
    }

    pub fn properties(&self, properties: Descriptor) -> Result<&Self> {
        self.apply(Special::Properties, properties)
    }

    /// A map of event types to callbacks, or a node to copy listeners from.
    pub fn events(&self, events: impl Into<Value>) -> Result<&Self> {
        self.apply(Special::Events, events)
    }

    pub fn once(&self, events: Descriptor) -> Result<&Self> {
        self.apply(Special::Once, events)
    }

    pub fn delegate(&self, routes: Descriptor) -> Result<&Self> {
        self.apply(Special::Delegate, routes)
    }

    pub fn delegate_one(&self, event_type: &str, selector: &str, callback: Callback) -> Result<&Self> {
        self.delegate(Descriptor::new().with(event_type, Descriptor::new().with(selector, callback)))
    }

    pub fn contents(&self, contents: impl Into<Value>) -> Result<&Self> {
        self.apply(Special::Contents, contents)
    }

    pub fn inside(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Inside, target.clone())
    }

    pub fn before(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Before, target.clone())
    }

    pub fn after(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::After, target.clone())
    }

    pub fn start(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Start, target.clone())
    }

    pub fn around(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Around, target.clone())
    }

    pub fn transition(&self, props: &Descriptor, duration_ms: Option<u64>) -> Result<Deferred<NodeRef>> {
        transition(&self.document, &self.node, props, duration_ms)
    }

    /// Detach from the parent, if any.
    pub fn remove(&self) -> &Self {
        self.node.detach();
        self
    }

    pub fn fire(&self, event_type: &str, properties: Descriptor) -> DispatchOutcome {
        self.document.fire_on(&self.node, event_type, properties)
    }

    /// Deep clone that carries tracked listeners and inline handlers over to
    /// every corresponding element of the copy.
    pub fn clone_node(&self) -> Element {
        let copy = dom::clone_tree(&self.node);
        for (original, cloned) in with_element_descendants(&self.node).zip(with_element_descendants(&copy)) {
            handlers::copy_events(&self.document, &original, &cloned);
        }
        self.document.element(&copy)
    }

    /// Resolves once `event_type` has fired on this node.
    pub fn wait_for(&self, event_type: &str) -> Deferred<()> {
        if self.fired(event_type).unwrap_or(0) > 0 {
            return Deferred::resolved(());
        }
        let (deferred, resolver) = Deferred::new();
        let callback = Callback::new(move |_| resolver.resolve(()));
        handlers::once(&self.document, &self.node, event_type, &callback);
        deferred
    }

    pub fn prop(&self, name: &str) -> Option<Value> {
        self.document.get_property(&self.node, name)
    }

    pub fn fired(&self, event_type: &str) -> Option<u64> {
        self.document.fired(&self.node, event_type)
    }

    pub fn listeners(&self) -> Vec<ListenerRecord> {
        self.document.listeners(&self.node)
    }
}

fn with_element_descendants(node: &NodeRef) -> impl Iterator<Item = NodeRef> {
    iter::once(node.clone()).chain(
        node.descendants()
            .filter(|descendant| descendant.as_element().is_some()),
    )
}

/// Bulk view: configuration applies to each node in order.
#[derive(Clone)]
pub struct Elements {
    elements: Vec<Element>,
}

impl Elements {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn nodes(&self) -> Vec<NodeRef> {
        self.elements.iter().map(|element| element.node.clone()).collect()
    }

    pub fn set(&self, descriptor: &Descriptor) -> Result<&Self> {
        for element in &self.elements {
            element.set(descriptor)?;
        }
        Ok(self)
    }

    pub fn apply(&self, special: Special, value: impl Into<Value>) -> Result<&Self> {
        let value = value.into();
        for element in &self.elements {
            element.apply(special, value.clone())?;
        }
        Ok(self)
    }

    pub fn style(&self, declarations: Descriptor) -> Result<&Self> {
        self.apply(Special::Style, declarations)
    }

    pub fn attributes(&self, attributes: Descriptor) -> Result<&Self> {
        self.apply(Special::Attributes, attributes)
    }

    pub fn events(&self, events: impl Into<Value>) -> Result<&Self> {
        self.apply(Special::Events, events)
    }

    pub fn once(&self, events: Descriptor) -> Result<&Self> {
        self.apply(Special::Once, events)
    }

    pub fn delegate(&self, routes: Descriptor) -> Result<&Self> {
        self.apply(Special::Delegate, routes)
    }

    pub fn contents(&self, contents: impl Into<Value>) -> Result<&Self> {
        self.apply(Special::Contents, contents)
    }

    pub fn properties(&self, properties: Descriptor) -> Result<&Self> {
        self.apply(Special::Properties, properties)
    }

    pub fn delegate_one(&self, event_type: &str, selector: &str, callback: Callback) -> Result<&Self> {
        for element in &self.elements {
            element.delegate_one(event_type, selector, callback.clone())?;
        }
        Ok(self)
    }

    pub fn inside(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Inside, target.clone())
    }

    pub fn before(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Before, target.clone())
    }

    pub fn after(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::After, target.clone())
    }

    pub fn start(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Start, target.clone())
    }

    /// Each node wraps `target` in turn, so the last node ends up outermost.
    pub fn around(&self, target: &NodeRef) -> Result<&Self> {
        self.apply(Special::Around, target.clone())
    }

    pub fn transition(
        &self,
        props: &Descriptor,
        duration_ms: Option<u64>,
    ) -> Result<Vec<Deferred<NodeRef>>> {
        self.elements
            .iter()
            .map(|element| element.transition(props, duration_ms))
            .collect()
    }

    pub fn remove(&self) -> &Self {
        for element in &self.elements {
            element.remove();
        }
        self
    }

    pub fn fire(&self, event_type: &str, properties: Descriptor) -> Vec<DispatchOutcome> {
        self.elements
            .iter()
            .map(|element| element.fire(event_type, properties.clone()))
            .collect()
    }

    pub fn clone_node(&self) -> Vec<Element> {
        self.elements.iter().map(Element::clone_node).collect()
    }

    pub fn wait_for(&self, event_type: &str) -> Vec<Deferred<()>> {
        self.elements
            .iter()
            .map(|element| element.wait_for(event_type))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Elements {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// What a document-level call operates on.
#[derive(Debug, Clone)]
pub enum Subject {
    One(NodeRef),
    Many(Vec<NodeRef>),
}

impl From<NodeRef> for Subject {
    fn from(node: NodeRef) -> Self {
        Subject::One(node)
    }
}

impl From<&NodeRef> for Subject {
    fn from(node: &NodeRef) -> Self {
        Subject::One(node.clone())
    }
}

impl From<Vec<NodeRef>> for Subject {
    fn from(nodes: Vec<NodeRef>) -> Self {
        Subject::Many(nodes)
    }
}

impl From<&[NodeRef]> for Subject {
    fn from(nodes: &[NodeRef]) -> Self {
        Subject::Many(nodes.to_vec())
    }
}

pub enum View {
    One(Element),
    Many(Elements),
}

/// Result of a value-returning document-level call: one value per node.
#[derive(Debug)]
pub enum Each<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Each<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Each::One(value) => vec![value],
            Each::Many(values) => values,
        }
    }
}

impl Document {
    pub fn element(&self, node: &NodeRef) -> Element {
        self.observe(node);
        Element {
            document: self.clone(),
            node: node.clone(),
        }
    }

    pub fn elements(&self, nodes: impl IntoIterator<Item = NodeRef>) -> Elements {
        Elements {
            elements: nodes.into_iter().map(|node| self.element(&node)).collect(),
        }
    }

    pub fn view(&self, subject: impl Into<Subject>) -> View {
        match subject.into() {
            Subject::One(node) => View::One(self.element(&node)),
            Subject::Many(nodes) => View::Many(self.elements(nodes)),
        }
    }

    /// Elements matching `selector`, as a bulk view.
    pub fn select(&self, selector: &str) -> Result<Elements> {
        Ok(self.elements(self.query_all(selector)?))
    }

    pub fn set(&self, subject: impl Into<Subject>, descriptor: &Descriptor) -> Result<()> {
        match self.view(subject) {
            View::One(element) => element.set(descriptor).map(drop),
            View::Many(elements) => elements.set(descriptor).map(drop),
        }
    }

    pub fn apply(&self, subject: impl Into<Subject>, special: Special, value: impl Into<Value>) -> Result<()> {
        match self.view(subject) {
            View::One(element) => element.apply(special, value).map(drop),
            View::Many(elements) => elements.apply(special, value).map(drop),
        }
    }

    pub fn transition(
        &self,
        subject: impl Into<Subject>,
        props: &Descriptor,
        duration_ms: Option<u64>,
    ) -> Result<Each<Deferred<NodeRef>>> {
        Ok(match self.view(subject) {
            View::One(element) => Each::One(element.transition(props, duration_ms)?),
            View::Many(elements) => Each::Many(elements.transition(props, duration_ms)?),
        })
    }

    pub fn remove(&self, subject: impl Into<Subject>) {
        match self.view(subject) {
            View::One(element) => {
                element.remove();
            }
            View::Many(elements) => {
                elements.remove();
            }
        }
    }

    pub fn fire(&self, subject: impl Into<Subject>, event_type: &str, properties: Descriptor) -> Each<DispatchOutcome> {
        match self.view(subject) {
            View::One(element) => Each::One(element.fire(event_type, properties)),
            View::Many(elements) => Each::Many(elements.fire(event_type, properties)),
        }
    }

    pub fn clone_node(&self, subject: impl Into<Subject>) -> Each<Element> {
        match self.view(subject) {
            View::One(element) => Each::One(element.clone_node()),
            View::Many(elements) => Each::Many(elements.clone_node()),
        }
    }

    pub fn wait_for(&self, subject: impl Into<Subject>, event_type: &str) -> Each<Deferred<()>> {
        match self.view(subject) {
            View::One(element) => Each::One(element.wait_for(event_type)),
            View::Many(elements) => Each::Many(elements.wait_for(event_type)),
        }
    }

    /// Build an element from a descriptor; `tag` names it (default `div`).
    pub fn create(&self, descriptor: &Descriptor) -> Result<Element> {
        let node = set::create_from_descriptor(self, descriptor)?;
        Ok(self.element(&node))
    }

    pub fn create_with(&self, tag: &str, descriptor: &Descriptor) -> Result<Element> {
        let node = set::create_element_with(self, tag, descriptor)?;
        Ok(self.element(&node))
    }
}
