//! Host DOM layer: a `kuchiki` tree plus the side tables the browser would
//! normally keep on the nodes themselves (native listeners, expando
//! properties, timers).

pub mod events;
pub mod properties;
pub mod style;
pub mod timers;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::*;
use kuchiki::{Attribute, ExpandedName, Node, NodeData, NodeRef, Selectors};
use tracing::debug;

use crate::config::BlissConfig;
use crate::deferred::Deferred;
use crate::error::{BlissError, Result};
use crate::shadow::ShadowStore;
use crate::value::Callback;

use self::events::{Event, TargetListeners};
use self::properties::Expandos;
use self::timers::TimerManager;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
const PRUNE_INTERVAL: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Side table keyed by node identity. Entries hold a weak reference to their
/// node, which also pins the allocation so an address is never reused while
/// an entry for it exists.
pub(crate) struct NodeTable<T> {
    entries: HashMap<usize, (Weak<Node>, T)>,
    inserts: usize,
}

impl<T> Default for NodeTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            inserts: 0,
        }
    }
}

impl<T: Default> NodeTable<T> {
    fn key(node: &NodeRef) -> usize {
        Rc::as_ptr(&node.0) as usize
    }

    pub(crate) fn get(&self, node: &NodeRef) -> Option<&T> {
        self.entries
            .get(&Self::key(node))
            .filter(|(weak, _)| weak.strong_count() > 0)
            .map(|(_, value)| value)
    }

    pub(crate) fn get_mut(&mut self, node: &NodeRef) -> Option<&mut T> {
        self.entries
            .get_mut(&Self::key(node))
            .filter(|(weak, _)| weak.strong_count() > 0)
            .map(|(_, value)| value)
    }

    pub(crate) fn contains(&self, node: &NodeRef) -> bool {
        self.get(node).is_some()
    }

    pub(crate) fn entry(&mut self, node: &NodeRef) -> &mut T {
        let key = Self::key(node);
        if !self.entries.contains_key(&key) {
            self.inserts += 1;
            if self.inserts % PRUNE_INTERVAL == 0 {
                self.prune();
            }
        }
        &mut self
            .entries
            .entry(key)
            .or_insert_with(|| (Rc::downgrade(&node.0), T::default()))
            .1
    }

    fn prune(&mut self) {
        self.entries.retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}

pub(crate) struct DocumentInner {
    root: NodeRef,
    config: BlissConfig,
    ready_state: Cell<ReadyState>,
    pub(crate) targets: RefCell<NodeTable<TargetListeners>>,
    pub(crate) shadow: RefCell<ShadowStore>,
    pub(crate) expandos: RefCell<NodeTable<Expandos>>,
    pub(crate) timers: Rc<TimerManager>,
}

/// Handle to a DOM tree and its bookkeeping. Clones share the same document.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Rc<DocumentInner>,
}

#[derive(Clone)]
pub(crate) struct WeakDocument(Weak<DocumentInner>);

impl WeakDocument {
    pub(crate) fn upgrade(&self) -> Option<Document> {
        self.0.upgrade().map(|inner| Document { inner })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::parse("")
    }

    pub fn parse(html: &str) -> Self {
        Self::with_config(html, BlissConfig::default())
    }

    pub fn with_config(html: &str, config: BlissConfig) -> Self {
        let root = kuchiki::parse_html().one(html);
        Self {
            inner: Rc::new(DocumentInner {
                root,
                config,
                ready_state: Cell::new(ReadyState::Complete),
                targets: RefCell::new(NodeTable::default()),
                shadow: RefCell::new(ShadowStore::default()),
                expandos: RefCell::new(NodeTable::default()),
                timers: Rc::new(TimerManager::new()),
            }),
        }
    }

    /// A document whose parser has not finished yet; see [`Document::finish_parsing`].
    pub fn loading(html: &str) -> Self {
        let document = Self::parse(html);
        document.inner.ready_state.set(ReadyState::Loading);
        document
    }

    pub(crate) fn downgrade(&self) -> WeakDocument {
        WeakDocument(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &BlissConfig {
        &self.inner.config
    }

    pub fn root(&self) -> NodeRef {
        self.inner.root.clone()
    }

    pub fn head(&self) -> Option<NodeRef> {
        self.query("head").ok().flatten()
    }

    pub fn body(&self) -> Option<NodeRef> {
        self.query("body").ok().flatten()
    }

    pub fn to_html(&self) -> String {
        self.inner.root.to_string()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.ready_state.get()
    }

    pub fn finish_parsing(&self) {
        if self.ready_state() != ReadyState::Loading {
            return;
        }
        self.inner.ready_state.set(ReadyState::Interactive);
        debug!(target: "bliss::events", "document interactive");
        self.dispatch_event(&self.root(), &Event::new("DOMContentLoaded").bubbling(true));
    }

    /// Resolves once the document is no longer loading.
    pub fn ready(&self) -> Deferred<()> {
        if self.ready_state() != ReadyState::Loading {
            return Deferred::resolved(());
        }

        let (deferred, resolver) = Deferred::new();
        let callback = Callback::new(move |_event| resolver.resolve(()));
        self.add_native_listener(&self.root(), "DOMContentLoaded", &callback, false);
        deferred
    }

    pub fn create_element(&self, tag: &str) -> NodeRef {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag.to_ascii_lowercase()),
        );
        NodeRef::new_element(name, std::iter::empty::<(ExpandedName, Attribute)>())
    }

    pub fn create_text(&self, text: &str) -> NodeRef {
        NodeRef::new_text(text)
    }

    pub fn query(&self, selector: &str) -> Result<Option<NodeRef>> {
        Ok(self.query_all(selector)?.into_iter().next())
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeRef>> {
        query_all_in(&self.inner.root, selector)
    }

    pub fn matches(&self, node: &NodeRef, selector: &str) -> Result<bool> {
        let selectors = compile(selector)?;
        Ok(matches_compiled(node, &selectors))
    }

    /// Run timer callbacks whose deadline has passed.
    pub fn pump(&self) -> bool {
        let mut did_work = false;
        while self.inner.timers.run_due() {
            did_work = true;
        }
        did_work
    }

    pub fn has_pending_timers(&self) -> bool {
        self.inner.timers.has_active_timers()
    }
}

pub(crate) fn compile(selector: &str) -> Result<Selectors> {
    Selectors::compile(selector).map_err(|()| BlissError::InvalidSelector(selector.to_string()))
}

pub(crate) fn matches_compiled(node: &NodeRef, selectors: &Selectors) -> bool {
    node.clone()
        .into_element_ref()
        .map(|element| selectors.matches(&element))
        .unwrap_or(false)
}

/// Elements under `context` (inclusive) matching `selector`, in document order.
pub fn query_all_in(context: &NodeRef, selector: &str) -> Result<Vec<NodeRef>> {
    let selectors = compile(selector)?;
    Ok(context
        .inclusive_descendants()
        .filter(|node| matches_compiled(node, &selectors))
        .collect())
}

pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(&a.0, &b.0)
}

/// Where children of `node` live: the content fragment for templates.
pub fn content_container(node: &NodeRef) -> NodeRef {
    node.as_element()
        .and_then(|element| element.template_contents.clone())
        .unwrap_or_else(|| node.clone())
}

fn ensure_insertable(parent: &NodeRef, child: &NodeRef) -> Result<()> {
    if parent
        .inclusive_ancestors()
        .any(|ancestor| same_node(&ancestor, child))
    {
        return Err(BlissError::HierarchyRequest);
    }
    Ok(())
}

pub fn append_child(parent: &NodeRef, child: &NodeRef) -> Result<()> {
    ensure_insertable(parent, child)?;
    parent.append(child.clone());
    Ok(())
}

pub fn prepend_child(parent: &NodeRef, child: &NodeRef) -> Result<()> {
    ensure_insertable(parent, child)?;
    parent.prepend(child.clone());
    Ok(())
}

/// Insert `node` as the previous sibling of `reference`.
pub fn insert_before(reference: &NodeRef, node: &NodeRef) -> Result<()> {
    let parent = reference.parent().ok_or(BlissError::Detached)?;
    if same_node(reference, node) {
        return Ok(());
    }
    ensure_insertable(&parent, node)?;
    reference.insert_before(node.clone());
    Ok(())
}

/// Insert `node` as the next sibling of `reference`.
pub fn insert_after(reference: &NodeRef, node: &NodeRef) -> Result<()> {
    let parent = reference.parent().ok_or(BlissError::Detached)?;
    if same_node(reference, node) {
        return Ok(());
    }
    ensure_insertable(&parent, node)?;
    reference.insert_after(node.clone());
    Ok(())
}

/// Deep structural copy. Listeners and expando properties stay behind.
pub fn clone_tree(node: &NodeRef) -> NodeRef {
    let copy = shallow_clone(node);

    if let (Some(source), Some(target)) = (template_contents(node), template_contents(&copy)) {
        for child in source.children() {
            target.append(clone_tree(&child));
        }
    }

    for child in node.children() {
        copy.append(clone_tree(&child));
    }
    copy
}

fn template_contents(node: &NodeRef) -> Option<NodeRef> {
    node.as_element()
        .and_then(|element| element.template_contents.clone())
}

fn shallow_clone(node: &NodeRef) -> NodeRef {
    match node.data() {
        NodeData::Element(element) => NodeRef::new_element(
            element.name.clone(),
            element.attributes.borrow().map.clone(),
        ),
        NodeData::Text(text) => NodeRef::new_text(text.borrow().clone()),
        NodeData::Comment(text) => NodeRef::new_comment(text.borrow().clone()),
        NodeData::ProcessingInstruction(contents) => {
            let (target, data) = contents.borrow().clone();
            NodeRef::new_processing_instruction(target, data)
        }
        NodeData::Doctype(doctype) => NodeRef::new_doctype(
            doctype.name.clone(),
            doctype.public_id.clone(),
            doctype.system_id.clone(),
        ),
        NodeData::Document(_) => NodeRef::new_document(),
        NodeData::DocumentFragment => NodeRef::new(NodeData::DocumentFragment),
    }
}
