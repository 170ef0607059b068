//! Special properties understood by `set`. Each handler owns one
//! configuration concern and mutates only the node it is applied to.

use std::rc::Rc;

use kuchiki::{NodeRef, Selectors};
use tracing::{debug, trace};

use crate::dom::events::Event;
use crate::dom::properties::Property;
use crate::dom::style::set_style_property;
use crate::dom::{self, Document};
use crate::error::{BlissError, Result};
use crate::set::create_from_descriptor;
use crate::value::{number_to_string, Callback, Descriptor, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Style,
    Attributes,
    Properties,
    Events,
    Once,
    Delegate,
    Contents,
    Inside,
    Before,
    After,
    Start,
    Around,
}

const REGISTRY: &[(&str, Special)] = &[
    ("style", Special::Style),
    ("attributes", Special::Attributes),
    ("properties", Special::Properties),
    ("events", Special::Events),
    ("once", Special::Once),
    ("delegate", Special::Delegate),
    ("contents", Special::Contents),
    ("inside", Special::Inside),
    ("before", Special::Before),
    ("after", Special::After),
    ("start", Special::Start),
    ("around", Special::Around),
];

impl Special {
    pub fn lookup(name: &str) -> Option<Special> {
        REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, special)| *special)
    }

    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, special)| *special == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    pub fn all() -> impl Iterator<Item = Special> {
        REGISTRY.iter().map(|(_, special)| *special)
    }

    pub(crate) fn apply(self, document: &Document, node: &NodeRef, value: &Value) -> Result<()> {
        trace!(target: "bliss::set", handler = self.name(), "applying special property");
        match self {
            Special::Style => style(node, expect_map(value, "style")?),
            Special::Attributes => attributes(node, expect_map(value, "attributes")?),
            Special::Properties => properties(document, node, expect_map(value, "properties")?),
            Special::Events => events(document, node, value),
            Special::Once => {
                for (types, callback) in expect_map(value, "once")?.iter() {
                    once(document, node, types, expect_callback(callback, "once")?);
                }
                Ok(())
            }
            Special::Delegate => delegate(document, node, expect_map(value, "delegate")?),
            Special::Contents => contents(document, node, value),
            Special::Inside => inside(node, expect_node(value, "inside")?),
            Special::Before => before(node, expect_node(value, "before")?),
            Special::After => after(node, expect_node(value, "after")?),
            Special::Start => start(node, expect_node(value, "start")?),
            Special::Around => around(node, expect_node(value, "around")?),
        }
    }
}

fn expect_map<'a>(value: &'a Value, handler: &'static str) -> Result<&'a Descriptor> {
    value
        .as_map()
        .ok_or_else(|| BlissError::invalid(handler, "a map"))
}

fn expect_node<'a>(value: &'a Value, handler: &'static str) -> Result<&'a NodeRef> {
    value
        .as_node()
        .ok_or_else(|| BlissError::invalid(handler, "a node"))
}

fn expect_callback<'a>(value: &'a Value, handler: &'static str) -> Result<&'a Callback> {
    value
        .as_callback()
        .ok_or_else(|| BlissError::invalid(handler, "a callback"))
}

/// Merge declarations into the inline style; `null` clears one.
pub(crate) fn style(node: &NodeRef, declarations: &Descriptor) -> Result<()> {
    for (name, value) in declarations.iter() {
        let value = match value {
            Value::Null => String::new(),
            other => other.to_dom_string(),
        };
        set_style_property(node, name, &value);
    }
    Ok(())
}

pub(crate) fn set_attribute(node: &NodeRef, name: &str, value: &Value) -> Result<()> {
    let element = node
        .as_element()
        .ok_or_else(|| BlissError::invalid("attributes", "an element"))?;
    element
        .attributes
        .borrow_mut()
        .insert(name, value.to_dom_string());
    Ok(())
}

pub(crate) fn attributes(node: &NodeRef, attributes: &Descriptor) -> Result<()> {
    for (name, value) in attributes.iter() {
        set_attribute(node, name, value)?;
    }
    Ok(())
}

/// Accessors are installed as-is; anything else is assigned.
pub(crate) fn properties(document: &Document, node: &NodeRef, props: &Descriptor) -> Result<()> {
    for (name, value) in props.iter() {
        match value {
            Value::Accessor(accessor) => {
                document.define_property(node, name, Property::Accessor(accessor.clone()))
            }
            other => document.set_property(node, name, other.clone()),
        }
    }
    Ok(())
}

pub(crate) fn events(document: &Document, node: &NodeRef, value: &Value) -> Result<()> {
    match value {
        Value::Node(source) => {
            copy_events(document, source, node);
            Ok(())
        }
        Value::Map(bindings) => {
            for (types, callback) in bindings.iter() {
                let callback = expect_callback(callback, "events")?;
                for event_type in types.split_whitespace() {
                    document.add_event_listener(node, event_type, callback, false);
                }
            }
            Ok(())
        }
        _ => Err(BlissError::invalid("events", "a node or a map of callbacks")),
    }
}

/// Replay every tracked listener and inline handler of `source` onto `target`.
pub(crate) fn copy_events(document: &Document, source: &NodeRef, target: &NodeRef) {
    document.observe(target);
    let records = document.listeners(source);
    debug!(target: "bliss::events", count = records.len(), "copying listeners");
    for record in records {
        document.add_event_listener(target, &record.event_type, &record.callback, record.capture);
    }
    for (name, handler) in document.inline_handlers(source) {
        document.set_property(target, &name, Value::Callback(handler));
    }
}

/// Register `callback` for each whitespace-separated type so that it
/// unregisters itself, under its own identity, on first invocation.
pub(crate) fn once(document: &Document, node: &NodeRef, types: &str, callback: &Callback) {
    for event_type in types.split_whitespace() {
        let wrapper = once_wrapper(document, event_type, callback.clone());
        document.add_event_listener(node, event_type, &wrapper, false);
    }
}

fn once_wrapper(document: &Document, event_type: &str, original: Callback) -> Callback {
    let document = document.downgrade();
    let event_type = event_type.to_string();
    Callback::new_cyclic(move |me| {
        Box::new(move |event: &Event| {
            if let (Some(document), Some(node), Some(me)) =
                (document.upgrade(), event.current_target(), me.upgrade())
            {
                document.remove_event_listener(&node, &event_type, &me, false);
            }
            original.call(event);
        })
    })
}

/// One real listener per type; on dispatch every selector that matches the
/// event target fires, in declaration order. Ancestors of the target are
/// not considered.
pub(crate) fn delegate(document: &Document, node: &NodeRef, routes: &Descriptor) -> Result<()> {
    for (event_type, by_selector) in routes.iter() {
        let by_selector = by_selector
            .as_map()
            .ok_or_else(|| BlissError::invalid("delegate", "a map of selectors to callbacks"))?;

        let mut compiled: Vec<(Selectors, Callback)> = Vec::with_capacity(by_selector.len());
        for (selector, callback) in by_selector.iter() {
            compiled.push((
                dom::compile(selector)?,
                expect_callback(callback, "delegate")?.clone(),
            ));
        }
        let compiled = Rc::new(compiled);

        let listener = Callback::new(move |event| {
            let Some(target) = event.target() else {
                return;
            };
            for (selectors, callback) in compiled.iter() {
                if dom::matches_compiled(&target, selectors) {
                    callback.call(event);
                }
            }
        });
        document.add_event_listener(node, event_type, &listener, false);
    }
    Ok(())
}

pub(crate) fn contents(document: &Document, node: &NodeRef, value: &Value) -> Result<()> {
    if !value.is_present() {
        return Ok(());
    }

    let items = match value {
        Value::List(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };
    for item in items {
        let child = match item {
            Value::Text(text) => document.create_text(text),
            Value::Number(n) => document.create_text(&number_to_string(*n)),
            Value::Map(descriptor) => create_from_descriptor(document, descriptor)?,
            Value::Node(child) => child.clone(),
            _ => continue,
        };
        dom::append_child(node, &child)?;
    }
    Ok(())
}

pub(crate) fn inside(node: &NodeRef, target: &NodeRef) -> Result<()> {
    dom::append_child(target, node)
}

pub(crate) fn before(node: &NodeRef, target: &NodeRef) -> Result<()> {
    dom::insert_before(target, node)
}

pub(crate) fn after(node: &NodeRef, target: &NodeRef) -> Result<()> {
    dom::insert_after(target, node)
}

pub(crate) fn start(node: &NodeRef, target: &NodeRef) -> Result<()> {
    dom::prepend_child(target, node)
}

/// Take `target`'s place and move it inside `node` (into the content
/// fragment when `node` is a template).
pub(crate) fn around(node: &NodeRef, target: &NodeRef) -> Result<()> {
    if target.parent().is_some() {
        dom::insert_before(target, node)?;
    }
    dom::append_child(&dom::content_container(node), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_round_trips_names() {
        for special in Special::all() {
            assert_eq!(Special::lookup(special.name()), Some(special));
        }
        assert_eq!(Special::lookup("tag"), None);
        assert_eq!(Special::lookup("Style"), None);
    }

    #[test]
    fn style_merges_without_clobbering() {
        let document = Document::parse(r#"<div id="box" style="color: red; margin: 0"></div>"#);
        let node = document.query("#box").unwrap().unwrap();
        style(
            &node,
            &Descriptor::new()
                .with("color", "blue")
                .with("paddingTop", "4px")
                .with("margin", Value::Null),
        )
        .unwrap();
        assert_eq!(
            node.to_string(),
            r#"<div id="box" style="color: blue; padding-top: 4px;"></div>"#
        );
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let document = Document::new();
        let node = document.create_element("div");
        assert_eq!(
            Special::Inside.apply(&document, &node, &Value::from("body")),
            Err(BlissError::invalid("inside", "a node"))
        );
        assert!(Special::Style.apply(&document, &node, &Value::from(3)).is_err());
    }

    #[test]
    fn around_wraps_in_place() {
        let document = Document::parse(r#"<p id="p">a<b id="b">x</b>c</p>"#);
        let b = document.query("#b").unwrap().unwrap();
        let wrapper = document.create_element("em");
        around(&wrapper, &b).unwrap();
        let p = document.query("#p").unwrap().unwrap();
        assert_eq!(p.to_string(), r#"<p id="p">a<em><b id="b">x</b></em>c</p>"#);
    }

    #[test]
    fn around_detached_target_just_nests() {
        let document = Document::new();
        let target = document.create_element("span");
        let wrapper = document.create_element("div");
        around(&wrapper, &target).unwrap();
        assert_eq!(wrapper.to_string(), "<div><span></span></div>");
    }

    #[test]
    fn placements() {
        let document = Document::parse(r#"<ul id="list"><li id="mid">m</li></ul>"#);
        let list = document.query("#list").unwrap().unwrap();
        let mid = document.query("#mid").unwrap().unwrap();

        let first = document.create_text("1");
        let last = document.create_text("4");
        let prev = document.create_text("2");
        let next = document.create_text("3");
        start(&first, &list).unwrap();
        inside(&last, &list).unwrap();
        before(&prev, &mid).unwrap();
        after(&next, &mid).unwrap();

        assert_eq!(
            list.to_string(),
            r#"<ul id="list">12<li id="mid">m</li>34</ul>"#
        );
    }
}
