use kuchiki::NodeRef;
use tracing::trace;

use super::Document;
use crate::value::{Accessor, Callback, Value};

/// String-valued properties that reflect an attribute.
const REFLECTED: &[(&str, &str)] = &[
    ("id", "id"),
    ("className", "class"),
    ("title", "title"),
    ("lang", "lang"),
    ("dir", "dir"),
    ("href", "href"),
    ("src", "src"),
    ("alt", "alt"),
    ("name", "name"),
    ("type", "type"),
    ("value", "value"),
    ("placeholder", "placeholder"),
    ("rel", "rel"),
    ("target", "target"),
    ("tabIndex", "tabindex"),
    ("htmlFor", "for"),
];

/// Boolean properties that reflect the presence of an attribute.
const REFLECTED_BOOLEAN: &[(&str, &str)] = &[
    ("hidden", "hidden"),
    ("disabled", "disabled"),
    ("checked", "checked"),
    ("readOnly", "readonly"),
    ("required", "required"),
    ("selected", "selected"),
    ("multiple", "multiple"),
    ("async", "async"),
    ("defer", "defer"),
    ("autofocus", "autofocus"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeProperty {
    Reflected(&'static str),
    Boolean(&'static str),
    TextContent,
}

#[derive(Clone)]
pub(crate) enum Property {
    Data(Value),
    Accessor(Accessor),
}

/// Own properties defined on a node at runtime, including `on<type>` slots.
#[derive(Default)]
pub(crate) struct Expandos {
    props: Vec<(String, Property)>,
}

impl Expandos {
    fn get(&self, name: &str) -> Option<&Property> {
        self.props
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, property)| property)
    }

    fn put(&mut self, name: &str, property: Property) {
        match self.props.iter_mut().find(|(existing, _)| existing == name) {
            Some(slot) => slot.1 = property,
            None => self.props.push((name.to_string(), property)),
        }
    }
}

pub fn is_event_handler_name(name: &str) -> bool {
    name.len() > 2
        && name.starts_with("on")
        && name[2..].chars().all(|ch| ch.is_ascii_lowercase())
}

fn native_property(node: &NodeRef, name: &str) -> Option<NativeProperty> {
    if node.as_text().is_some() {
        return matches!(name, "textContent" | "data" | "nodeValue")
            .then_some(NativeProperty::TextContent);
    }
    node.as_element()?;
    if name == "textContent" {
        return Some(NativeProperty::TextContent);
    }
    if let Some((_, attribute)) = REFLECTED.iter().find(|(prop, _)| *prop == name) {
        return Some(NativeProperty::Reflected(attribute));
    }
    REFLECTED_BOOLEAN
        .iter()
        .find(|(prop, _)| *prop == name)
        .map(|(_, attribute)| NativeProperty::Boolean(attribute))
}

fn set_text_content(node: &NodeRef, text: &str) {
    if let Some(data) = node.as_text() {
        *data.borrow_mut() = text.to_string();
        return;
    }
    while let Some(child) = node.first_child() {
        child.detach();
    }
    if !text.is_empty() {
        node.append(NodeRef::new_text(text));
    }
}

impl Document {
    /// Whether assigning `name` on `node` hits an existing property rather
    /// than falling through to an attribute.
    pub fn has_property(&self, node: &NodeRef, name: &str) -> bool {
        if native_property(node, name).is_some() {
            return true;
        }
        if node.as_element().is_some() && is_event_handler_name(name) {
            return true;
        }
        self.inner
            .expandos
            .borrow()
            .get(node)
            .map(|expandos| expandos.get(name).is_some())
            .unwrap_or(false)
    }

    pub fn get_property(&self, node: &NodeRef, name: &str) -> Option<Value> {
        if let Some(native) = native_property(node, name) {
            return Some(match native {
                NativeProperty::TextContent => Value::Text(node.text_contents()),
                NativeProperty::Reflected(attribute) => Value::Text(
                    node.as_element()
                        .and_then(|element| {
                            element.attributes.borrow().get(attribute).map(str::to_string)
                        })
                        .unwrap_or_default(),
                ),
                NativeProperty::Boolean(attribute) => Value::Bool(
                    node.as_element()
                        .map(|element| element.attributes.borrow().contains(attribute))
                        .unwrap_or(false),
                ),
            });
        }

        let property = self
            .inner
            .expandos
            .borrow()
            .get(node)
            .and_then(|expandos| expandos.get(name).cloned());
        match property {
            Some(Property::Data(value)) => Some(value),
            Some(Property::Accessor(accessor)) => {
                Some(accessor.get.map(|get| get(node)).unwrap_or(Value::Null))
            }
            None if node.as_element().is_some() && is_event_handler_name(name) => {
                Some(Value::Null)
            }
            None => None,
        }
    }

    /// Assignment semantics: native setters, then accessor setters, then a
    /// plain data property.
    pub fn set_property(&self, node: &NodeRef, name: &str, value: Value) {
        if let Some(native) = native_property(node, name) {
            match native {
                NativeProperty::TextContent => set_text_content(node, &value.to_dom_string()),
                NativeProperty::Reflected(attribute) => {
                    if let Some(element) = node.as_element() {
                        element
                            .attributes
                            .borrow_mut()
                            .insert(attribute, value.to_dom_string());
                    }
                }
                NativeProperty::Boolean(attribute) => {
                    if let Some(element) = node.as_element() {
                        let mut attributes = element.attributes.borrow_mut();
                        if value.is_truthy() {
                            attributes.insert(attribute, String::new());
                        } else {
                            attributes.remove(attribute);
                        }
                    }
                }
            }
            return;
        }

        let existing = self
            .inner
            .expandos
            .borrow()
            .get(node)
            .and_then(|expandos| expandos.get(name).cloned());
        if let Some(Property::Accessor(accessor)) = existing {
            match accessor.set {
                Some(set) => set(node, value),
                None => trace!(target: "bliss::set", property = name, "ignoring write to getter-only property"),
            }
            return;
        }

        let value = if is_event_handler_name(name) && value.as_callback().is_none() {
            Value::Null
        } else {
            value
        };
        self.inner
            .expandos
            .borrow_mut()
            .entry(node)
            .put(name, Property::Data(value));
    }

    /// Install a property wholesale, replacing whatever was there.
    pub(crate) fn define_property(&self, node: &NodeRef, name: &str, property: Property) {
        self.inner
            .expandos
            .borrow_mut()
            .entry(node)
            .put(name, property);
    }

    /// The `on<type>` handler currently set on `node`, if it is callable.
    pub(crate) fn inline_handler(&self, node: &NodeRef, event_type: &str) -> Option<Callback> {
        let name = format!("on{event_type}");
        match self
            .inner
            .expandos
            .borrow()
            .get(node)
            .and_then(|expandos| expandos.get(&name))
        {
            Some(Property::Data(Value::Callback(callback))) => Some(callback.clone()),
            _ => None,
        }
    }

    /// Every `on<type>` slot on `node` that holds a handler.
    pub(crate) fn inline_handlers(&self, node: &NodeRef) -> Vec<(String, Callback)> {
        self.inner
            .expandos
            .borrow()
            .get(node)
            .map(|expandos| {
                expandos
                    .props
                    .iter()
                    .filter_map(|(name, property)| match property {
                        Property::Data(Value::Callback(callback)) if is_event_handler_name(name) => {
                            Some((name.clone(), callback.clone()))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
