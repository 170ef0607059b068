use std::fmt;
use std::rc::{Rc, Weak};

use kuchiki::NodeRef;
use serde_json::Value as JsonValue;

use crate::dom::events::Event;

struct CallbackInner {
    f: Box<dyn Fn(&Event)>,
}

/// A listener callback. Identity is the shared allocation, so clones of one
/// `Callback` register, deduplicate and unregister as the same listener.
#[derive(Clone)]
pub struct Callback(Rc<CallbackInner>);

#[derive(Clone)]
pub(crate) struct WeakCallback(Weak<CallbackInner>);

impl Callback {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Callback(Rc::new(CallbackInner { f: Box::new(f) }))
    }

    /// Build a callback that can refer to its own identity, e.g. to unregister
    /// itself after running.
    pub(crate) fn new_cyclic(build: impl FnOnce(WeakCallback) -> Box<dyn Fn(&Event)>) -> Self {
        Callback(Rc::new_cyclic(|weak| CallbackInner {
            f: build(WeakCallback(weak.clone())),
        }))
    }

    pub fn call(&self, event: &Event) {
        (self.0.f)(event)
    }

    pub fn same(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl WeakCallback {
    pub(crate) fn upgrade(&self) -> Option<Callback> {
        self.0.upgrade().map(Callback)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:#x})", self.id())
    }
}

pub type Getter = Rc<dyn Fn(&NodeRef) -> Value>;
pub type Setter = Rc<dyn Fn(&NodeRef, Value)>;

/// A getter/setter pair installed as a node property.
#[derive(Clone, Default)]
pub struct Accessor {
    pub(crate) get: Option<Getter>,
    pub(crate) set: Option<Setter>,
}

impl Accessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn getter(mut self, get: impl Fn(&NodeRef) -> Value + 'static) -> Self {
        self.get = Some(Rc::new(get));
        self
    }

    pub fn setter(mut self, set: impl Fn(&NodeRef, Value) + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    fn same(&self, other: &Accessor) -> bool {
        let get_eq = match (&self.get, &other.get) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        let set_eq = match (&self.set, &other.set) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        get_eq && set_eq
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}

/// A descriptor value. Handlers pick the variants they understand.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(Descriptor),
    Node(NodeRef),
    Callback(Callback),
    Accessor(Accessor),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Descriptor> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Callback(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Falsy values are absent, except `0` which counts as content.
    pub fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(n) => !n.is_nan(),
            Value::Text(text) => !text.is_empty(),
            _ => true,
        }
    }

    /// Boolean conversion for reflected boolean attributes.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            other => other.is_present(),
        }
    }

    /// String coercion used for attribute and style writes.
    pub fn to_dom_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Text(text) => text.clone(),
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.to_dom_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[object Object]".to_string(),
            Value::Node(node) => match node.as_element() {
                Some(element) => format!("[object HTML{}Element]", capitalize(&element.name.local)),
                None => "[object Node]".to_string(),
            },
            Value::Callback(_) | Value::Accessor(_) => "function () { [native code] }".to_string(),
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        return format!("{n:.0}");
    }
    n.to_string()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Value::Callback(a), Value::Callback(b)) => a.same(b),
            (Value::Accessor(a), Value::Accessor(b)) => a.same(b),
            _ => false,
        }
    }
}

/// An insertion-ordered property bag. Keys are enumerated in the order they
/// were first inserted; re-inserting a key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Descriptor {
    entries: Vec<(String, Value)>,
}

impl Descriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Descriptor {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut descriptor = Descriptor::new();
        for (key, value) in iter {
            descriptor.insert(key, value);
        }
        descriptor
    }
}

impl IntoIterator for Descriptor {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Node(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl From<Accessor> for Value {
    fn from(value: Accessor) -> Self {
        Value::Accessor(value)
    }
}

impl From<Descriptor> for Value {
    fn from(value: Descriptor) -> Self {
        Value::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Vec<NodeRef>> for Value {
    fn from(value: Vec<NodeRef>) -> Self {
        Value::List(value.into_iter().map(Value::Node).collect())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(text) => Value::Text(text),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Map(Descriptor::from(map)),
        }
    }
}

impl From<serde_json::Map<String, JsonValue>> for Descriptor {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_coerce_like_dom_strings() {
        assert_eq!(Value::from(0).to_dom_string(), "0");
        assert_eq!(Value::from(42.0).to_dom_string(), "42");
        assert_eq!(Value::from(-3).to_dom_string(), "-3");
        assert_eq!(Value::from(0.5).to_dom_string(), "0.5");
        assert_eq!(Value::Number(f64::NAN).to_dom_string(), "NaN");
        assert_eq!(Value::Number(f64::INFINITY).to_dom_string(), "Infinity");
    }

    #[test]
    fn lists_and_maps_coerce() {
        let list = Value::List(vec![1.into(), "a".into(), Value::Null]);
        assert_eq!(list.to_dom_string(), "1,a,");
        assert_eq!(Value::Map(Descriptor::new()).to_dom_string(), "[object Object]");
    }

    #[test]
    fn zero_is_present_other_falsy_values_are_not() {
        assert!(Value::from(0).is_present());
        assert!(!Value::from(false).is_present());
        assert!(!Value::from("").is_present());
        assert!(!Value::Null.is_present());
        assert!(!Value::Number(f64::NAN).is_present());
        assert!(Value::from("x").is_present());
    }

    #[test]
    fn descriptor_keeps_insertion_order_and_replaces_in_place() {
        let mut descriptor = Descriptor::new().with("b", 1).with("a", 2);
        descriptor.insert("b", 3);
        let keys: Vec<_> = descriptor.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(descriptor.get("b"), Some(&Value::from(3)));
    }

    #[test]
    fn json_objects_preserve_key_order() {
        let value = Value::from(json!({"zeta": 1, "alpha": {"tag": "span"}, "mid": [0, "x"]}));
        let map = value.as_map().unwrap();
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            map.get("alpha").and_then(Value::as_map).and_then(|m| m.get("tag")),
            Some(&Value::from("span"))
        );
    }

    #[test]
    fn callback_identity_survives_clone() {
        let a = Callback::new(|_| {});
        let b = a.clone();
        let c = Callback::new(|_| {});
        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert_eq!(Value::from(a.clone()), Value::from(b));
    }
}
