use std::{
    collections::BTreeMap,
    fmt,
    ops::Deref,
    sync::{Mutex, OnceLock, PoisonError},
};

use crate::{error::Error, result::Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// A read-only view over a decoded JSON object.
///
/// Nested values are converted on first read of the key holding them:
/// objects become [`LazyView`]s, arrays become [`Sequence`]s, scalars are
/// kept as they are. A converted value is cached, so every later read of the
/// same key returns the very same [`Node`].
///
/// # Example
///
/// ```rust
/// use lazy4chan::lazy::LazyView;
/// use serde_json::json;
///
/// let post = LazyView::from_value(json!({"no": 1, "sub": "hi"})).unwrap();
/// assert_eq!(post.attr("no").unwrap().as_u64(), Some(1));
/// assert_eq!(post.attr("sub").unwrap().as_str(), Some("hi"));
/// assert!(post.attr("com").is_err());
/// ```
#[derive(Default)]
pub struct LazyView {
    slots: BTreeMap<String, Slot>,
}

impl LazyView {
    /// Wraps `map` without converting any of its values.
    pub fn new(map: Map<String, Value>) -> Self {
        let slots = map.into_iter().map(|(k, v)| (k, Slot::new(v))).collect();
        LazyView { slots }
    }

    /// Wraps a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedPayload`] if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            other => Err(Error::UnexpectedPayload(format!(
                "expected an object, found {}",
                kind(&other)
            ))),
        }
    }

    /// Returns the value stored at `key`, converting it on first read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the view has no such key.
    pub fn get(&self, key: &str) -> Result<&Node> {
        self.try_get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_owned()))
    }

    /// Attribute-style read: same as [`get`](LazyView::get), but a missing
    /// key is reported as a missing attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeNotFound`] if the view has no such key.
    pub fn attr(&self, name: &str) -> Result<&Node> {
        self.try_get(name)
            .ok_or_else(|| Error::AttributeNotFound(name.to_owned()))
    }

    /// Returns the value stored at `key`, or `None` if it is absent.
    pub fn try_get(&self, key: &str) -> Option<&Node> {
        self.slots.get(key).map(Slot::node)
    }

    /// Returns `true` if the view holds `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Returns `true` if the value at `key` has already been read.
    pub fn is_converted(&self, key: &str) -> bool {
        self.slots.get(key).is_some_and(Slot::is_converted)
    }

    /// Iterates over the keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Iterates over the entries in key order, converting each value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.slots.iter().map(|(k, slot)| (k.as_str(), slot.node()))
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the view holds no keys.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl From<Map<String, Value>> for LazyView {
    fn from(map: Map<String, Value>) -> Self {
        Self::new(map)
    }
}

impl fmt::Debug for LazyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.slots.iter()).finish()
    }
}

impl Serialize for LazyView {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.slots.iter())
    }
}

/// One key of a [`LazyView`]: the raw value until first read, the
/// converted [`Node`] afterwards.
struct Slot {
    raw: Mutex<Option<Value>>,
    node: OnceLock<Node>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Slot {
            raw: Mutex::new(Some(value)),
            node: OnceLock::new(),
        }
    }

    fn node(&self) -> &Node {
        self.node.get_or_init(|| {
            let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner).take();
            Node::from(raw.unwrap_or(Value::Null))
        })
    }

    fn is_converted(&self) -> bool {
        self.node.get().is_some()
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(node) = self.node.get() {
            return fmt::Debug::fmt(node, f);
        }
        match &*self.raw.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(raw) => write!(f, "{raw}"),
            None => f.write_str("<converting>"),
        }
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        {
            let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(value) = raw.as_ref() {
                return value.serialize(serializer);
            }
        }
        // raw is gone, so the conversion has run (or is finishing)
        self.node().serialize(serializer)
    }
}

/// A converted JSON value, as returned by [`LazyView::get`].
#[derive(Debug)]
pub enum Node {
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// Any JSON number.
    Number(Number),
    /// A JSON string.
    String(String),
    /// A nested object, itself converted lazily.
    Object(LazyView),
    /// A nested array.
    Array(Sequence),
}

impl Node {
    /// Keyed read on an object node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the node is not an object
    /// or has no such key.
    pub fn get(&self, key: &str) -> Result<&Node> {
        match self {
            Node::Object(view) => view.get(key),
            _ => Err(Error::KeyNotFound(key.to_owned())),
        }
    }

    /// Attribute-style read on an object node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeNotFound`] if the node is not an object
    /// or has no such key.
    pub fn attr(&self, name: &str) -> Result<&Node> {
        match self {
            Node::Object(view) => view.attr(name),
            _ => Err(Error::AttributeNotFound(name.to_owned())),
        }
    }

    /// Returns `true` for `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Returns the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as `i64`, if it is one and fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as `u64`, if it is one and fits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    /// Returns the number as `f64`, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the nested view, if this is an object.
    pub fn as_view(&self) -> Option<&LazyView> {
        match self {
            Node::Object(view) => Some(view),
            _ => None,
        }
    }

    /// Returns the sequence, if this is an array.
    pub fn as_seq(&self) -> Option<&Sequence> {
        match self {
            Node::Array(seq) => Some(seq),
            _ => None,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Object(map) => Node::Object(LazyView::new(map)),
            Value::Array(items) => Node::Array(items.into_iter().collect()),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(n) => n.serialize(serializer),
            Node::String(s) => serializer.serialize_str(s),
            Node::Object(view) => view.serialize(serializer),
            Node::Array(seq) => seq.serialize(serializer),
        }
    }
}

/// An immutable, ordered sequence of converted values.
#[derive(Debug, Default)]
pub struct Sequence(Box<[Node]>);

impl Deref for Sequence {
    type Target = [Node];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Sequence(iter.into_iter().map(Node::from).collect())
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
