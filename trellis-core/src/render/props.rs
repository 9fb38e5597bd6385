//! VNode properties.
//!
//! Props are an insertion-ordered map from name to [`PropValue`]. Two
//! entries are special when a VNode is built: `key` is lifted out into
//! [`VNode::key`](super::VNode::key) and never reaches the host, and
//! `class` is normalized to a space-separated string by [`Props::class`].

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::vnode::Key;
use crate::reactive::{same_f64, RefValue};

/// An event handler prop. Compares by identity.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn()>);

impl EventHandler {
    pub fn new(handler: impl Fn() + 'static) -> Self {
        Self(Rc::new(handler))
    }

    /// Invoke the handler.
    pub fn call(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// The value of a single prop.
#[derive(Debug, Clone)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Handler(EventHandler),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            PropValue::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => same_f64(*a, *b),
            (PropValue::String(a), PropValue::String(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(value.into())
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(Rc::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(Rc::from(value))
    }
}

impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::String(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<Key> for PropValue {
    fn from(value: Key) -> Self {
        match value {
            Key::Str(s) => PropValue::String(s),
            Key::Int(n) => PropValue::Number(n as f64),
        }
    }
}

/// A `class` prop before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassValue {
    /// Used as is.
    Str(Rc<str>),
    /// Each entry normalized, then joined.
    List(Vec<ClassValue>),
    /// Names whose flag is set.
    Map(Vec<(Rc<str>, bool)>),
}

impl From<&str> for ClassValue {
    fn from(value: &str) -> Self {
        ClassValue::Str(Rc::from(value))
    }
}

impl From<String> for ClassValue {
    fn from(value: String) -> Self {
        ClassValue::Str(Rc::from(value))
    }
}

impl<T: Into<ClassValue>> From<Vec<T>> for ClassValue {
    fn from(value: Vec<T>) -> Self {
        ClassValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<[(&str, bool); N]> for ClassValue {
    fn from(value: [(&str, bool); N]) -> Self {
        ClassValue::Map(value.into_iter().map(|(name, on)| (Rc::from(name), on)).collect())
    }
}

/// Flatten a class value into a space-separated string.
pub fn normalize_class(value: &ClassValue) -> String {
    let mut out = String::new();
    push_class(value, &mut out);
    out
}

fn push_name(name: &str, out: &mut String) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(name);
}

fn push_class(value: &ClassValue, out: &mut String) {
    match value {
        ClassValue::Str(s) => push_name(s, out),
        ClassValue::Map(entries) => {
            for (name, on) in entries {
                if *on {
                    push_name(name, out);
                }
            }
        }
        ClassValue::List(items) => {
            for item in items {
                push_class(item, out);
            }
        }
    }
}

/// Insertion-ordered prop map.
///
/// # Example
///
/// ```rust
/// use trellis_core::render::Props;
///
/// let props = Props::new()
///     .attr("id", "main")
///     .class(vec!["a", "b"])
///     .key("row-1");
///
/// assert_eq!(props.get("class").and_then(|v| v.as_str()), Some("a b"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<Rc<str>, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prop.
    pub fn attr(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set the reconciliation key.
    pub fn key(self, key: impl Into<Key>) -> Self {
        self.attr("key", key.into())
    }

    /// Set the `class` prop, normalized.
    pub fn class(self, value: impl Into<ClassValue>) -> Self {
        let class = normalize_class(&value.into());
        self.attr("class", class)
    }

    /// Set an event handler: `on("click", f)` sets `onClick`.
    pub fn on(self, event: &str, handler: impl Fn() + 'static) -> Self {
        let key = event_prop_name(event);
        self.attr(&key, EventHandler::new(handler))
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropValue>) -> Option<PropValue> {
        self.entries.insert(Rc::from(key), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and convert the `key` prop.
    pub(crate) fn take_key(&mut self) -> Option<Key> {
        self.remove("key").map(Key::from)
    }
}

impl<K: AsRef<str>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (key, value) in iter {
            props.insert(key.as_ref(), value);
        }
        props
    }
}

impl RefValue for Props {
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}

/// `click` -> `onClick`
pub fn event_prop_name(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => "on".to_string(),
    }
}
