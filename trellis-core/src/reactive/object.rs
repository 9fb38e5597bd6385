//! Reactive Objects
//!
//! Rust has no transparent property interception, so reactive objects are
//! explicit accessor types:
//!
//! - [`Object`] is the raw property bag. It carries a [`SourceId`] and
//!   nothing else reactive; reading or writing it is never tracked.
//! - [`Reactive`] wraps an `Object` and calls [`Runtime::track`] on every
//!   read and [`Runtime::trigger`] on every write.
//!
//! Dependencies are keyed by the raw object's ID, so any number of wrapper
//! handles observe the same Deps. [`reactive`] returns the same wrapper for
//! the same object for as long as that wrapper is alive.
//!
//! # Deep Reactivity
//!
//! Nested objects are stored raw. Reading one through a `Reactive` returns
//! it wrapped, so reactivity extends to any depth lazily, on access.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use super::equality::{same_f64, RefValue};
use super::runtime::{DepKey, Runtime};
use super::subscriber::SourceId;

/// A dynamically typed value stored in reactive objects.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw object. Reads and writes are not tracked.
    Object(Object),
    /// A reactive wrapper around an object.
    Reactive(Reactive),
}

impl Value {
    /// Check for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check for an object, raw or wrapped.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The underlying raw object, unwrapping a reactive wrapper.
    pub fn as_object(&self) -> Option<Object> {
        match self {
            Value::Object(object) => Some(object.clone()),
            Value::Reactive(reactive) => Some(reactive.to_raw()),
            _ => None,
        }
    }

    /// The object as a reactive wrapper.
    pub fn as_reactive(&self) -> Option<Reactive> {
        match self {
            Value::Object(object) => Some(reactive(object)),
            Value::Reactive(reactive) => Some(reactive.clone()),
            _ => None,
        }
    }
}

impl RefValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => same_f64(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn to_reactive(&self) -> Self {
        match self {
            Value::Object(object) => Value::Reactive(reactive(object)),
            other => other.clone(),
        }
    }

    fn to_raw(&self) -> Self {
        match self {
            Value::Reactive(reactive) => Value::Object(reactive.to_raw()),
            other => other.clone(),
        }
    }

    fn traverse(&self, seen: &mut HashSet<SourceId>) {
        if let Some(reactive) = self.as_reactive() {
            reactive.traverse(seen);
        }
    }
}

/// Same-value equality: NaN equals NaN, objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(object) => object.fmt(f),
            Value::Reactive(reactive) => reactive.fmt(f),
        }
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
        Value::Number(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Rc::from(value))
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Reactive> for Value {
    fn from(value: Reactive) -> Self {
        Value::Reactive(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// JSON arrays become objects keyed by index.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), Value::from(item)))
                    .collect(),
            ),
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, item)| (key, Value::from(item)))
                    .collect(),
            ),
        }
    }
}

/// Serializes the current contents without tracking. Cyclic objects are
/// not supported.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Object(object) => object.serialize(serializer),
            Value::Reactive(reactive) => reactive.to_raw().serialize(serializer),
        }
    }
}

struct ObjectData {
    id: SourceId,
    props: RefCell<IndexMap<Rc<str>, Value>>,
    /// The live reactive wrapper, if any.
    proxy: RefCell<Weak<ReactiveInner>>,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        Runtime::release_source(self.id);
    }
}

/// A raw, identity-carrying property bag.
///
/// Cloning an `Object` clones the handle; both handles refer to the same
/// properties.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectData {
            id: SourceId::new(),
            props: RefCell::new(IndexMap::new()),
            proxy: RefCell::new(Weak::new()),
        }))
    }

    /// Get the source ID that reactive reads and writes are keyed by.
    pub fn id(&self) -> SourceId {
        self.0.id
    }

    /// Read a property without tracking.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.0.props.borrow().get(key).cloned()
    }

    /// Write a property without triggering. Returns the previous value.
    pub fn insert_raw(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.0.props.borrow_mut().insert(key.into(), value.into())
    }

    /// Remove a property without triggering, keeping the order of the rest.
    pub fn remove_raw(&self, key: &str) -> Option<Value> {
        self.0.props.borrow_mut().shift_remove(key)
    }

    /// Check for a property without tracking.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.0.props.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.props.borrow().is_empty()
    }

    /// Check whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<Rc<str>>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        {
            let mut props = object.0.props.borrow_mut();
            for (key, value) in iter {
                props.insert(key.into(), value.into());
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.0.id)
            .field("keys", &self.keys())
            .finish()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let props = self.0.props.borrow();
        let mut map = serializer.serialize_map(Some(props.len()))?;
        for (key, value) in props.iter() {
            map.serialize_entry(&**key, value)?;
        }
        map.end()
    }
}

struct ReactiveInner {
    target: Object,
}

/// Tracked accessor wrapper around an [`Object`].
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{reactive, Object};
///
/// let raw: Object = [("count", 1)].into_iter().collect();
/// let state = reactive(&raw);
///
/// assert!(state.ptr_eq(&reactive(&raw)));
/// state.set("count", 2);
/// assert_eq!(state.get("count").as_number(), Some(2.0));
/// ```
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveInner>);

impl Reactive {
    /// Get the source ID of the wrapped object.
    pub fn id(&self) -> SourceId {
        self.0.target.id()
    }

    /// Read a property, tracking it. Nested objects come back wrapped.
    /// A missing property reads as `Null`.
    pub fn get(&self, key: &str) -> Value {
        Runtime::track(self.id(), DepKey::prop(key));
        self.get_untracked(key)
    }

    /// Read a property without tracking.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.0
            .target
            .get_raw(key)
            .map_or(Value::Null, |value| value.to_reactive())
    }

    /// Check for a property, tracking it.
    pub fn has(&self, key: &str) -> bool {
        Runtime::track(self.id(), DepKey::prop(key));
        self.0.target.contains_key(key)
    }

    /// Property names, tracking the key set.
    pub fn keys(&self) -> Vec<Rc<str>> {
        Runtime::track(self.id(), DepKey::Iterate);
        self.0.target.keys()
    }

    /// Number of properties, tracking the key set.
    pub fn len(&self) -> usize {
        Runtime::track(self.id(), DepKey::Iterate);
        self.0.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a property.
    ///
    /// Adding a key triggers the property and the key set; changing a value
    /// triggers the property; writing the same value triggers nothing.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let raw = value.into().to_raw();
        let previous = self.0.target.insert_raw(key, raw.clone());

        match previous {
            None => Runtime::trigger_keys(self.id(), &[DepKey::prop(key), DepKey::Iterate]),
            Some(old) if !old.same_value(&raw) => Runtime::trigger(self.id(), DepKey::prop(key)),
            Some(_) => {}
        }
    }

    /// Remove a property. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let existed = self.0.target.remove_raw(key).is_some();
        if existed {
            Runtime::trigger_keys(self.id(), &[DepKey::prop(key), DepKey::Iterate]);
        }
        existed
    }

    /// The wrapped raw object.
    pub fn to_raw(&self) -> Object {
        self.0.target.clone()
    }

    /// Check whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read every key and nested value so the running effect tracks them.
    pub fn traverse(&self, seen: &mut HashSet<SourceId>) {
        if !seen.insert(self.id()) {
            return;
        }
        for key in self.keys() {
            self.get(&key).traverse(seen);
        }
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.0.target).finish()
    }
}

/// Wrap `target` for tracked access.
///
/// While a wrapper for `target` is alive, every call returns that same
/// wrapper.
pub fn reactive(target: &Object) -> Reactive {
    let data = &target.0;
    if let Some(inner) = data.proxy.borrow().upgrade() {
        return Reactive(inner);
    }

    let inner = Rc::new(ReactiveInner {
        target: target.clone(),
    });
    *data.proxy.borrow_mut() = Rc::downgrade(&inner);
    Reactive(inner)
}

/// Check whether a value is a reactive wrapper.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::effect::Effect;
    use serde_json::json;
    use std::cell::Cell;

    fn object(value: serde_json::Value) -> Object {
        Value::from(value).as_object().unwrap()
    }

    #[test]
    fn reactive_is_idempotent() {
        let raw = object(json!({ "a": 1 }));
        let first = reactive(&raw);
        let second = reactive(&raw);
        assert!(first.ptr_eq(&second));
        assert_eq!(Value::from(first), Value::from(second));
    }

    #[test]
    fn reads_track_and_writes_trigger() {
        let state = reactive(&object(json!({ "count": 0, "other": 0 })));
        let runs = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let (state, runs) = (state.clone(), runs.clone());
            move || {
                state.get("count");
                runs.set(runs.get() + 1);
            }
        });

        state.set("count", 1);
        assert_eq!(runs.get(), 2);

        state.set("other", 5);
        assert_eq!(runs.get(), 2);

        // Same value: no trigger.
        state.set("count", 1);
        assert_eq!(runs.get(), 2);
        effect.stop();
    }

    #[test]
    fn adding_and_deleting_keys_triggers_iteration() {
        let state = reactive(&Object::new());
        let seen = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let (state, seen) = (state.clone(), seen.clone());
            move || seen.set(state.keys().len())
        });

        state.set("a", 1);
        assert_eq!(seen.get(), 1);
        state.set("b", 2);
        assert_eq!(seen.get(), 2);
        assert!(state.delete("a"));
        assert_eq!(seen.get(), 1);
        assert!(!state.delete("missing"));
        effect.stop();
    }

    #[test]
    fn nested_objects_are_wrapped_on_read() {
        let state = reactive(&object(json!({ "user": { "name": "ada" } })));
        let user = state.get("user");
        assert!(is_reactive(&user));

        let name = Rc::new(RefCell::new(String::new()));
        let effect = Effect::new({
            let (state, name) = (state.clone(), name.clone());
            move || {
                let user = state.get("user").as_reactive().unwrap();
                *name.borrow_mut() = user.get("name").as_str().unwrap_or("").to_string();
            }
        });

        user.as_reactive().unwrap().set("name", "grace");
        assert_eq!(*name.borrow(), "grace");
        effect.stop();
    }

    #[test]
    fn writes_store_raw_objects() {
        let state = reactive(&Object::new());
        let nested = reactive(&Object::new());
        state.set("nested", nested.clone());

        let stored = state.to_raw().get_raw("nested").unwrap();
        assert!(matches!(stored, Value::Object(_)));
        assert!(stored.as_object().unwrap().ptr_eq(&nested.to_raw()));
    }

    #[test]
    fn nan_write_is_not_a_change() {
        let state = reactive(&Object::new());
        state.set("n", f64::NAN);
        let runs = Rc::new(Cell::new(0));

        let effect = Effect::new({
            let (state, runs) = (state.clone(), runs.clone());
            move || {
                state.get("n");
                runs.set(runs.get() + 1);
            }
        });

        state.set("n", f64::NAN);
        assert_eq!(runs.get(), 1);
        effect.stop();
    }

    #[test]
    fn json_arrays_become_indexed_objects() {
        let list = object(json!(["x", "y"]));
        assert_eq!(list.keys(), vec![Rc::from("0"), Rc::from("1")]);
        assert_eq!(list.get_raw("1"), Some(Value::from("y")));
    }

    #[test]
    fn serializes_current_contents() {
        let value = Value::from(json!({ "a": 1.5, "b": [true, null] }));
        let round = serde_json::to_value(&value).unwrap();
        assert_eq!(round, json!({ "a": 1.5, "b": { "0": true, "1": null } }));
    }

    #[test]
    fn traverse_handles_cycles() {
        let raw = Object::new();
        raw.insert_raw("self", raw.clone());
        let state = reactive(&raw);

        let mut seen = HashSet::new();
        state.traverse(&mut seen);
        assert_eq!(seen.len(), 1);

        // Break the cycle so the object is freed.
        raw.remove_raw("self");
    }
}
