//! Per-request typed storage.
//!
//! [`Locals`] is the bag handlers use to pass data down the stack, e.g. a
//! parameter callback that loads a user and stores it for the route handler.
//! Values are stored as [`serde_json::Value`] and read back through typed
//! accessors. Routing bookkeeping never lives here; the router keeps its own
//! state in dedicated [`Request`](crate::Request) fields.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use express_rs_core::ExpressResult;

/// A string-keyed map of JSON values with typed accessors.
///
/// # Examples
///
/// ```
/// use express_rs_http::Locals;
///
/// let mut locals = Locals::new();
/// locals.insert("user_id", 42).unwrap();
/// assert_eq!(locals.get_i64("user_id"), Some(42));
/// assert_eq!(locals.get::<u32>("user_id"), Some(42));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Locals {
    values: HashMap<String, Value>,
}

impl Locals {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `value` and stores it under `key`, replacing any previous value.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> ExpressResult<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    /// Stores a raw JSON value under `key`.
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Deserializes the value stored under `key`.
    ///
    /// Returns `None` if the key is missing or the value has a different shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Returns the raw JSON value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Returns the value under `key` if it is an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    /// Returns the value under `key` if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
