//! Handler arguments: the merged view of a request a route handler receives.
//!
//! [`Arguments`] holds matched path parameters, query parameters (minus the
//! access token), and the decoded body of body-bearing requests, all as JSON
//! values. It is also the input of the request fingerprint, so its map is
//! kept in sorted key order.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Key under which the decoded request body is passed to handlers.
pub const BODY_KEY: &str = "body";

/// Named handler arguments.
///
/// # Examples
///
/// ```
/// use rttp_cache::context::Arguments;
///
/// let mut args = Arguments::new();
/// args.insert("user", "remote");
/// args.insert("zoom", 12);
///
/// assert_eq!(args.get_str("user"), Some("remote"));
/// assert_eq!(args.get("zoom").and_then(|v| v.as_i64()), Some(12));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    map: Map<String, Value>,
}

impl Arguments {
    /// Create an empty argument set.
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    /// Insert an argument, replacing any previous value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Get an argument as a string slice, `None` if absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.map.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// The raw request body, present only for body-bearing requests.
    pub fn body(&self) -> Option<&str> {
        self.get_str(BODY_KEY)
    }

    /// Deserialize the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(self.body().unwrap_or("null"))
    }

    /// Deserialize the whole argument set into a typed struct.
    pub fn parse<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(Value::Object(self.map.clone()))
    }
}

impl<K, V> Extend<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<Value>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Arguments
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Arguments::new();
        args.extend(iter);
        args
    }
}

impl From<Arguments> for Map<String, Value> {
    fn from(args: Arguments) -> Self {
        args.map
    }
}
