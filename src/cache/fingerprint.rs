//! Request fingerprints: the cache key of a dispatched request.
//!
//! A fingerprint is the lowercase hex SHA-224 digest of the canonical JSON
//! document `{"app_route_id": "<path>-<name>-<version>", "args": {...}}`.
//! Canonical means object keys are sorted at every depth and the output has
//! no insignificant whitespace, so two argument sets with the same content
//! always hash identically regardless of insertion order.

use std::fmt::{self, Write as _};

use serde_json::{Map, Value};
use sha2::{Digest, Sha224};

use crate::context::Arguments;

/// Key of the handler arguments in the fingerprinted document.
pub const ARGS_KEY: &str = "args";
/// Key of the route identity in the fingerprinted document.
pub const ROUTE_ID_KEY: &str = "app_route_id";

/// Identifies which deployed route a request was answered by.
///
/// Rendered as `<path>-<api name>-<api version>`; including it in the hash
/// keeps identical arguments sent to different paths or API versions apart.
#[derive(Debug, Clone, Copy)]
pub struct RouteIdentity<'a> {
    pub path: &'a str,
    pub name: &'a str,
    pub version: &'a str,
}

impl fmt::Display for RouteIdentity<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.path, self.name, self.version)
    }
}

/// Fingerprint a request's handler arguments under a route identity.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::fingerprint::{RouteIdentity, request_fingerprint};
/// use rttp_cache::context::Arguments;
///
/// let identity = RouteIdentity { path: "/test/remote/pixel", name: "test", version: "0.0.1" };
/// let a: Arguments = [("user", "remote"), ("name", "pixel")].into_iter().collect();
/// let b: Arguments = [("name", "pixel"), ("user", "remote")].into_iter().collect();
///
/// let key = request_fingerprint(&a, identity);
/// assert_eq!(key.len(), 56);
/// assert_eq!(key, request_fingerprint(&b, identity));
/// ```
pub fn request_fingerprint(args: &Arguments, identity: RouteIdentity<'_>) -> String {
    // Arguments are nested so no argument name can shadow the route identity.
    let mut map = Map::new();
    map.insert(ARGS_KEY.to_owned(), Value::Object(args.as_map().clone()));
    map.insert(ROUTE_ID_KEY.to_owned(), Value::String(identity.to_string()));
    fingerprint(&map)
}

/// SHA-224 hex digest of the canonical rendering of `map`.
pub fn fingerprint(map: &Map<String, Value>) -> String {
    let mut canonical = String::new();
    write_object(&mut canonical, map);

    let mut hasher = Sha224::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Canonical JSON text of `value`: sorted keys at every depth, compact separators.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => write_object(out, map),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // Scalars already have a single canonical rendering.
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}:", Value::String(key.clone()));
        write_value(out, value);
    }
    out.push('}');
}
