//! Response cache: the backend contract and its implementations.
//!
//! Every store implements [`CacheBackend`]: a point `get`/`set` keyed by a
//! request [fingerprint](fingerprint). Backends are fail-soft: a store
//! outage, an auth failure or an undecodable entry surfaces as a miss on
//! `get` and as `false` on `set`, never as an error. Caching is best effort,
//! so a broken cache degrades the API to always-miss.
//!
//! Entry lifecycle (expiry, eviction) belongs to the store:
//!
//! | Backend            | Expiry                                               |
//! |--------------------|------------------------------------------------------|
//! | [`DynamoDbCache`]  | `ttl` attribute set to now + expiry on every write   |
//! | [`MemcachedCache`] | expiration passed with every write                   |
//! | [`S3Cache`]        | bucket lifecycle rules, nothing set on write         |
//! | [`InMemoryCache`]  | per-entry deadline checked on read                   |
//!
//! The DynamoDB, Memcached and S3 backends talk to their store through a
//! narrow client trait ([`TableClient`], [`MemcacheClient`], [`ObjectClient`])
//! so the network SDK stays with the caller.

use std::pin::Pin;

use thiserror::Error;

use crate::http::Reply;

pub mod dynamodb;
pub mod fingerprint;
pub mod memcached;
pub mod memory;
pub mod s3;

pub use dynamodb::{AttributeValue, DynamoDbCache, DynamoDbConfig, Item, TableClient};
pub use memcached::{MemcacheClient, MemcachedCache, MemcachedConfig};
pub use memory::InMemoryCache;
pub use s3::{ObjectClient, S3Cache, S3Config};

/// Default entry lifetime of the expiring backends: five days.
pub const DEFAULT_EXPIRY_SECS: u64 = 432_000;

/// A pinned, boxed, `Send` future, the return type of backend and client calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The contract every response cache store satisfies.
///
/// Implementations must be interchangeable: the dispatcher never inspects
/// which backend it holds.
///
/// # Contract
///
/// - `get` returns `Some(reply)` only for a stored, decodable entry. Misses and
///   failures both return `None`.
/// - `set` persists `value` under `key` with the backend's expiry and returns
///   whether the write succeeded. It never fails the caller.
pub trait CacheBackend: Send + Sync {
    /// Look up the reply stored under `key`.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>>;

    /// Store `value` under `key`, returning `true` on success.
    fn set<'a>(&'a self, key: &'a str, value: &'a Reply) -> BoxFuture<'a, bool>;
}

/// Failures reported by store clients.
///
/// Backends log and swallow these; they never reach the dispatcher.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed entry: {0}")]
    Malformed(String),
}
