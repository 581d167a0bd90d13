//! Memcached-backed response cache.
//!
//! Entries are JSON-serialized replies written with an explicit expiration
//! on every `set`.

use std::time::Duration;

use tracing::warn;

use super::{BoxFuture, CacheBackend, DEFAULT_EXPIRY_SECS, StoreError};
use crate::http::Reply;

/// Memcached treats expirations above 30 days as absolute Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// The two commands the cache needs from a memcached client.
pub trait MemcacheClient: Send + Sync {
    /// `set` with `expiration` in seconds.
    fn set<'a>(&'a self, key: &'a str, value: String, expiration: u32) -> BoxFuture<'a, Result<(), StoreError>>;

    /// `get`; `Ok(None)` on a miss.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;
}

/// Construction parameters of a [`MemcachedCache`].
#[derive(Debug, Clone)]
pub struct MemcachedConfig {
    host: String,
    port: u16,
    expiry: Duration,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 11211,
            expiry: Duration::from_secs(DEFAULT_EXPIRY_SECS),
        }
    }
}

impl MemcachedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    /// `host:port`, the address a client should connect to.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    // Relative expirations are capped at 30 days so memcached never reads them as timestamps.
    fn expiration(&self) -> u32 {
        self.expiry.as_secs().min(MAX_RELATIVE_EXPIRATION) as u32
    }
}

/// [`CacheBackend`] storing replies in memcached.
pub struct MemcachedCache<C> {
    client: C,
    config: MemcachedConfig,
}

impl<C: MemcacheClient> MemcachedCache<C> {
    pub fn new(client: C, config: MemcachedConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &MemcachedConfig {
        &self.config
    }

    async fn try_set(&self, key: &str, value: &Reply) -> Result<(), StoreError> {
        let payload = serde_json::to_string(value)?;
        self.client.set(key, payload, self.config.expiration()).await
    }

    async fn try_get(&self, key: &str) -> Result<Option<Reply>, StoreError> {
        match self.client.get(key).await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}

impl<C: MemcacheClient> CacheBackend for MemcachedCache<C> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>> {
        Box::pin(async move {
            match self.try_get(key).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(endpoint = %self.config.endpoint(), key, error = %e, "memcached cache read failed");
                    None
                }
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a Reply) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            match self.try_set(key, value).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(endpoint = %self.config.endpoint(), key, error = %e, "memcached cache write failed");
                    false
                }
            }
        })
    }
}
