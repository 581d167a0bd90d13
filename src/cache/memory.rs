//! Process-local cache backend.
//!
//! Useful for local runs and tests. Entries live for the configured expiry
//! and are dropped when read after their deadline or on the next write. Each Lambda
//! container has its own map, so hits only happen within a warm container.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::{BoxFuture, CacheBackend, DEFAULT_EXPIRY_SECS};
use crate::http::Reply;

struct Entry {
    reply: Reply,
    expires_at: Instant,
}

/// In-memory [`CacheBackend`] with a fixed per-entry lifetime.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rttp_cache::cache::{CacheBackend, InMemoryCache};
/// use rttp_cache::http::Reply;
///
/// # async fn demo() {
/// let cache = InMemoryCache::new(Duration::from_secs(60));
/// assert!(cache.set("key", &Reply::ok("text/plain", "hi")).await);
/// assert_eq!(cache.get("key").await, Some(Reply::ok("text/plain", "hi")));
/// # }
/// ```
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    expiry: Duration,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_EXPIRY_SECS))
    }
}

impl InMemoryCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expiry,
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl CacheBackend for InMemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>> {
        Box::pin(async move {
            let now = Instant::now();
            {
                let entries = self.entries.read().await;
                match entries.get(key) {
                    Some(entry) if entry.expires_at > now => return Some(entry.reply.clone()),
                    Some(_) => {}
                    None => return None,
                }
            }

            debug!(key, "in-memory entry expired");
            let mut entries = self.entries.write().await;
            if entries.get(key).is_some_and(|e| e.expires_at <= now) {
                entries.remove(key);
            }
            None
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a Reply) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let now = Instant::now();
            let entry = Entry {
                reply: value.clone(),
                expires_at: now + self.expiry,
            };

            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() < before {
                debug!(purged = before - entries.len(), "in-memory entries expired");
            }
            entries.insert(key.to_owned(), entry);
            true
        })
    }
}
