//! DynamoDB-backed response cache.
//!
//! Table layout:
//!
//! - partition key named `key` (string) holding the fingerprint,
//! - `content` (string) holding the JSON-serialized [`Reply`],
//! - `ttl` (number) holding the expiry as Unix seconds. Enable DynamoDB TTL on
//!   this attribute so the table purges stale entries itself.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use super::{BoxFuture, CacheBackend, DEFAULT_EXPIRY_SECS, StoreError};
use crate::http::Reply;

const KEY_ATTR: &str = "key";
const CONTENT_ATTR: &str = "content";
const TTL_ATTR: &str = "ttl";

/// A DynamoDB attribute value, limited to the types the cache writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    N(String),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            Self::N(_) => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            Self::S(_) => None,
        }
    }
}

/// A DynamoDB item (or key) as attribute name → value.
pub type Item = HashMap<String, AttributeValue>;

/// The two table operations the cache needs from a DynamoDB client.
pub trait TableClient: Send + Sync {
    /// `PutItem` into `table`, replacing any item with the same key.
    fn put_item<'a>(&'a self, table: &'a str, item: Item) -> BoxFuture<'a, Result<(), StoreError>>;

    /// `GetItem` from `table`; `Ok(None)` when no item has `key`.
    fn get_item<'a>(&'a self, table: &'a str, key: Item) -> BoxFuture<'a, Result<Option<Item>, StoreError>>;
}

/// Construction parameters of a [`DynamoDbCache`].
#[derive(Debug, Clone)]
pub struct DynamoDbConfig {
    table_name: String,
    expiry: Duration,
}

impl DynamoDbConfig {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            expiry: Duration::from_secs(DEFAULT_EXPIRY_SECS),
        }
    }

    /// Entry lifetime written to the `ttl` attribute.
    #[must_use]
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// [`CacheBackend`] storing replies as DynamoDB items.
pub struct DynamoDbCache<C> {
    client: C,
    config: DynamoDbConfig,
}

impl<C: TableClient> DynamoDbCache<C> {
    pub fn new(client: C, config: DynamoDbConfig) -> Self {
        Self { client, config }
    }

    async fn try_set(&self, key: &str, value: &Reply) -> Result<(), StoreError> {
        let content = serde_json::to_string(value)?;
        let expires = unix_now() + self.config.expiry.as_secs();

        let item = Item::from([
            (KEY_ATTR.to_owned(), AttributeValue::S(key.to_owned())),
            (CONTENT_ATTR.to_owned(), AttributeValue::S(content)),
            (TTL_ATTR.to_owned(), AttributeValue::N(expires.to_string())),
        ]);
        self.client.put_item(&self.config.table_name, item).await
    }

    async fn try_get(&self, key: &str) -> Result<Option<Reply>, StoreError> {
        let lookup = Item::from([(KEY_ATTR.to_owned(), AttributeValue::S(key.to_owned()))]);
        let Some(item) = self.client.get_item(&self.config.table_name, lookup).await? else {
            return Ok(None);
        };

        // TTL deletion runs in the background and may lag behind the deadline.
        let expires = item
            .get(TTL_ATTR)
            .and_then(AttributeValue::as_n)
            .and_then(|n| n.parse::<u64>().ok());
        if expires.is_some_and(|deadline| deadline <= unix_now()) {
            debug!(key, "dynamodb entry past its ttl");
            return Ok(None);
        }

        let content = item
            .get(CONTENT_ATTR)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| StoreError::Malformed(format!("item {key} has no string `{CONTENT_ATTR}`")))?;
        Ok(Some(serde_json::from_str(content)?))
    }
}

impl<C: TableClient> CacheBackend for DynamoDbCache<C> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>> {
        Box::pin(async move {
            match self.try_get(key).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(table = %self.config.table_name, key, error = %e, "dynamodb cache read failed");
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
                    warn!(table = %self.config.table_name, key, error = %e, "dynamodb cache write failed");
                    false
                }
            }
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
