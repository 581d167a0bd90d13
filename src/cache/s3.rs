//! S3-backed response cache.
//!
//! Each reply is one JSON object at `<prefix>/<fingerprint>` (or just
//! `<fingerprint>` without a prefix). Writes set no expiry: configure an S3
//! lifecycle rule on the bucket or prefix to expire cached objects.

use bytes::Bytes;
use tracing::warn;

use super::{BoxFuture, CacheBackend, StoreError};
use crate::http::Reply;

/// The two object operations the cache needs from an S3 client.
pub trait ObjectClient: Send + Sync {
    fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, body: Bytes) -> BoxFuture<'a, Result<(), StoreError>>;

    /// `GetObject`; `Ok(None)` when the key does not exist.
    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, Result<Option<Bytes>, StoreError>>;
}

/// Construction parameters of an [`S3Cache`].
#[derive(Debug, Clone)]
pub struct S3Config {
    bucket: String,
    prefix: Option<String>,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
        }
    }

    /// Namespace every object under `prefix`. Surrounding slashes are ignored.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The object key a fingerprint is stored under.
    pub fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_owned(),
        }
    }
}

/// [`CacheBackend`] storing replies as S3 objects.
pub struct S3Cache<C> {
    client: C,
    config: S3Config,
}

impl<C: ObjectClient> S3Cache<C> {
    pub fn new(client: C, config: S3Config) -> Self {
        Self { client, config }
    }

    async fn try_set(&self, key: &str, value: &Reply) -> Result<(), StoreError> {
        let body = Bytes::from(serde_json::to_vec(value)?);
        let object_key = self.config.object_key(key);
        self.client.put_object(&self.config.bucket, &object_key, body).await
    }

    async fn try_get(&self, key: &str) -> Result<Option<Reply>, StoreError> {
        let object_key = self.config.object_key(key);
        match self.client.get_object(&self.config.bucket, &object_key).await? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }
}

impl<C: ObjectClient> CacheBackend for S3Cache<C> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>> {
        Box::pin(async move {
            match self.try_get(key).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(bucket = %self.config.bucket, key, error = %e, "s3 cache read failed");
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
                    warn!(bucket = %self.config.bucket, key, error = %e, "s3 cache write failed");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeBucket {
        objects: Mutex<HashMap<String, Bytes>>,
        deny: bool,
    }

    impl ObjectClient for FakeBucket {
        fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, body: Bytes) -> BoxFuture<'a, Result<(), StoreError>> {
            Box::pin(async move {
                if self.deny {
                    return Err(StoreError::AccessDenied(format!("s3://{bucket}/{key}")));
                }
                self.objects.lock().unwrap().insert(format!("{bucket}/{key}"), body);
                Ok(())
            })
        }

        fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, Result<Option<Bytes>, StoreError>> {
            Box::pin(async move {
                if self.deny {
                    return Err(StoreError::AccessDenied(format!("s3://{bucket}/{key}")));
                }
                Ok(self.objects.lock().unwrap().get(&format!("{bucket}/{key}")).cloned())
            })
        }
    }

    #[test]
    fn object_keys() {
        assert_eq!(S3Config::new("b").object_key("abc"), "abc");
        assert_eq!(S3Config::new("b").prefix("cache").object_key("abc"), "cache/abc");
        assert_eq!(S3Config::new("b").prefix("/cache/v1/").object_key("abc"), "cache/v1/abc");
        assert_eq!(S3Config::new("b").prefix("").object_key("abc"), "abc");
    }

    #[tokio::test]
    async fn stores_json_under_prefixed_key() {
        let cache = S3Cache::new(FakeBucket::default(), S3Config::new("tiles").prefix("cache"));
        assert!(cache.set("abc", &Reply::ok("text/plain", "v")).await);

        let objects = cache.client.objects.lock().unwrap();
        assert_eq!(
            objects["tiles/cache/abc"].as_ref(),
            br#"["OK","text/plain","v"]"#.as_slice()
        );
    }

    #[tokio::test]
    async fn binary_replies_round_trip() {
        let cache = S3Cache::new(FakeBucket::default(), S3Config::new("tiles"));
        let reply = Reply::ok("image/png", vec![137u8, 80, 78, 71]);
        cache.set("png", &reply).await;
        assert_eq!(cache.get("png").await, Some(reply));
    }

    #[tokio::test]
    async fn denied_access_is_swallowed() {
        let cache = S3Cache::new(
            FakeBucket {
                deny: true,
                ..Default::default()
            },
            S3Config::new("tiles"),
        );
        assert!(!cache.set("abc", &Reply::ok("text/plain", "v")).await);
        assert_eq!(cache.get("abc").await, None);
    }
}
