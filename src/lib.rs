//! # rttp-cache
//!
//! A request router for API Gateway proxy integrations with a response cache
//! keyed by a SHA-224 fingerprint of the handler arguments.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rttp_cache::{Api, ApiConfig, Arguments, InMemoryCache, Reply, RouteOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut api = Api::new(ApiConfig::from_env()?)
//!         .with_cache(Arc::new(InMemoryCache::default()));
//!
//!     api.route(
//!         "/tiles/<int:z>/<int:x>/<int:y>",
//!         |args: Arguments| async move {
//!             let z = args.get("z").and_then(|v| v.as_i64()).unwrap_or_default();
//!             Ok::<_, std::io::Error>(Reply::ok("text/plain", format!("zoom {z}")))
//!         },
//!         RouteOptions::new().cors(true).cache_control("max-age=3600"),
//!     )?;
//!
//!     let event = serde_json::json!({"path": "/tiles/3/1/2", "httpMethod": "GET"});
//!     let response = api.handle(event).await;
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod router;
pub mod security;

pub use api::Api;
pub use cache::{CacheBackend, DynamoDbCache, InMemoryCache, MemcachedCache, S3Cache, StoreError};
pub use config::{ApiConfig, ConfigError};
pub use context::Arguments;
pub use http::{ApiGatewayEvent, Compression, Method, ProxyResponse, Reply, Status, StatusCode};
pub use router::{HandlerError, RouteError, RouteOptions, Router};
