//! The API: route table, optional response cache, and the per-request dispatch.
//!
//! [`Api::dispatch`] runs one gateway event through these steps:
//!
//! 1. normalize the event (lowercase header names, resolve the path),
//! 2. match method and path against the route table,
//! 3. check the access token of protected routes,
//! 4. assemble handler arguments: path parameters, query parameters without
//!    `access_token`, and the decoded body of body-bearing methods,
//! 5. fingerprint the arguments together with `<path>-<name>-<version>`,
//! 6. probe the cache; a hit is returned as-is and the handler never runs,
//! 7. on a miss, invoke the handler, turning an error or a panic into an `ERROR` reply,
//! 8. store `OK` replies back into the cache,
//! 9. build the gateway response from the reply and the route options.
//!
//! Steps 5, 6 and 8 are skipped when no backend is configured or the route is
//! registered with `no_cache(true)`. Every path returns a well-formed
//! [`ProxyResponse`]; nothing is propagated to the caller.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::CacheBackend;
use crate::cache::fingerprint::{RouteIdentity, request_fingerprint};
use crate::config::ApiConfig;
use crate::context::{Arguments, BODY_KEY};
use crate::http::{ApiGatewayEvent, ProxyResponse, Reply, Request, ResponseOptions, Status, StatusCode};
use crate::router::{IntoHandler, Route, RouteError, RouteMatch, RouteOptions, Router};
use crate::security::{ACCESS_TOKEN_PARAM, presented_token, validate_token};

/// A routed API with an optional response cache.
///
/// Built once at process start and only read afterwards, so one instance can
/// serve every invocation of a warm Lambda container.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rttp_cache::{Api, ApiConfig, Arguments, InMemoryCache, Reply, RouteOptions};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut api = Api::new(ApiConfig::new("test")).with_cache(Arc::new(InMemoryCache::default()));
/// api.route(
///     "/test/<user>/<name>",
///     |args: Arguments| async move {
///         let user = args.get_str("user").unwrap_or_default().to_owned();
///         Ok::<_, std::io::Error>(Reply::ok("text/plain", user))
///     },
///     RouteOptions::new().cors(true),
/// )?;
///
/// let response = api
///     .handle(serde_json::json!({"path": "/test/remote/pixel", "httpMethod": "GET"}))
///     .await;
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.body(), "remote");
/// # Ok(())
/// # }
/// ```
pub struct Api {
    config: ApiConfig,
    router: Router,
    cache: Option<Arc<dyn CacheBackend>>,
}

impl Api {
    /// Create an API without routes and without a cache.
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            cache: None,
        }
    }

    /// Cache successful replies in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register a route. See [`Router::route`].
    ///
    /// # Errors
    ///
    /// Any [`RouteError`]; the route table is unchanged on error.
    pub fn route(
        &mut self,
        path: &str,
        handler: impl IntoHandler,
        options: RouteOptions,
    ) -> Result<(), RouteError> {
        self.router.route(path, handler, options)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Dispatch a raw JSON event.
    ///
    /// An event that does not deserialize is answered with `NOK` / 400.
    pub async fn handle(&self, event: serde_json::Value) -> ProxyResponse {
        match serde_json::from_value::<ApiGatewayEvent>(event) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => {
                warn!(error = %e, "unparseable gateway event");
                terminal(
                    StatusCode::BadRequest,
                    Reply::error_message(Status::Nok, format!("Invalid event: {e}")),
                )
            }
        }
    }

    /// Dispatch one gateway event to its route and build the response.
    pub async fn dispatch(&self, event: ApiGatewayEvent) -> ProxyResponse {
        let start = Instant::now();
        if self.config.is_debug() {
            debug!(event = ?event, "inbound event");
        }

        let request = Request::from_event(event);
        let response = self.respond(&request).await;

        info!(
            request_id = request.request_id().unwrap_or("-"),
            method = %request.method(),
            path = request.path().unwrap_or("-"),
            status = response.status_code(),
            elapsed = ?start.elapsed(),
            "request dispatched"
        );
        response
    }

    async fn respond(&self, request: &Request) -> ProxyResponse {
        let Some(path) = request.path() else {
            return terminal(
                StatusCode::BadRequest,
                Reply::error_message(Status::Nok, "Missing or invalid path"),
            );
        };
        let method = request.method();

        let (route, mut args) = match self.router.find(method, path) {
            RouteMatch::Found { route, args } => (route, args),
            RouteMatch::NotFound => {
                return terminal(
                    StatusCode::NotFound,
                    Reply::error_message(Status::Nok, format!("No view function for: {method} - {path}")),
                );
            }
            RouteMatch::MethodNotAllowed { allowed } => {
                let allow = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                return terminal(
                    StatusCode::MethodNotAllowed,
                    Reply::error_message(Status::Nok, format!("Method {method} not allowed for: {path}")),
                )
                .with_header("Allow", allow);
            }
        };

        if route.requires_token() && !validate_token(self.config.token(), presented_token(request)) {
            debug!(path, "access token rejected");
            return terminal(
                StatusCode::Unauthorized,
                Reply::json(Status::Error, &json!({ "message": "Invalid access token" })),
            );
        }

        args.extend(
            request
                .query()
                .iter()
                .filter(|(key, _)| key.as_str() != ACCESS_TOKEN_PARAM)
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        if method.has_body() {
            match request.decoded_body() {
                Ok(Some(body)) => args.insert(BODY_KEY, body),
                Ok(None) => {}
                Err(e) => {
                    return terminal(
                        StatusCode::BadRequest,
                        Reply::error_message(Status::Nok, format!("Invalid request body: {e}")),
                    );
                }
            }
        }

        let reply = self.resolve(route, path, args).await;
        let options = ResponseOptions {
            cors: route.cors(),
            methods: route.methods().to_vec(),
            accept_encoding: request.headers().get("accept-encoding").unwrap_or_default().to_owned(),
            compression: route.compression(),
            b64encode: route.b64encode(),
            cache_control: route.cache_control(),
        };
        ProxyResponse::build(reply.status().status_code(), reply, &options)
    }

    // Cache probe, handler invocation and conditional store.
    async fn resolve(&self, route: &Route, path: &str, args: Arguments) -> Reply {
        let Some(cache) = self.cache.as_deref().filter(|_| !route.no_cache()) else {
            return invoke(route, args).await;
        };

        let identity = RouteIdentity {
            path,
            name: self.config.name(),
            version: self.config.version_str(),
        };
        let key = request_fingerprint(&args, identity);

        if let Some(reply) = cache.get(&key).await {
            debug!(key = %key, "cache hit");
            return reply;
        }
        debug!(key = %key, "cache miss");

        let reply = invoke(route, args).await;
        if reply.status().is_success() {
            let stored = cache.set(&key, &reply).await;
            debug!(key = %key, stored, "cache store");
        }
        reply
    }
}

// Run the route handler; an error or a panic becomes an `ERROR` reply carrying its message.
async fn invoke(route: &Route, args: Arguments) -> Reply {
    let handler = route.handler();
    let outcome = AssertUnwindSafe(async move { handler(args).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            error!(route = route.path(), error = %e, "handler failed");
            Reply::error_message(Status::Error, e.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(route = route.path(), panic = %message, "handler panicked");
            Reply::error_message(Status::Error, message)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}

// Responses the dispatcher produces itself, without route metadata.
fn terminal(status: StatusCode, reply: Reply) -> ProxyResponse {
    ProxyResponse::build(status, reply, &ResponseOptions::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::cache::BoxFuture;
    use crate::http::Method;
    use crate::router::HandlerError;

    // Backend that answers `get` with a fixed value and records every call.
    #[derive(Default)]
    struct RecordingCache {
        hit: Option<Reply>,
        gets: Mutex<Vec<String>>,
        sets: Mutex<Vec<(String, Reply)>>,
    }

    impl RecordingCache {
        fn hit(reply: Reply) -> Self {
            Self {
                hit: Some(reply),
                ..Default::default()
            }
        }
    }

    impl CacheBackend for RecordingCache {
        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Reply>> {
            Box::pin(async move {
                self.gets.lock().unwrap().push(key.to_owned());
                self.hit.clone()
            })
        }

        fn set<'a>(&'a self, key: &'a str, value: &'a Reply) -> BoxFuture<'a, bool> {
            Box::pin(async move {
                self.sets.lock().unwrap().push((key.to_owned(), value.clone()));
                true
            })
        }
    }

    struct Calls {
        count: AtomicUsize,
        args: Mutex<Vec<Arguments>>,
    }

    // Handler returning `reply` that records the arguments it was called with.
    fn recording_handler(reply: Reply) -> (impl IntoHandler, Arc<Calls>) {
        let calls = Arc::new(Calls {
            count: AtomicUsize::new(0),
            args: Mutex::new(Vec::new()),
        });
        let recorder = Arc::clone(&calls);
        let handler = move |args: Arguments| {
            let recorder = Arc::clone(&recorder);
            let reply = reply.clone();
            async move {
                recorder.count.fetch_add(1, Ordering::SeqCst);
                recorder.args.lock().unwrap().push(args);
                Ok::<_, HandlerError>(reply)
            }
        };
        (handler, calls)
    }

    fn heyyyy() -> Reply {
        Reply::ok("text/plain", "heyyyy")
    }

    fn get_event(path: &str) -> Value {
        json!({
            "path": path,
            "httpMethod": "GET",
            "headers": {},
            "queryStringParameters": {},
        })
    }

    fn api_with(cache: Option<Arc<RecordingCache>>, reply: Reply, options: RouteOptions) -> (Api, Arc<Calls>) {
        let mut api = Api::new(ApiConfig::new("test"));
        if let Some(cache) = cache {
            api = api.with_cache(cache);
        }
        let (handler, calls) = recording_handler(reply);
        api.route("/test/<string:user>/<name>", handler, options).unwrap();
        (api, calls)
    }

    #[tokio::test]
    async fn without_cache_handler_gets_path_params() {
        let (api, calls) = api_with(None, heyyyy(), RouteOptions::new().cors(true));
        let res = api.handle(get_event("/test/remote/pixel")).await;

        assert_eq!(
            serde_json::to_value(&res).unwrap(),
            json!({
                "body": "heyyyy",
                "headers": {
                    "Access-Control-Allow-Credentials": "true",
                    "Access-Control-Allow-Methods": "GET",
                    "Access-Control-Allow-Origin": "*",
                    "Content-Type": "text/plain",
                },
                "statusCode": 200,
            })
        );
        assert_eq!(calls.count.load(Ordering::SeqCst), 1);
        let args = calls.args.lock().unwrap();
        let expected: Arguments = [("user", "remote"), ("name", "pixel")].into_iter().collect();
        assert_eq!(args[0], expected);
    }

    #[tokio::test]
    async fn cache_hit_skips_handler_and_store() {
        let cache = Arc::new(RecordingCache::hit(heyyyy()));
        let (api, calls) = api_with(Some(Arc::clone(&cache)), heyyyy(), RouteOptions::new());

        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.body(), "heyyyy");
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
        assert_eq!(cache.gets.lock().unwrap().len(), 1);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_hit_replays_cached_status() {
        let cached = Reply::new(Status::NotFound, "application/json", "{}");
        let cache = Arc::new(RecordingCache::hit(cached));
        let (api, _calls) = api_with(Some(cache), heyyyy(), RouteOptions::new());
        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.status_code(), 404);
    }

    #[tokio::test]
    async fn cache_miss_invokes_and_stores_once() {
        let cache = Arc::new(RecordingCache::default());
        let (api, calls) = api_with(Some(Arc::clone(&cache)), heyyyy(), RouteOptions::new());

        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.body(), "heyyyy");
        assert_eq!(calls.count.load(Ordering::SeqCst), 1);

        let gets = cache.gets.lock().unwrap();
        let sets = cache.sets.lock().unwrap();
        assert_eq!(gets.len(), 1);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, gets[0]);
        assert_eq!(sets[0].1, heyyyy());
    }

    #[tokio::test]
    async fn fingerprint_covers_args_and_route_identity() {
        let cache = Arc::new(RecordingCache::default());
        let (api, _calls) = api_with(Some(Arc::clone(&cache)), heyyyy(), RouteOptions::new());
        api.handle(get_event("/test/remote/pixel")).await;

        let expected_args: Arguments = [("user", "remote"), ("name", "pixel")].into_iter().collect();
        let expected = request_fingerprint(
            &expected_args,
            RouteIdentity {
                path: "/test/remote/pixel",
                name: "test",
                version: "0.0.1",
            },
        );
        assert_eq!(cache.gets.lock().unwrap()[0], expected);
    }

    #[tokio::test]
    async fn error_replies_are_not_stored() {
        let cache = Arc::new(RecordingCache::default());
        let failure = Reply::error_message(Status::Error, "upstream down");
        let (api, calls) = api_with(Some(Arc::clone(&cache)), failure, RouteOptions::new());

        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(calls.count.load(Ordering::SeqCst), 1);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_errors_become_error_replies() {
        let cache = Arc::new(RecordingCache::default());
        let mut api = Api::new(ApiConfig::new("test")).with_cache(cache.clone());
        api.route(
            "/boom",
            |_args: Arguments| async { Err::<Reply, _>(std::io::Error::other("kaboom")) },
            RouteOptions::new(),
        )
        .unwrap();

        let res = api.handle(get_event("/boom")).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.body(), r#"{"errorMessage":"kaboom"}"#);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handler_panics_become_error_replies() {
        let cache = Arc::new(RecordingCache::default());
        let mut api = Api::new(ApiConfig::new("test")).with_cache(cache.clone());
        api.route(
            "/panic",
            |_args: Arguments| async {
                if true {
                    panic!("kaboom");
                }
                Ok::<_, HandlerError>(Reply::ok("text/plain", "unreachable"))
            },
            RouteOptions::new(),
        )
        .unwrap();

        let res = tokio::spawn(async move { api.handle(get_event("/panic")).await })
            .await
            .expect("dispatch must not unwind");
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body(), r#"{"errorMessage":"kaboom"}"#);
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn route_id_argument_does_not_share_cache_entries() {
        let mut api = Api::new(ApiConfig::new("test")).with_cache(Arc::new(crate::cache::InMemoryCache::default()));
        let (handler, calls) = recording_handler(heyyyy());
        api.route("/echo", handler, RouteOptions::new()).unwrap();

        for caller in ["alice", "bob"] {
            let mut event = get_event("/echo");
            event["queryStringParameters"] = json!({ "app_route_id": caller });
            assert_eq!(api.handle(event).await.status_code(), 200);
        }

        assert_eq!(calls.count.load(Ordering::SeqCst), 2);
        let args = calls.args.lock().unwrap();
        assert_eq!(args[1].get_str("app_route_id"), Some("bob"));
    }

    #[tokio::test]
    async fn no_cache_route_never_touches_backend() {
        let cache = Arc::new(RecordingCache::hit(Reply::ok("text/plain", "stale")));
        let (api, calls) = api_with(Some(Arc::clone(&cache)), heyyyy(), RouteOptions::new().no_cache(true));

        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.body(), "heyyyy");
        assert_eq!(calls.count.load(Ordering::SeqCst), 1);
        assert!(cache.gets.lock().unwrap().is_empty());
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_is_404_without_handler() {
        let cache = Arc::new(RecordingCache::default());
        let (api, calls) = api_with(Some(Arc::clone(&cache)), heyyyy(), RouteOptions::new());

        let res = api.handle(get_event("/nothing/here")).await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.body(), r#"{"errorMessage":"No view function for: GET - /nothing/here"}"#);
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
        assert!(cache.gets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_method_is_405_without_handler() {
        let (api, calls) = api_with(None, heyyyy(), RouteOptions::new());
        let mut event = get_event("/test/remote/pixel");
        event["httpMethod"] = json!("DELETE");

        let res = api.handle(event).await;
        assert_eq!(res.status_code(), 405);
        assert_eq!(res.header("Allow"), Some("GET"));
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_path_is_nok() {
        let (api, calls) = api_with(None, heyyyy(), RouteOptions::new());
        let res = api.handle(json!({"httpMethod": "GET"})).await;
        assert_eq!(res.status_code(), 400);
        assert_eq!(res.body(), r#"{"errorMessage":"Missing or invalid path"}"#);
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_event_is_nok() {
        let (api, _calls) = api_with(None, heyyyy(), RouteOptions::new());
        let res = api.handle(json!({"path": 42, "httpMethod": "GET"})).await;
        assert_eq!(res.status_code(), 400);
    }

    #[tokio::test]
    async fn token_required_before_cache_and_handler() {
        let cache = Arc::new(RecordingCache::default());
        let mut api = Api::new(ApiConfig::new("test").access_token("s3cret")).with_cache(cache.clone());
        let (handler, calls) = recording_handler(heyyyy());
        api.route("/private", handler, RouteOptions::new().token(true)).unwrap();

        let res = api.handle(get_event("/private")).await;
        assert_eq!(res.status_code(), 401);
        assert_eq!(res.body(), r#"{"message":"Invalid access token"}"#);
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
        assert!(cache.gets.lock().unwrap().is_empty());

        let mut event = get_event("/private");
        event["queryStringParameters"] = json!({"access_token": "s3cret", "page": "2"});
        let res = api.handle(event).await;
        assert_eq!(res.status_code(), 200);

        let args = calls.args.lock().unwrap();
        assert_eq!(args[0].get_str("page"), Some("2"));
        assert!(!args[0].contains(ACCESS_TOKEN_PARAM));
    }

    #[tokio::test]
    async fn access_token_never_reaches_fingerprint() {
        let cache = Arc::new(RecordingCache::default());
        let mut api = Api::new(ApiConfig::new("test").access_token("a")).with_cache(cache.clone());
        let (handler, _calls) = recording_handler(heyyyy());
        api.route("/private", handler, RouteOptions::new().token(true)).unwrap();

        let mut with_query = get_event("/private");
        with_query["queryStringParameters"] = json!({"access_token": "a"});
        let mut with_header = get_event("/private");
        with_header["headers"] = json!({"Authorization": "Bearer a"});

        api.handle(with_query).await;
        api.handle(with_header).await;
        let gets = cache.gets.lock().unwrap();
        assert_eq!(gets.len(), 2);
        assert_eq!(gets[0], gets[1]);
    }

    #[tokio::test]
    async fn body_passed_for_post_only() {
        let mut api = Api::new(ApiConfig::new("test"));
        let (handler, calls) = recording_handler(heyyyy());
        api.route(
            "/echo",
            handler,
            RouteOptions::new().methods([Method::Get, Method::Post]),
        )
        .unwrap();

        let post = json!({
            "path": "/echo",
            "httpMethod": "POST",
            "body": "eyJhIjogMX0=",
            "isBase64Encoded": true,
        });
        api.handle(post).await;
        let mut get = get_event("/echo");
        get["body"] = json!("ignored");
        api.handle(get).await;

        let args = calls.args.lock().unwrap();
        assert_eq!(args[0].body(), Some("{\"a\": 1}"));
        assert_eq!(args[1].body(), None);
    }

    #[tokio::test]
    async fn query_params_override_path_params() {
        let (api, calls) = api_with(None, heyyyy(), RouteOptions::new());
        let mut event = get_event("/test/remote/pixel");
        event["queryStringParameters"] = json!({"name": "other"});
        api.handle(event).await;
        assert_eq!(calls.args.lock().unwrap()[0].get_str("name"), Some("other"));
    }

    #[tokio::test]
    async fn response_uses_route_compression() {
        let (api, _calls) = api_with(
            None,
            heyyyy(),
            RouteOptions::new().compression(crate::http::Compression::Gzip),
        );
        let mut event = get_event("/test/remote/pixel");
        event["headers"] = json!({"Accept-Encoding": "gzip, deflate"});
        let res = api.handle(event).await;
        assert_eq!(res.header("Content-Encoding"), Some("gzip"));
        assert!(res.is_base64_encoded());
    }

    #[tokio::test]
    async fn empty_cached_body_is_a_hit() {
        let cache = Arc::new(RecordingCache::hit(Reply::ok("text/plain", "")));
        let (api, calls) = api_with(Some(cache), heyyyy(), RouteOptions::new());
        let res = api.handle(get_event("/test/remote/pixel")).await;
        assert_eq!(res.body(), "");
        assert_eq!(calls.count.load(Ordering::SeqCst), 0);
    }
}
