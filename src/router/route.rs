//! Route records and their registration options.

use super::Handler;
use super::pattern::Pattern;
use crate::http::{Compression, Method};

/// Options accepted when registering a route.
///
/// Built with chained setters; unset options keep their defaults
/// (`GET` only, no CORS, no token, no compression, caching enabled).
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Compression, Method};
/// use rttp_cache::router::RouteOptions;
///
/// let options = RouteOptions::new()
///     .methods([Method::Get, Method::Post])
///     .cors(true)
///     .compression(Compression::Gzip)
///     .cache_control("public,max-age=3600")
///     .tag("tiles");
/// assert_eq!(options.methods_list().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub(crate) methods: Vec<Method>,
    pub(crate) cors: bool,
    pub(crate) token: bool,
    pub(crate) compression: Compression,
    pub(crate) b64encode: bool,
    pub(crate) ttl: Option<u64>,
    pub(crate) cache_control: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) no_cache: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteOptions {
    pub fn new() -> Self {
        Self {
            methods: vec![Method::Get],
            cors: false,
            token: false,
            compression: Compression::None,
            b64encode: false,
            ttl: None,
            cache_control: None,
            description: None,
            tag: None,
            no_cache: false,
        }
    }

    /// Methods the route accepts. Duplicates are dropped, order is kept.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.clear();
        for method in methods {
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        self
    }

    /// Add CORS headers to every response of this route.
    #[must_use]
    pub fn cors(mut self, cors: bool) -> Self {
        self.cors = cors;
        self
    }

    /// Require a valid access token before the handler runs.
    #[must_use]
    pub fn token(mut self, token: bool) -> Self {
        self.token = token;
        self
    }

    /// Compress bodies with `compression` when the client accepts it.
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Base64-encode response bodies (binary payloads).
    #[must_use]
    pub fn b64encode(mut self, b64encode: bool) -> Self {
        self.b64encode = b64encode;
        self
    }

    /// Deprecated: sends `Cache-Control: max-age=<seconds>`. Use [`cache_control`](Self::cache_control).
    #[must_use]
    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    /// `Cache-Control` value sent with successful responses.
    #[must_use]
    pub fn cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = Some(value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Opt this route out of the response cache.
    #[must_use]
    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn methods_list(&self) -> &[Method] {
        &self.methods
    }
}

/// A registered route: pattern, handler and options.
pub struct Route {
    path: String,
    pattern: Pattern,
    handler: Handler,
    options: RouteOptions,
}

impl Route {
    pub(crate) fn new(path: &str, pattern: Pattern, handler: Handler, options: RouteOptions) -> Self {
        Self {
            path: path.to_owned(),
            pattern,
            handler,
            options,
        }
    }

    /// The pattern string the route was registered with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.options.methods
    }

    pub fn accepts(&self, method: &Method) -> bool {
        self.options.methods.contains(method)
    }

    pub fn cors(&self) -> bool {
        self.options.cors
    }

    pub fn requires_token(&self) -> bool {
        self.options.token
    }

    pub fn compression(&self) -> Compression {
        self.options.compression
    }

    pub fn b64encode(&self) -> bool {
        self.options.b64encode
    }

    pub fn no_cache(&self) -> bool {
        self.options.no_cache
    }

    pub fn description(&self) -> Option<&str> {
        self.options.description.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.options.tag.as_deref()
    }

    /// Effective `Cache-Control` value: the explicit one, else `max-age=<ttl>`.
    pub fn cache_control(&self) -> Option<String> {
        self.options
            .cache_control
            .clone()
            .or_else(|| self.options.ttl.map(|ttl| format!("max-age={ttl}")))
    }

    pub(crate) fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
