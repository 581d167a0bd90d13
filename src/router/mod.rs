//! Request routing: map URL patterns and HTTP methods to handler functions.
//!
//! [`Router`] is the route table of an API. Routes are registered once at
//! startup; registration validates the pattern and rejects a pattern that
//! overlaps an existing route on any method. At request time
//! [`Router::find`] resolves a method and path to a [`RouteMatch`].
//!
//! Routes are matched in registration order; the first route whose pattern
//! matches and which accepts the method wins.

use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::Arguments;
use crate::http::{Method, Reply};

mod pattern;
pub mod route;

use pattern::{Pattern, normalize};
pub use route::{Route, RouteOptions};

/// Error type handlers may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a handler invocation.
pub type HandlerResult = Result<Reply, HandlerError>;

/// Type-erased, heap-allocated async handler that processes [`Arguments`] and
/// returns a [`HandlerResult`].
///
/// In practice you never construct this type directly; pass any async
/// function or closure to [`Router::route`].
pub type Handler =
    Arc<dyn Fn(Arguments) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Arguments) -> impl Future<Output = Result<Reply, E>> + Send` whose
/// error converts into [`HandlerError`] implements this trait through the
/// blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given arguments, boxing the returned future.
    fn call(&self, args: Arguments) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
}

impl<T, F, E> IntoHandler for T
where
    T: Fn(Arguments) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Reply, E>> + Send + 'static,
    E: Into<HandlerError> + 'static,
{
    fn call(&self, args: Arguments) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> {
        let fut = (self)(args);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

/// Route table configuration errors, raised at registration time.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("duplicate route detected: {method} {path:?}, URL paths must be unique")]
    Duplicate { path: String, method: Method },

    #[error("route {path:?} accepts no methods")]
    EmptyMethods { path: String },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result of resolving a request against the route table.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    /// A route accepts the method and path; `args` holds the captured path parameters.
    Found { route: &'a Route, args: Arguments },
    /// At least one route matches the path, none accepts the method.
    MethodNotAllowed { allowed: Vec<Method> },
    /// No route matches the path.
    NotFound,
}

/// The route table.
///
/// # Examples
///
/// ```rust
/// use rttp_cache::context::Arguments;
/// use rttp_cache::http::Reply;
/// use rttp_cache::router::{RouteOptions, Router};
///
/// let mut router = Router::new();
/// router
///     .route(
///         "/test/<user>/<name>",
///         |_args: Arguments| async { Ok::<_, std::io::Error>(Reply::ok("text/plain", "heyyyy")) },
///         RouteOptions::new(),
///     )
///     .unwrap();
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register `handler` for `path` with the given options.
    ///
    /// # Errors
    ///
    /// - [`RouteError::InvalidPattern`]: `path` is not a valid pattern.
    /// - [`RouteError::EmptyMethods`]: `options` lists no method.
    /// - [`RouteError::Duplicate`]: a route with the same pattern already
    ///   accepts one of the methods. The table is left unchanged.
    pub fn route(
        &mut self,
        path: &str,
        handler: impl IntoHandler,
        options: RouteOptions,
    ) -> Result<(), RouteError> {
        let pattern = Pattern::parse(path)?;

        if options.methods.is_empty() {
            return Err(RouteError::EmptyMethods {
                path: path.to_owned(),
            });
        }

        for method in &options.methods {
            if self.is_registered(path, method) {
                return Err(RouteError::Duplicate {
                    path: path.to_owned(),
                    method: method.clone(),
                });
            }
        }

        if options.ttl.is_some() {
            warn!(path, "route option `ttl` is deprecated, use `cache_control`");
        }

        debug!(path, methods = ?options.methods, no_cache = options.no_cache, "route registered");
        let handler: Handler = Arc::new(move |args| handler.call(args));
        self.routes.push(Route::new(path, pattern, handler, options));
        Ok(())
    }

    /// Register a `GET`-only route with default options.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(path, handler, RouteOptions::new())
    }

    /// Register a `POST`-only route with default options.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> Result<(), RouteError> {
        self.route(path, handler, RouteOptions::new().methods([Method::Post]))
    }

    // Returns `true` if a route with the same normalized pattern accepts `method`.
    fn is_registered(&self, path: &str, method: &Method) -> bool {
        let path = normalize(path);
        self.routes
            .iter()
            .any(|route| normalize(route.path()) == path && route.accepts(method))
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate over registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Resolve `method` and `path` to a route.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(args) = route.pattern().matches(path) else {
                continue;
            };
            if route.accepts(method) {
                return RouteMatch::Found { route, args };
            }
            for m in route.methods() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allowed }
        }
    }
}
