//! A path endpoint with its own per-method handler stack.

use http::Method;

use express_rs_core::{ExpressError, ExpressResult};

use super::handler::{Middleware, Next};
use super::layer::Layer;
use crate::{Request, Response};

/// Handlers registered for one path, filtered by method.
///
/// Routes are created by [`Router::route`](super::Router::route) and
/// dispatched when their path matches and they handle the request method.
///
/// # Examples
///
/// ```
/// use express_rs_http::routing::{from_sync_fn, Next, Router};
///
/// let mut router = Router::new();
/// router
///     .route("/books")
///     .unwrap()
///     .get(from_sync_fn(|_req, res| {
///         res.send("list");
///         Next::Handled
///     }))
///     .post(from_sync_fn(|_req, res| {
///         res.send("create");
///         Next::Handled
///     }));
/// ```
#[derive(Debug)]
pub struct Route {
    path: String,
    stack: Vec<Layer>,
    methods: Vec<Method>,
    all: bool,
}

impl Route {
    /// Creates an empty route for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stack: Vec::new(),
            methods: Vec::new(),
            all: false,
        }
    }

    /// Returns the path this route was registered with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the route's layers.
    pub fn stack(&self) -> &[Layer] {
        &self.stack
    }

    /// Registers a handler for a method given by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::ImproperlyConfigured`] if `method` is not a
    /// valid method token.
    pub fn on(&mut self, method: &str, handler: impl Into<Middleware>) -> ExpressResult<&mut Self> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ExpressError::ImproperlyConfigured(format!("Invalid HTTP method '{method}'"))
        })?;
        Ok(self.method(method, handler))
    }

    /// Registers a handler for `method`.
    pub fn method(&mut self, method: Method, handler: impl Into<Middleware>) -> &mut Self {
        if !self.methods.contains(&method) {
            self.methods.push(method.clone());
        }
        tracing::trace!(path = %self.path, %method, "route handler registered");
        self.stack.push(Layer::for_method(Some(method), handler.into()));
        self
    }

    /// Registers a handler that runs for every method.
    pub fn all(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.all = true;
        self.stack.push(Layer::for_method(None, handler.into()));
        self
    }

    /// Registers a `GET` handler.
    pub fn get(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::GET, handler)
    }

    /// Registers a `POST` handler.
    pub fn post(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::POST, handler)
    }

    /// Registers a `PUT` handler.
    pub fn put(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::PUT, handler)
    }

    /// Registers a `PATCH` handler.
    pub fn patch(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::PATCH, handler)
    }

    /// Registers a `DELETE` handler.
    pub fn delete(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::DELETE, handler)
    }

    /// Registers a `HEAD` handler.
    pub fn head(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::HEAD, handler)
    }

    /// Registers an `OPTIONS` handler.
    pub fn options_handler(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.method(Method::OPTIONS, handler)
    }

    /// Returns `true` if the route runs for `method`.
    ///
    /// `HEAD` is handled by `GET` handlers unless a `HEAD` handler exists.
    pub fn handles_method(&self, method: &Method) -> bool {
        if self.all {
            return true;
        }
        if *method == Method::HEAD && !self.methods.contains(&Method::HEAD) {
            return self.methods.contains(&Method::GET);
        }
        self.methods.contains(method)
    }

    /// Returns the registered methods in registration order, with `HEAD`
    /// appended when `GET` is registered without it.
    pub fn options(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.methods.iter().map(ToString::to_string).collect();
        if self.methods.contains(&Method::GET) && !self.methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD.to_string());
        }
        methods
    }

    /// Runs the route's handlers for the request.
    ///
    /// Returns the continuation for the enclosing router: [`Next::Route`] from
    /// a handler is absorbed and becomes [`Next::Continue`].
    pub async fn dispatch(&self, req: &mut Request, res: &mut Response) -> Next {
        if self.stack.is_empty() {
            return Next::Continue;
        }

        let method = if *req.method() == Method::HEAD && !self.methods.contains(&Method::HEAD) {
            Method::GET
        } else {
            req.method().clone()
        };
        req.set_route_path(self.path.clone());
        tracing::debug!(route = %self.path, %method, "dispatching route");

        let mut signal = Next::Continue;
        for layer in &self.stack {
            match signal {
                Next::Route => return Next::Continue,
                Next::Router | Next::Handled => return signal,
                Next::Continue | Next::Error(_) => {}
            }
            if layer.method().is_some_and(|m| *m != method) {
                continue;
            }
            signal = match signal {
                Next::Error(err) => layer.handle_error(err, req, res).await,
                _ => layer.handle_request(req, res).await,
            };
        }

        match signal {
            Next::Route => Next::Continue,
            other => other,
        }
    }
}
