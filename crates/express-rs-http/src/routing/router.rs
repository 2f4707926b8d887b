//! The router: an ordered stack of layers and the dispatch loop that walks it.
//!
//! ## Dispatch
//!
//! [`Router::handle`] keeps all per-request state in a local [`DispatchFrame`],
//! so any number of requests can be dispatched concurrently over one shared
//! router. The loop is iterative: each handler returns a [`Next`] and the loop
//! moves on to the next matching layer, so long stacks of non-matching layers
//! do not grow the call stack.
//!
//! Before each layer runs, the URL trimming done for the previous layer is
//! undone. A mounted layer has its matched prefix removed from `req.url()` and
//! appended to `req.base_url()`; the scheme and host of a fully qualified URL
//! are never trimmed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{HeaderValue, ALLOW};
use http::Method;

use express_rs_core::{ExpressError, ExpressResult, RouterOptions};

use super::handler::{guard, Handler, Middleware, Next, ParamCallback};
use super::layer::Layer;
use super::pattern::{CompiledPattern, PathKey, PathSpec, PatternOptions};
use super::route::Route;
use crate::{uri, Request, Response};

/// An ordered stack of middleware, mounted handlers and routes.
///
/// # Examples
///
/// ```
/// use express_rs_http::routing::{from_sync_fn, Next, Router};
/// use express_rs_http::{Request, Response};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut router = Router::new();
/// router
///     .get("/user/:id", from_sync_fn(|req, res| {
///         let id = req.param("id").unwrap_or_default().to_string();
///         res.send(format!("user {id}"));
///         Next::Handled
///     }))
///     .unwrap();
///
/// let mut req = Request::builder().url("/user/42").build();
/// let mut res = Response::new();
/// assert_eq!(router.handle(&mut req, &mut res).await, Next::Handled);
/// assert_eq!(res.text(), "user 42");
/// # });
/// ```
#[derive(Default)]
pub struct Router {
    stack: Vec<Layer>,
    params: HashMap<String, Vec<Arc<dyn ParamCallback>>>,
    options: RouterOptions,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("layers", &self.stack.len())
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

/// The outcome of one request's parameter callbacks for a name.
#[derive(Debug, Clone)]
struct ParamMemo {
    /// The captured value the callbacks ran for.
    matched: String,
    /// `req.params[name]` after the callbacks ran.
    value: Option<String>,
    outcome: Next,
}

/// Per-request dispatch state. Never stored on the router.
#[derive(Debug, Default)]
struct DispatchFrame {
    index: usize,
    removed: String,
    slash_added: bool,
    param_called: HashMap<String, ParamMemo>,
    options: Vec<String>,
}

impl Router {
    /// Creates a router with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router with the given options.
    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the router's options.
    pub const fn options(&self) -> RouterOptions {
        self.options
    }

    /// Returns the layer stack.
    pub fn stack(&self) -> &[Layer] {
        &self.stack
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Adds middleware that runs for every path.
    pub fn middleware(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        let pattern = CompiledPattern::fast_slash(self.options.case_sensitive);
        self.stack.push(Layer::new(pattern, handler.into()));
        self
    }

    /// Adds middleware (or a router) under a path prefix.
    ///
    /// Inside the handler `req.url()` has the matched prefix removed and
    /// `req.base_url()` has it appended.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::InvalidPattern`] if `path` does not compile.
    pub fn mount(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        let spec = path.into();
        let pattern =
            CompiledPattern::compile(&spec, PatternOptions::prefix(self.options.case_sensitive))?;
        tracing::trace!(path = %spec, "mounted middleware");
        self.stack.push(Layer::new(pattern, handler.into()));
        Ok(self)
    }

    /// Creates a route for `path` and returns it for handler registration.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::InvalidPattern`] if `path` does not compile.
    pub fn route(&mut self, path: impl Into<PathSpec>) -> ExpressResult<&mut Route> {
        let spec = path.into();
        let pattern = CompiledPattern::compile(
            &spec,
            PatternOptions::route(self.options.case_sensitive, self.options.strict),
        )?;
        let index = self.stack.len();
        self.stack.push(Layer::route_slot(pattern));
        Ok(self.stack[index].route.insert(Route::new(spec.to_string())))
    }

    /// Registers a handler on a new route for a method given by name.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile or `method` is invalid.
    pub fn method(
        &mut self,
        method: &str,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.route(path)?.on(method, handler)?;
        Ok(self)
    }

    fn verb(
        &mut self,
        method: Method,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.route(path)?.method(method, handler);
        Ok(self)
    }

    /// Registers a `GET` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn get(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::GET, path, handler)
    }

    /// Registers a `POST` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn post(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::POST, path, handler)
    }

    /// Registers a `PUT` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn put(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::PUT, path, handler)
    }

    /// Registers a `PATCH` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn patch(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::PATCH, path, handler)
    }

    /// Registers a `DELETE` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn delete(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::DELETE, path, handler)
    }

    /// Registers a `HEAD` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn head(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::HEAD, path, handler)
    }

    /// Registers an `OPTIONS` handler on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn options_route(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.verb(Method::OPTIONS, path, handler)
    }

    /// Registers a handler for every method on a new route.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn all(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.route(path)?.all(handler);
        Ok(self)
    }

    /// Registers a callback that runs before any layer capturing `name`.
    ///
    /// Callbacks for a name run in registration order, at most once per
    /// distinct captured value per request. A leading `:` is ignored.
    pub fn param(&mut self, name: &str, callback: impl ParamCallback + 'static) -> &mut Self {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.params
            .entry(name.to_string())
            .or_default()
            .push(Arc::new(callback));
        self
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Dispatches a request through the stack.
    ///
    /// Returns [`Next::Handled`] if a handler finished the request,
    /// [`Next::Error`] if an error is still pending when the stack is
    /// exhausted, and [`Next::Continue`] if nothing handled it. On every return
    /// except [`Next::Handled`], `req.base_url()` and `req.params()` are
    /// restored to their values on entry.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) -> Next {
        let protohost = uri::protohost(req.url()).unwrap_or_default().to_string();
        let parent_url = req.base_url().to_string();
        let parent_params = req.params().clone();
        let mut frame = DispatchFrame::default();
        let mut signal = Next::Continue;

        loop {
            if frame.slash_added {
                if let Some(url) = req.url().strip_prefix('/').map(str::to_string) {
                    req.set_url(url);
                }
                frame.slash_added = false;
            }
            if !frame.removed.is_empty() {
                req.set_base_url(parent_url.clone());
                let rest = req.url().get(protohost.len()..).unwrap_or_default();
                let url = format!("{protohost}{}{rest}", frame.removed);
                req.set_url(url);
                frame.removed.clear();
            }

            let mut layer_error = match signal {
                Next::Continue | Next::Route => None,
                Next::Error(err) => Some(err),
                Next::Router => {
                    return finish(None, &frame, req, res, parent_url, parent_params)
                }
                Next::Handled => return Next::Handled,
            };

            if frame.index >= self.stack.len() {
                tracing::trace!(url = %req.url(), "end of stack");
                return finish(layer_error, &frame, req, res, parent_url, parent_params);
            }

            let Some(path) = uri::pathname(req.url()).map(str::to_string) else {
                tracing::debug!(url = %req.url(), "unparseable request url");
                return finish(layer_error, &frame, req, res, parent_url, parent_params);
            };

            let mut found = None;
            while frame.index < self.stack.len() {
                let layer = &self.stack[frame.index];
                frame.index += 1;

                let matched = match layer.match_path(&path) {
                    Ok(Some(matched)) => matched,
                    Ok(None) => continue,
                    Err(err) => {
                        layer_error.get_or_insert(err);
                        continue;
                    }
                };

                if let Some(route) = layer.route() {
                    if layer_error.is_some() {
                        continue;
                    }
                    let method = req.method();
                    let has_method = route.handles_method(method);
                    if !has_method && *method == Method::OPTIONS {
                        for allowed in route.options() {
                            if !frame.options.contains(&allowed) {
                                frame.options.push(allowed);
                            }
                        }
                    }
                    if !has_method && *method != Method::HEAD {
                        continue;
                    }
                }

                found = Some((layer, matched));
                break;
            }

            let Some((layer, matched)) = found else {
                return finish(layer_error, &frame, req, res, parent_url, parent_params);
            };
            tracing::trace!(index = frame.index - 1, path = %path, "layer matched");

            let params = if self.options.merge_params {
                let mut merged = parent_params.clone();
                merged.extend(matched.params);
                merged
            } else {
                matched.params
            };
            req.set_params(params);

            match self
                .process_params(layer.keys(), &mut frame.param_called, req, res)
                .await
            {
                Next::Continue => {}
                Next::Handled => return Next::Handled,
                failed => {
                    signal = layer_error.map_or(failed, Next::Error);
                    continue;
                }
            }

            if let Some(route) = layer.route() {
                signal = route.dispatch(req, res).await;
                continue;
            }

            let layer_path = matched.path;
            if !layer_path.is_empty() {
                let boundary = path
                    .strip_prefix(layer_path.as_str())
                    .map(|rest| rest.chars().next());
                match boundary {
                    Some(None | Some('/' | '.')) => {}
                    _ => {
                        signal = layer_error.map_or(Next::Continue, Next::Error);
                        continue;
                    }
                }

                let rest = req
                    .url()
                    .get(protohost.len() + layer_path.len()..)
                    .unwrap_or_default();
                let mut url = format!("{protohost}{rest}");
                if protohost.is_empty() && !url.starts_with('/') {
                    url.insert(0, '/');
                    frame.slash_added = true;
                }
                req.set_url(url);
                let trimmed = layer_path.strip_suffix('/').unwrap_or(&layer_path);
                req.set_base_url(format!("{parent_url}{trimmed}"));
                frame.removed = layer_path;
            }

            signal = match layer_error {
                Some(err) => layer.handle_error(err, req, res).await,
                None => layer.handle_request(req, res).await,
            };
        }
    }

    /// Runs the parameter callbacks for each key of a matched layer.
    async fn process_params(
        &self,
        keys: &[PathKey],
        called: &mut HashMap<String, ParamMemo>,
        req: &mut Request,
        res: &mut Response,
    ) -> Next {
        for key in keys {
            let name = key.name.as_str();
            let Some(callbacks) = self.params.get(name) else {
                continue;
            };
            let Some(value) = req.param(name).map(str::to_string) else {
                continue;
            };

            if let Some(memo) = called.get(name) {
                let replay = memo.matched == value
                    || matches!(memo.outcome, Next::Error(_) | Next::Router);
                if replay {
                    match &memo.value {
                        Some(stored) => {
                            req.params_mut().insert(name.to_string(), stored.clone());
                        }
                        None => {
                            req.params_mut().remove(name);
                        }
                    }
                    match &memo.outcome {
                        Next::Continue => continue,
                        outcome => return outcome.clone(),
                    }
                }
            }

            tracing::debug!(param = name, value = %value, "running param callbacks");
            let mut outcome = Next::Continue;
            for callback in callbacks {
                outcome = guard(|| callback.call(req, res, &value, name)).await;
                if outcome != Next::Continue {
                    break;
                }
            }

            called.insert(
                name.to_string(),
                ParamMemo {
                    matched: value,
                    value: req.param(name).map(str::to_string),
                    outcome: outcome.clone(),
                },
            );
            if outcome != Next::Continue {
                return outcome;
            }
        }
        Next::Continue
    }
}

/// Restores request state on router exit and sends the automatic `OPTIONS`
/// response when one applies.
fn finish(
    err: Option<ExpressError>,
    frame: &DispatchFrame,
    req: &mut Request,
    res: &mut Response,
    parent_url: String,
    parent_params: HashMap<String, String>,
) -> Next {
    req.set_base_url(parent_url);
    req.set_params(parent_params);

    if *req.method() == Method::OPTIONS && err.is_none() && !frame.options.is_empty() {
        let allow = frame.options.join(",");
        tracing::debug!(allow = %allow, "automatic OPTIONS response");
        return match HeaderValue::from_str(&allow) {
            Ok(value) => {
                res.insert_header(ALLOW, value);
                res.send(allow);
                Next::Handled
            }
            Err(e) => Next::Error(ExpressError::InternalServerError(e.to_string())),
        };
    }

    err.map_or(Next::Continue, Next::Error)
}

#[async_trait]
impl Handler for Router {
    async fn call(&self, req: &mut Request, res: &mut Response) -> Next {
        self.handle(req, res).await
    }
}

impl From<Router> for Middleware {
    fn from(router: Router) -> Self {
        Self::request(router)
    }
}
