//! Handler traits and the continuation value they return.
//!
//! A handler does its work on the request and response and then returns a
//! [`Next`] telling the dispatcher what to do: continue down the stack, skip
//! the rest of the current route or router, report an error, or stop because
//! the response was handled.
//!
//! Closures are adapted with [`from_fn`], [`from_sync_fn`], [`error_fn`],
//! [`error_sync_fn`], [`param_fn`] and [`param_sync_fn`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use express_rs_core::{ExpressError, ExpressResult};

use crate::{BoxFuture, Request, Response};

/// The continuation value a handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Pass control to the next matching layer.
    Continue,
    /// Skip the remaining handlers of the current route.
    Route,
    /// Skip the remaining layers of the current router.
    Router,
    /// Pass an error to the next error-handling layer.
    Error(ExpressError),
    /// The response is complete; stop dispatching.
    Handled,
}

impl Next {
    /// Returns [`Next::Handled`] on success and [`Next::Error`] otherwise.
    ///
    /// Convenient for handlers that end by writing a response:
    /// `Next::handled_or_error(res.json(&body))`.
    pub fn handled_or_error(result: ExpressResult<()>) -> Self {
        match result {
            Ok(()) => Self::Handled,
            Err(err) => Self::Error(err),
        }
    }

    /// Returns the error, if this is [`Next::Error`].
    pub const fn error(&self) -> Option<&ExpressError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExpressError> for Next {
    fn from(err: ExpressError) -> Self {
        Self::Error(err)
    }
}

impl From<ExpressResult<()>> for Next {
    fn from(result: ExpressResult<()>) -> Self {
        match result {
            Ok(()) => Self::Continue,
            Err(err) => Self::Error(err),
        }
    }
}

/// A request handler: middleware, route handler, or mounted router.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles the request.
    async fn call(&self, req: &mut Request, res: &mut Response) -> Next;
}

/// An error-handling middleware. Runs only while an error is pending.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Handles a pending error. Returning [`Next::Continue`] clears it.
    async fn call(&self, err: ExpressError, req: &mut Request, res: &mut Response) -> Next;
}

/// A callback run before any layer that captures the named parameter.
#[async_trait]
pub trait ParamCallback: Send + Sync {
    /// Runs the callback with the captured `value` of parameter `name`.
    async fn call(&self, req: &mut Request, res: &mut Response, value: &str, name: &str) -> Next;
}

/// What a layer runs: a request handler or an error handler.
#[derive(Clone)]
pub enum Middleware {
    /// Runs when no error is pending.
    Request(Arc<dyn Handler>),
    /// Runs when an error is pending.
    Error(Arc<dyn ErrorHandler>),
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(_) => f.write_str("Middleware::Request"),
            Self::Error(_) => f.write_str("Middleware::Error"),
        }
    }
}

impl Middleware {
    /// Wraps a request handler.
    pub fn request(handler: impl Handler + 'static) -> Self {
        Self::Request(Arc::new(handler))
    }

    /// Wraps an error handler.
    pub fn error(handler: impl ErrorHandler + 'static) -> Self {
        Self::Error(Arc::new(handler))
    }

    /// Returns `true` for error-handling middleware.
    pub const fn is_error_handler(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Arc<dyn Handler>> for Middleware {
    fn from(handler: Arc<dyn Handler>) -> Self {
        Self::Request(handler)
    }
}

impl From<Arc<dyn ErrorHandler>> for Middleware {
    fn from(handler: Arc<dyn ErrorHandler>) -> Self {
        Self::Error(handler)
    }
}

// ============================================================
// Closure adapters
// ============================================================

/// An async closure adapted as a [`Handler`].
pub struct FnHandler<F>(F);

/// Adapts an async closure into a handler.
///
/// ```
/// use express_rs_http::routing::{from_fn, Next};
///
/// let hello = from_fn(|_req, res| {
///     Box::pin(async move {
///         res.send("hello");
///         Next::Handled
///     })
/// });
/// ```
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Next> + Send + Sync,
{
    FnHandler(f)
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Next> + Send + Sync,
{
    async fn call(&self, req: &mut Request, res: &mut Response) -> Next {
        (self.0)(req, res).await
    }
}

impl<F> From<FnHandler<F>> for Middleware
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, Next>
        + Send
        + Sync
        + 'static,
{
    fn from(handler: FnHandler<F>) -> Self {
        Self::request(handler)
    }
}

/// A synchronous closure adapted as a [`Handler`].
pub struct SyncFnHandler<F>(F);

/// Adapts a synchronous closure into a handler.
pub fn from_sync_fn<F>(f: F) -> SyncFnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Next + Send + Sync,
{
    SyncFnHandler(f)
}

#[async_trait]
impl<F> Handler for SyncFnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Next + Send + Sync,
{
    async fn call(&self, req: &mut Request, res: &mut Response) -> Next {
        (self.0)(req, res)
    }
}

impl<F> From<SyncFnHandler<F>> for Middleware
where
    F: Fn(&mut Request, &mut Response) -> Next + Send + Sync + 'static,
{
    fn from(handler: SyncFnHandler<F>) -> Self {
        Self::request(handler)
    }
}

/// An async closure adapted as an [`ErrorHandler`].
pub struct FnErrorHandler<F>(F);

/// Adapts an async closure into an error handler.
pub fn error_fn<F>(f: F) -> FnErrorHandler<F>
where
    F: for<'a> Fn(ExpressError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Next>
        + Send
        + Sync,
{
    FnErrorHandler(f)
}

#[async_trait]
impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: for<'a> Fn(ExpressError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Next>
        + Send
        + Sync,
{
    async fn call(&self, err: ExpressError, req: &mut Request, res: &mut Response) -> Next {
        (self.0)(err, req, res).await
    }
}

impl<F> From<FnErrorHandler<F>> for Middleware
where
    F: for<'a> Fn(ExpressError, &'a mut Request, &'a mut Response) -> BoxFuture<'a, Next>
        + Send
        + Sync
        + 'static,
{
    fn from(handler: FnErrorHandler<F>) -> Self {
        Self::error(handler)
    }
}

/// A synchronous closure adapted as an [`ErrorHandler`].
pub struct SyncFnErrorHandler<F>(F);

/// Adapts a synchronous closure into an error handler.
pub fn error_sync_fn<F>(f: F) -> SyncFnErrorHandler<F>
where
    F: Fn(ExpressError, &mut Request, &mut Response) -> Next + Send + Sync,
{
    SyncFnErrorHandler(f)
}

#[async_trait]
impl<F> ErrorHandler for SyncFnErrorHandler<F>
where
    F: Fn(ExpressError, &mut Request, &mut Response) -> Next + Send + Sync,
{
    async fn call(&self, err: ExpressError, req: &mut Request, res: &mut Response) -> Next {
        (self.0)(err, req, res)
    }
}

impl<F> From<SyncFnErrorHandler<F>> for Middleware
where
    F: Fn(ExpressError, &mut Request, &mut Response) -> Next + Send + Sync + 'static,
{
    fn from(handler: SyncFnErrorHandler<F>) -> Self {
        Self::error(handler)
    }
}

/// An async closure adapted as a [`ParamCallback`].
pub struct FnParamCallback<F>(F);

/// Adapts an async closure into a parameter callback.
///
/// The closure receives the captured value as an owned `String`.
pub fn param_fn<F>(f: F) -> FnParamCallback<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, Next> + Send + Sync,
{
    FnParamCallback(f)
}

#[async_trait]
impl<F> ParamCallback for FnParamCallback<F>
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response, String) -> BoxFuture<'a, Next> + Send + Sync,
{
    async fn call(&self, req: &mut Request, res: &mut Response, value: &str, _name: &str) -> Next {
        (self.0)(req, res, value.to_string()).await
    }
}

/// A synchronous closure adapted as a [`ParamCallback`].
pub struct SyncFnParamCallback<F>(F);

/// Adapts a synchronous closure into a parameter callback.
pub fn param_sync_fn<F>(f: F) -> SyncFnParamCallback<F>
where
    F: Fn(&mut Request, &mut Response, &str) -> Next + Send + Sync,
{
    SyncFnParamCallback(f)
}

#[async_trait]
impl<F> ParamCallback for SyncFnParamCallback<F>
where
    F: Fn(&mut Request, &mut Response, &str) -> Next + Send + Sync,
{
    async fn call(&self, req: &mut Request, res: &mut Response, value: &str, _name: &str) -> Next {
        (self.0)(req, res, value)
    }
}

// ============================================================
// Panic boundary
// ============================================================

/// Runs a handler invocation, turning a panic into [`Next::Error`].
///
/// Panics are caught both while creating the future and while polling it.
pub(crate) async fn guard<'a, F>(invoke: F) -> Next
where
    F: FnOnce() -> BoxFuture<'a, Next>,
{
    let future = match std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
        Ok(future) => future,
        Err(payload) => return Next::Error(ExpressError::from_panic(&*payload)),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(next) => next,
        Err(payload) => {
            let err = ExpressError::from_panic(&*payload);
            tracing::debug!(error = %err, "handler panicked");
            Next::Error(err)
        }
    }
}
