//! # express-rs-http
//!
//! HTTP layer for the express-rs framework. Provides the [`Request`] and
//! [`Response`] types handed to every handler, URL helpers, and the
//! [`routing`] engine that walks a stack of layers for each request.

pub mod locals;
pub mod request;
pub mod response;
pub mod routing;
pub mod uri;

use std::future::Future;
use std::pin::Pin;

pub use locals::Locals;
pub use request::{QueryMap, Request, RequestBuilder};
pub use response::Response;
pub use routing::{Layer, Middleware, Next, Route, Router};

/// A boxed, sendable future borrowing from the request it was created for.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
