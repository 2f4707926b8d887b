//! # express-rs
//!
//! An Express-style routing and middleware framework for Rust.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient access.
//! You can depend on `express-rs` to get the entire framework, or depend on
//! individual crates for finer-grained control.
//!
//! ```no_run
//! use express_rs::prelude::*;
//!
//! # async fn example() -> ExpressResult<()> {
//! let mut app = Application::new(Settings::default());
//! app.get("/hello/:name", from_sync_fn(|req, res| {
//!     res.send(format!("Hello, {}!", req.param("name").unwrap_or("world")));
//!     Next::Handled
//! }))?;
//! app.run().await
//! # }
//! ```

/// Core types, settings, logging, and error types.
pub use express_rs_core as core;

/// HTTP layer: Request, Response, and the routing engine.
#[cfg(feature = "http")]
pub use express_rs_http as http;

/// Application container, bootstrap middleware, final handler, and server.
#[cfg(feature = "app")]
pub use express_rs_app as app;

/// Testing utilities: request factory and test client.
#[cfg(feature = "testing")]
pub use express_rs_test as test;

/// Third-party crates used in the public API.
pub use async_trait::async_trait;
pub use axum;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower_http;
pub use tracing;
pub use tracing_subscriber;

/// The most commonly used items.
pub mod prelude {
    pub use express_rs_core::logging::setup_logging;
    pub use express_rs_core::{ExpressError, ExpressResult, RouterOptions, Settings};

    #[cfg(feature = "http")]
    pub use express_rs_http::routing::{
        error_fn, error_sync_fn, from_fn, from_sync_fn, param_fn, param_sync_fn, ErrorHandler,
        Handler, Middleware, Next, ParamCallback, Route, Router,
    };
    #[cfg(feature = "http")]
    pub use express_rs_http::{BoxFuture, Request, Response};

    #[cfg(feature = "app")]
    pub use express_rs_app::Application;
}
