//! # express-rs-app
//!
//! The application container for the express-rs framework. An [`Application`]
//! owns one lazily created [`Router`](express_rs_http::Router), seeds it with
//! the bootstrap middleware, finishes unhandled requests with the default
//! final handler, and serves itself over axum.

pub mod application;
pub mod bootstrap;
pub mod finalhandler;
pub mod server;

pub use application::{Application, Done};
