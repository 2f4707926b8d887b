//! Request routing.
//!
//! A [`Router`] holds an ordered stack of [`Layer`]s. Each layer pairs a
//! [`CompiledPattern`] with middleware, a mounted router, or a [`Route`].
//! Dispatch walks the stack in registration order, running every layer whose
//! pattern matches until a handler returns [`Next::Handled`] or the stack is
//! exhausted.
//!
//! ## Modules
//!
//! - [`pattern`] - Path pattern compiler (`/user/:id`, `:name?`, `*`, ...)
//! - [`handler`] - Handler traits, closure adapters and the [`Next`] value
//! - [`layer`] - One stack slot: pattern plus handler
//! - [`route`] - Per-method handler stack for one path
//! - [`router`] - The dispatch engine

pub mod handler;
pub mod layer;
pub mod pattern;
pub mod route;
pub mod router;

pub use handler::{
    error_fn, error_sync_fn, from_fn, from_sync_fn, param_fn, param_sync_fn, ErrorHandler,
    Handler, Middleware, Next, ParamCallback,
};
pub use layer::{Layer, LayerMatch};
pub use pattern::{CompiledPattern, PathKey, PathSpec, PatternMatch, PatternOptions};
pub use route::Route;
pub use router::Router;
