//! # express-rs-test
//!
//! Testing utilities for the express-rs framework.
//!
//! ## Modules
//!
//! - [`request_factory`] - Build requests and run them through a router directly
//! - [`client`] - In-process HTTP client for a whole application

pub mod client;
pub mod request_factory;

pub use client::{TestClient, TestResponse};
pub use request_factory::{Dispatched, RequestFactory};
