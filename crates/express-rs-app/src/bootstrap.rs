//! Middleware seeded at the bottom of every application's router.
//!
//! When an [`Application`](crate::Application) creates its router it pushes
//! [`QueryParser`] and then [`Init`], so every later layer sees a parsed query
//! string and the default response headers.

use async_trait::async_trait;
use http::header::HeaderValue;

use express_rs_http::routing::{Handler, Next};
use express_rs_http::{uri, Request, Response};

/// The `X-Powered-By` value set by [`Init`].
pub const POWERED_BY: &str = "Express-rs";

/// Parses the query string of `req.url()` into `req.query()`.
///
/// A query that is already set (e.g. by an enclosing application) is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryParser;

#[async_trait]
impl Handler for QueryParser {
    async fn call(&self, req: &mut Request, _res: &mut Response) -> Next {
        if req.query().is_none() {
            let query = uri::parse_query(req.url());
            req.set_query(query);
        }
        Next::Continue
    }
}

/// Sets default response headers.
#[derive(Debug, Clone, Copy)]
pub struct Init {
    x_powered_by: bool,
}

impl Init {
    /// Creates the init middleware; `x_powered_by` toggles the `X-Powered-By` header.
    pub const fn new(x_powered_by: bool) -> Self {
        Self { x_powered_by }
    }
}

#[async_trait]
impl Handler for Init {
    async fn call(&self, _req: &mut Request, res: &mut Response) -> Next {
        if self.x_powered_by {
            res.insert_header(
                http::header::HeaderName::from_static("x-powered-by"),
                HeaderValue::from_static(POWERED_BY),
            );
        }
        Next::Continue
    }
}
