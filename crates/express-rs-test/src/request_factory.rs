//! Request factory for building [`Request`] objects in tests.
//!
//! [`RequestFactory`] builds requests directly, bypassing the HTTP layer. Pair
//! it with [`RequestFactory::dispatch`] to run a single [`Router`] and inspect
//! the request, response, and the value the router finished with.
//!
//! ## Example
//!
//! ```rust
//! use express_rs_test::request_factory::RequestFactory;
//!
//! let factory = RequestFactory::new().with_default_header("accept", "text/html");
//! let request = factory.get("/articles/?page=2");
//! assert_eq!(request.method(), &http::Method::GET);
//! assert_eq!(request.path(), "/articles/");
//! assert_eq!(request.header("accept"), Some("text/html"));
//! ```

use express_rs_http::routing::Next;
use express_rs_http::{Request, Response, Router};
use http::Method;

/// A factory for building [`Request`] objects without a server.
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    default_headers: Vec<(String, String)>,
}

impl RequestFactory {
    /// Creates a new request factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header included in every request built by this factory.
    #[must_use]
    pub fn with_default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    /// Builds a GET request.
    pub fn get(&self, url: &str) -> Request {
        self.build(Method::GET, url, Vec::new())
    }

    /// Builds a POST request with a raw body.
    pub fn post(&self, url: &str, body: impl Into<Vec<u8>>) -> Request {
        self.build(Method::POST, url, body.into())
    }

    /// Builds a PUT request with a raw body.
    pub fn put(&self, url: &str, body: impl Into<Vec<u8>>) -> Request {
        self.build(Method::PUT, url, body.into())
    }

    /// Builds a DELETE request.
    pub fn delete(&self, url: &str) -> Request {
        self.build(Method::DELETE, url, Vec::new())
    }

    /// Builds a HEAD request.
    pub fn head(&self, url: &str) -> Request {
        self.build(Method::HEAD, url, Vec::new())
    }

    /// Builds an OPTIONS request.
    pub fn options(&self, url: &str) -> Request {
        self.build(Method::OPTIONS, url, Vec::new())
    }

    /// Builds a request with an arbitrary method.
    pub fn build(&self, method: Method, url: &str, body: Vec<u8>) -> Request {
        let mut builder = Request::builder().method(method).url(url).body(body);
        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }
        builder.build()
    }

    /// Runs `request` through `router` and returns everything it produced.
    pub async fn dispatch(router: &Router, mut request: Request) -> Dispatched {
        let mut response = Response::new();
        let outcome = router.handle(&mut request, &mut response).await;
        Dispatched {
            request,
            response,
            outcome,
        }
    }
}

/// The result of [`RequestFactory::dispatch`].
#[derive(Debug)]
pub struct Dispatched {
    /// The request after dispatch, with `url`, `base_url` and params restored.
    pub request: Request,
    /// The response as left by the handlers.
    pub response: Response,
    /// The value the router finished with.
    pub outcome: Next,
}

impl Dispatched {
    /// Returns the response body as a string.
    pub fn text(&self) -> String {
        self.response.text()
    }

    /// Returns `true` if a handler finished the response.
    pub fn is_handled(&self) -> bool {
        self.outcome == Next::Handled
    }
}
