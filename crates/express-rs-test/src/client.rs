//! HTTP test client for express-rs.
//!
//! [`TestClient`] drives an Axum router (usually produced by
//! [`Application::into_axum_router`]) in-process with `tower::ServiceExt::oneshot`,
//! and [`TestResponse`] exposes the status, headers and body of the result.
//!
//! ## Usage
//!
//! ```rust
//! use express_rs_app::Application;
//! use express_rs_http::routing::{from_sync_fn, Next};
//! use express_rs_test::client::TestClient;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut app = Application::default();
//! app.get("/hello", from_sync_fn(|_req, res| {
//!     res.send("Hello, World!");
//!     Next::Handled
//! }))
//! .unwrap();
//!
//! let client = TestClient::from_app(app);
//! let response = client.get("/hello").await;
//! assert_eq!(response.status_code(), 200);
//! assert_eq!(response.text(), "Hello, World!");
//! # });
//! ```

use axum::body::Body;
use axum::Router;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use express_rs_app::Application;
use express_rs_core::ExpressError;

/// An in-process client for an Axum router.
///
/// Cloning is cheap, so one client can be shared across concurrent tasks.
#[derive(Clone)]
pub struct TestClient {
    app: Router,
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient").finish_non_exhaustive()
    }
}

impl TestClient {
    /// Creates a new test client wrapping the given Axum router.
    pub const fn new(app: Router) -> Self {
        Self { app }
    }

    /// Creates a test client for an application.
    pub fn from_app(app: Application) -> Self {
        Self::new(app.into_axum_router())
    }

    /// Sends a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, Vec::new(), &[]).await
    }

    /// Sends a POST request with a raw body.
    pub async fn post(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.request(Method::POST, path, body.into(), &[]).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post_json(&self, path: &str, value: &serde_json::Value) -> TestResponse {
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.request(
            Method::POST,
            path,
            body,
            &[("content-type", "application/json")],
        )
        .await
    }

    /// Sends a PUT request with a raw body.
    pub async fn put(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.request(Method::PUT, path, body.into(), &[]).await
    }

    /// Sends a PATCH request with a raw body.
    pub async fn patch(&self, path: &str, body: impl Into<Vec<u8>>) -> TestResponse {
        self.request(Method::PATCH, path, body.into(), &[]).await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, Vec::new(), &[]).await
    }

    /// Sends a HEAD request.
    pub async fn head(&self, path: &str) -> TestResponse {
        self.request(Method::HEAD, path, Vec::new(), &[]).await
    }

    /// Sends an OPTIONS request.
    pub async fn options(&self, path: &str) -> TestResponse {
        self.request(Method::OPTIONS, path, Vec::new(), &[]).await
    }

    /// Sends a request with an arbitrary method, body and headers.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        match builder.body(Body::from(body)) {
            Ok(req) => self.send(req).await,
            Err(e) => TestResponse {
                status: StatusCode::BAD_REQUEST,
                headers: HeaderMap::new(),
                body: format!("invalid test request: {e}").into_bytes(),
            },
        }
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = match self.app.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .map_or_else(|_| Bytes::new(), http_body_util::Collected::to_bytes);

        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }
}

/// The response from a test request.
#[derive(Debug)]
pub struct TestResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body as raw bytes.
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Returns the response body as a UTF-8 string.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Deserializes the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ExpressError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ExpressError::SerializationError(e.to_string()))
    }

    /// Returns the numeric status code.
    pub const fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the value of a header by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns `true` if the response has the specified header.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Returns `true` if the response body contains the given text.
    pub fn contains(&self, text: &str) -> bool {
        self.text().contains(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};

    fn test_app() -> Router {
        Router::new()
            .route("/hello", get(|| async { "Hello, World!" }))
            .route(
                "/json",
                get(|| async { axum::Json(serde_json::json!({"key": "value"})) }),
            )
            .route("/echo", post(|body: String| async move { body }))
    }

    #[tokio::test]
    async fn test_get_simple() {
        let client = TestClient::new(test_app());
        let response = client.get("/hello").await;
        assert_eq!(response.status_code(), 200);
        assert!(response.contains("World"));
    }

    #[tokio::test]
    async fn test_json() {
        let client = TestClient::new(test_app());
        let value: serde_json::Value = client.get("/json").await.json().unwrap();
        assert_eq!(value["key"], "value");
        assert!(client.get("/hello").await.json::<serde_json::Value>().is_err());
    }

    #[tokio::test]
    async fn test_post_body() {
        let client = TestClient::new(test_app());
        let response = client.post("/echo", "ping").await;
        assert_eq!(response.text(), "ping");
    }

    #[tokio::test]
    async fn test_header_lookup() {
        let client = TestClient::new(test_app());
        let response = client.get("/json").await;
        assert!(response.has_header("content-type"));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let client = TestClient::new(test_app());
        let response = client.get("not a uri").await;
        assert_eq!(response.status_code(), 400);
    }
}
