//! HTTP request type.
//!
//! [`Request`] is what every handler receives. Besides the usual method,
//! headers, and body it carries the routing state the dispatch engine mutates
//! as it walks nested routers: the current `url` (with mounted prefixes
//! trimmed), the `base_url` (the prefixes trimmed so far), and the captured
//! `params`. `original_url` never changes.

use std::collections::HashMap;

use http::{HeaderMap, Method};

pub use crate::uri::QueryMap;
use crate::locals::Locals;
use crate::uri;

/// An HTTP request flowing through the router.
///
/// # Examples
///
/// ```
/// use express_rs_http::Request;
///
/// let request = Request::builder()
///     .method(http::Method::GET)
///     .url("/users/42?tab=posts")
///     .build();
///
/// assert_eq!(request.method(), &http::Method::GET);
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.original_url(), "/users/42?tab=posts");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    original_url: String,
    url: String,
    base_url: String,
    params: HashMap<String, String>,
    query: Option<QueryMap>,
    headers: HeaderMap,
    body: Vec<u8>,
    route_path: Option<String>,
    locals: Locals,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Creates a `Request` from an axum/hyper request and its body bytes.
    ///
    /// An absolute-form request target (as sent to proxies) is kept fully
    /// qualified; the router never trims its scheme and host.
    pub fn from_axum(parts: http::request::Parts, body: Vec<u8>) -> Self {
        let url = if parts.uri.scheme().is_some() {
            parts.uri.to_string()
        } else {
            parts
                .uri
                .path_and_query()
                .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
        };

        Self {
            method: parts.method,
            original_url: url.clone(),
            url,
            base_url: String::new(),
            params: HashMap::new(),
            query: None,
            headers: parts.headers,
            body,
            route_path: None,
            locals: Locals::new(),
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URL as first received, before any mount trimming.
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Returns the URL relative to the current mount point.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Replaces the URL relative to the current mount point.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Returns the path prefix trimmed by enclosing mounts (empty at the top level).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the mount prefix.
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    /// Returns the path portion of [`url`](Self::url), without query string.
    pub fn path(&self) -> &str {
        uri::pathname(&self.url).unwrap_or(&self.url)
    }

    /// Returns the captured path parameters of the current layer.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a single captured path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns a mutable reference to the captured parameters.
    ///
    /// Parameter callbacks use this to rewrite a value for later handlers.
    pub fn params_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.params
    }

    /// Replaces the captured parameters.
    pub fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Returns the path of the Route currently dispatching, if any.
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.as_deref()
    }

    /// Records the path of the Route currently dispatching.
    pub fn set_route_path(&mut self, path: impl Into<String>) {
        self.route_path = Some(path.into());
    }

    /// Returns the per-request storage shared between handlers.
    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    /// Returns mutable per-request storage.
    pub fn locals_mut(&mut self) -> &mut Locals {
        &mut self.locals
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the parsed query string.
    ///
    /// `None` until the query parser middleware has run.
    pub fn query(&self) -> Option<&QueryMap> {
        self.query.as_ref()
    }

    /// Stores the parsed query string.
    pub fn set_query(&mut self, query: QueryMap) {
        self.query = Some(query);
    }

    /// Returns the first value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .as_ref()
            .and_then(|q| q.get(name))
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A builder for constructing [`Request`] instances.
///
/// This provides a fluent API for building requests without needing
/// a full axum request.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: "/".to_string(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl RequestBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the method from a string, e.g. `"purge"`.
    ///
    /// Method names are normalized to uppercase. An invalid token is ignored.
    #[must_use]
    pub fn method_str(mut self, method: &str) -> Self {
        if let Ok(method) = Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            self.method = method;
        }
        self
    }

    /// Sets the request URL (path and optional query, or a fully qualified URL).
    #[must_use]
    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the [`Request`].
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            original_url: self.url.clone(),
            url: self.url,
            base_url: String::new(),
            params: HashMap::new(),
            query: None,
            headers: self.headers,
            body: self.body,
            route_path: None,
            locals: Locals::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let req = Request::builder().build();
        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.url(), "/");
        assert_eq!(req.base_url(), "");
        assert!(req.params().is_empty());
        assert!(req.query().is_none());
        assert!(req.route_path().is_none());
    }

    #[test]
    fn test_path_strips_query() {
        let req = Request::builder().url("/a/b?c=1").build();
        assert_eq!(req.path(), "/a/b");
    }

    #[test]
    fn test_path_fully_qualified() {
        let req = Request::builder().url("http://example.com/blog?x").build();
        assert_eq!(req.path(), "/blog");
    }

    #[test]
    fn test_method_str_uppercases() {
        let req = Request::builder().method_str("purge").build();
        assert_eq!(req.method().as_str(), "PURGE");
    }

    #[test]
    fn test_headers() {
        let req = Request::builder()
            .header("X-Token", "abc")
            .header("bad header", "ignored")
            .build();
        assert_eq!(req.header("x-token"), Some("abc"));
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_url_mutation_keeps_original() {
        let mut req = Request::builder().url("/blog/post").build();
        req.set_url("/post");
        req.set_base_url("/blog");
        assert_eq!(req.url(), "/post");
        assert_eq!(req.base_url(), "/blog");
        assert_eq!(req.original_url(), "/blog/post");
    }

    #[test]
    fn test_params_and_query() {
        let mut req = Request::builder().url("/?q=rust&q=go").build();
        req.params_mut().insert("id".into(), "42".into());
        req.set_query(uri::parse_query(req.url()));
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.query_param("q"), Some("rust"));
        assert_eq!(req.query().unwrap().get("q").unwrap().len(), 2);
    }

    #[test]
    fn test_from_axum_origin_form() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/items?sort=asc")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_axum(parts, b"{}".to_vec());
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.url(), "/items?sort=asc");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body(), b"{}");
    }

    #[test]
    fn test_from_axum_absolute_form() {
        let (parts, ()) = http::Request::builder()
            .uri("http://example.com/blog")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_axum(parts, Vec::new());
        assert_eq!(req.url(), "http://example.com/blog");
        assert_eq!(req.path(), "/blog");
    }
}
