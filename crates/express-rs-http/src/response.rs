//! HTTP response type.
//!
//! [`Response`] is mutated in place by handlers. A response that has been
//! [`send`](Response::send)-ed or [`end`](Response::end)-ed is *finished*: the
//! default final handler leaves it alone, and writing to it again is logged and
//! ignored.

use axum::response::IntoResponse;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use express_rs_core::{ExpressError, ExpressResult};

/// An HTTP response being built by the handler stack.
///
/// # Examples
///
/// ```
/// use express_rs_http::Response;
///
/// let mut res = Response::new();
/// res.status(http::StatusCode::CREATED).send("done");
///
/// assert_eq!(res.status_code(), http::StatusCode::CREATED);
/// assert_eq!(res.text(), "done");
/// assert!(res.is_finished());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    finished: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            finished: false,
        }
    }

    /// Sets the status code, returning `self` for chaining.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Returns a header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a header from strings, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::BadRequest`] if the name or value is not a valid
    /// header token.
    pub fn set_header(&mut self, name: &str, value: &str) -> ExpressResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ExpressError::BadRequest(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ExpressError::BadRequest(format!("Invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Sets an already-validated header.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Sends a body and finishes the response.
    ///
    /// Sets `Content-Type: text/html; charset=utf-8` unless one is already set.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        if self.finished {
            tracing::warn!(status = %self.status, "response already sent; ignoring send");
            return self;
        }
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }
        self.body = body.into();
        self.finished = true;
        self
    }

    /// Sets the status and sends its canonical reason phrase as the body.
    pub fn send_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        let reason = status.canonical_reason().unwrap_or("Unknown");
        self.send(reason)
    }

    /// Serializes `value` as JSON and sends it.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::SerializationError`] if serialization fails.
    pub fn json<T: Serialize>(&mut self, value: &T) -> ExpressResult<()> {
        let body = serde_json::to_vec(value)?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(body);
        Ok(())
    }

    /// Redirects with `302 Found`.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a valid header value.
    pub fn redirect(&mut self, location: &str) -> ExpressResult<()> {
        self.redirect_with_status(StatusCode::FOUND, location)
    }

    /// Redirects with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a valid header value.
    pub fn redirect_with_status(&mut self, status: StatusCode, location: &str) -> ExpressResult<()> {
        let value = HeaderValue::from_str(location)
            .map_err(|e| ExpressError::BadRequest(format!("Invalid redirect location: {e}")))?;
        self.headers.insert(LOCATION, value);
        self.status = status;
        let reason = status.canonical_reason().unwrap_or("Redirecting");
        self.send(format!("{reason}. Redirecting to {location}"));
        Ok(())
    }

    /// Finishes the response without changing the body.
    pub fn end(&mut self) {
        self.finished = true;
    }

    /// Returns `true` once the response has been sent or ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as a (lossy) UTF-8 string.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(axum::body::Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_ok_and_unfinished() {
        let res = Response::new();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(!res.is_finished());
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_send_sets_html_content_type() {
        let mut res = Response::new();
        res.send("<p>hi</p>");
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(res.text(), "<p>hi</p>");
    }

    #[test]
    fn test_send_keeps_existing_content_type() {
        let mut res = Response::new();
        res.set_header("Content-Type", "text/plain").unwrap();
        res.send("hi");
        assert_eq!(res.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_second_send_ignored() {
        let mut res = Response::new();
        res.send("first");
        res.send("second");
        assert_eq!(res.text(), "first");
    }

    #[test]
    fn test_send_status() {
        let mut res = Response::new();
        res.send_status(StatusCode::NOT_FOUND);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.text(), "Not Found");
    }

    #[test]
    fn test_json() {
        let mut res = Response::new();
        res.json(&serde_json::json!({"id": 1})).unwrap();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.text(), r#"{"id":1}"#);
    }

    #[test]
    fn test_redirect() {
        let mut res = Response::new();
        res.redirect("/login").unwrap();
        assert_eq!(res.status_code(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("/login"));
        assert!(res.is_finished());
    }

    #[test]
    fn test_set_header_invalid() {
        let mut res = Response::new();
        assert!(res.set_header("bad name", "x").is_err());
        assert!(res.set_header("X-Ok", "bad\nvalue").is_err());
    }

    #[test]
    fn test_into_axum_response() {
        let mut res = Response::new();
        res.status(StatusCode::ACCEPTED).send("queued");
        let axum_res = res.into_response();
        assert_eq!(axum_res.status(), StatusCode::ACCEPTED);
        assert_eq!(
            axum_res.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
    }
}
