//! HTTP server integration.
//!
//! Converts an [`Application`] into an Axum router so it can be served by
//! `axum::serve` or driven directly in tests with `tower::ServiceExt::oneshot`.
//! Every incoming request is buffered, converted into an express-rs
//! [`Request`](express_rs_http::Request), and run through
//! [`Application::handle`] inside a per-request tracing span.
//!
//! # Examples
//!
//! ```no_run
//! use express_rs_app::Application;
//! use express_rs_core::Settings;
//! use express_rs_http::routing::{from_sync_fn, Next};
//!
//! # async fn example() -> Result<(), express_rs_core::ExpressError> {
//! let mut app = Application::new(Settings::default());
//! app.get("/", from_sync_fn(|_req, res| {
//!     res.send("Hello!");
//!     Next::Handled
//! }))?;
//!
//! app.listen("127.0.0.1:3000").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::body::Body;
use axum::response::IntoResponse;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use express_rs_core::logging::request_span;
use express_rs_core::ExpressError;
use express_rs_http::{Request, Response};

use crate::application::Application;

impl Application {
    /// Converts the application into an Axum router.
    ///
    /// Every path and method falls through to the application; nothing is
    /// routed by Axum itself.
    pub fn into_axum_router(self) -> axum::Router {
        let app = Arc::new(self);

        let handler = move |req: axum::extract::Request<Body>| {
            let app = app.clone();

            async move {
                let request_id = uuid::Uuid::new_v4().to_string();
                let span = request_span(&request_id, req.method().as_str(), &req.uri().to_string());

                let (parts, body) = req.into_parts();
                let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        tracing::warn!(parent: &span, error = %e, "failed to read request body");
                        Vec::new()
                    }
                };

                let mut request = Request::from_axum(parts, body_bytes);
                let mut response = Response::new();
                app.handle(&mut request, &mut response, None)
                    .instrument(span)
                    .await;
                response.into_response()
            }
        };

        axum::Router::new()
            .fallback(handler)
            .layer(TraceLayer::new_for_http())
    }

    /// Serves the application on `settings.bind_address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a runtime error.
    pub async fn run(self) -> Result<(), ExpressError> {
        let addr = self.settings().bind_address.clone();
        self.listen(&addr).await
    }

    /// Serves the application on the given address.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the address or encounters
    /// a runtime error.
    pub async fn listen(self, addr: &str) -> Result<(), ExpressError> {
        let debug = self.settings().debug;
        let router = self.into_axum_router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            ExpressError::ImproperlyConfigured(format!("Failed to bind to {addr}: {e}"))
        })?;

        if debug {
            tracing::info!("Express-rs listening at http://{addr}/");
        }

        axum::serve(listener, router)
            .await
            .map_err(|e| ExpressError::InternalServerError(format!("Server error: {e}")))?;

        Ok(())
    }
}
