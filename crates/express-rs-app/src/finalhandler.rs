//! The default final handler.
//!
//! Runs when a request falls off the end of the application's stack. With no
//! pending error the response is `404 Cannot <METHOD> <path>`; with an error
//! the status comes from [`ExpressError::status_code`]. Outside production the
//! error message is shown; in production only the status reason phrase is.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use express_rs_core::{ExpressError, Settings};
use express_rs_http::{uri, Request, Response};

/// Finishes a request nothing else handled.
///
/// A response that is already finished is left untouched.
pub fn finalize(
    settings: &Settings,
    err: Option<ExpressError>,
    req: &Request,
    res: &mut Response,
) {
    let (status, message) = match &err {
        Some(err) => {
            let status = StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if settings.env != "test" {
                tracing::error!(status = status.as_u16(), error = %err, "unhandled error");
            }
            let message = if settings.is_production() {
                status.canonical_reason().unwrap_or("Error").to_string()
            } else {
                err.to_string()
            };
            (status, message)
        }
        None => {
            let path = uri::pathname(req.original_url()).unwrap_or("resource");
            tracing::debug!(method = %req.method(), path, "no route matched");
            (
                StatusCode::NOT_FOUND,
                format!("Cannot {} {path}", req.method()),
            )
        }
    };

    if res.is_finished() {
        return;
    }

    res.set_status(status);
    res.insert_header(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    res.insert_header(
        http::header::HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'"),
    );
    res.insert_header(
        http::header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    res.send(error_document(&message));
}

fn error_document(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Error</title>\n</head>\n<body>\n<pre>{}</pre>\n</body>\n</html>\n",
        escape_html(message)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
        Settings {
            env: "test".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_not_found() {
        let req = Request::builder().url("/missing?x=1").build();
        let mut res = Response::new();
        finalize(&test_settings(), None, &req, &mut res);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert!(res.text().contains("<pre>Cannot GET /missing</pre>"));
        assert_eq!(res.header("x-content-type-options"), Some("nosniff"));
    }

    #[test]
    fn test_error_status_and_message() {
        let req = Request::builder().build();
        let mut res = Response::new();
        let err = ExpressError::http(403, "forbidden zone");
        finalize(&test_settings(), Some(err), &req, &mut res);
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert!(res.text().contains("forbidden zone"));
    }

    #[test]
    fn test_panic_is_500() {
        let req = Request::builder().build();
        let mut res = Response::new();
        finalize(
            &test_settings(),
            Some(ExpressError::Panic("boom".into())),
            &req,
            &mut res,
        );
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.text().contains("<pre>boom</pre>"));
    }

    #[test]
    fn test_production_hides_message() {
        let settings = Settings {
            env: "production".into(),
            ..Settings::default()
        };
        let req = Request::builder().build();
        let mut res = Response::new();
        finalize(
            &settings,
            Some(ExpressError::InternalServerError("db password".into())),
            &req,
            &mut res,
        );
        assert!(!res.text().contains("db password"));
        assert!(res.text().contains("Internal Server Error"));
    }

    #[test]
    fn test_message_escaped() {
        let req = Request::builder().url("/<script>").build();
        let mut res = Response::new();
        finalize(&test_settings(), None, &req, &mut res);
        assert!(res.text().contains("Cannot GET /&lt;script&gt;"));
    }

    #[test]
    fn test_finished_response_untouched() {
        let req = Request::builder().build();
        let mut res = Response::new();
        res.send("already done");
        finalize(
            &test_settings(),
            Some(ExpressError::BadRequest("late".into())),
            &req,
            &mut res,
        );
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.text(), "already done");
    }
}
