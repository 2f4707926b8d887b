//! End-to-end dispatch tests: applications driven over the axum adapter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use express_rs_app::Application;
use express_rs_core::{ExpressError, RouterOptions, Settings};
use express_rs_http::routing::{
    error_sync_fn, from_sync_fn, param_fn, param_sync_fn, Middleware, Next,
};
use express_rs_http::Router;
use express_rs_test::{RequestFactory, TestClient};

fn test_settings() -> Settings {
    Settings {
        env: "test".into(),
        ..Settings::default()
    }
}

fn send(body: &'static str) -> Middleware {
    from_sync_fn(move |_req, res| {
        res.send(body);
        Next::Handled
    })
    .into()
}

// ── Pattern matching ─────────────────────────────────────────────────

#[tokio::test]
async fn test_required_and_optional_params() {
    let mut app = Application::new(test_settings());
    app.get(
        "/user/:id",
        from_sync_fn(|req, res| {
            res.send(format!("user {}", req.param("id").unwrap_or("-")));
            Next::Handled
        }),
    )
    .unwrap();
    app.get(
        "/team/:id?",
        from_sync_fn(|req, res| {
            res.send(format!("team {}", req.param("id").unwrap_or("-")));
            Next::Handled
        }),
    )
    .unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/user/42").await.text(), "user 42");
    assert_eq!(client.get("/user/42/").await.text(), "user 42");
    assert_eq!(client.get("/user/").await.status_code(), 404);
    assert_eq!(client.get("/team/").await.text(), "team -");
    assert_eq!(client.get("/team/7").await.text(), "team 7");
}

#[tokio::test]
async fn test_strict_routing_rejects_trailing_slash() {
    let mut app = Application::new(Settings {
        strict_routing: true,
        ..test_settings()
    });
    app.get("/user/:id", send("user")).unwrap();
    app.get("/team/:id?", send("team")).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/user/42").await.text(), "user");
    assert_eq!(client.get("/user/42/").await.status_code(), 404);
    assert_eq!(client.get("/team/").await.status_code(), 404);
    assert_eq!(client.get("/team").await.text(), "team");
}

#[tokio::test]
async fn test_percent_decoded_params() {
    let mut app = Application::new(test_settings());
    app.get(
        "/files/:name",
        from_sync_fn(|req, res| {
            res.send(req.param("name").unwrap_or_default().to_string());
            Next::Handled
        }),
    )
    .unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/files/a%2Fb").await.text(), "a/b");
    assert_eq!(client.get("/files/%E0%A4%A").await.status_code(), 400);
}

// ── Mounting ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mount_strips_and_restores_url() {
    let mut sub = Router::new();
    sub.middleware(from_sync_fn(|req, res| {
        let seen = format!("inner {} {}", req.base_url(), req.url());
        res.set_header("x-inner", &seen).unwrap();
        Next::Continue
    }));

    let mut app = Application::new(test_settings());
    app.mount("/foo", sub).unwrap();
    app.middleware(from_sync_fn(|req, res| {
        res.send(format!("outer [{}] {}", req.base_url(), req.url()));
        Next::Handled
    }));
    let client = TestClient::from_app(app);

    let response = client.get("/foo/bar?x=1").await;
    assert_eq!(response.header("x-inner"), Some("inner /foo /bar?x=1"));
    assert_eq!(response.text(), "outer [] /foo/bar?x=1");

    let response = client.get("/foobar").await;
    assert!(!response.has_header("x-inner"));
}

#[tokio::test]
async fn test_fully_qualified_url_keeps_scheme_and_host() {
    let mut sub = Router::new();
    sub.get(
        "/bar",
        from_sync_fn(|req, res| {
            res.send(format!("{}|{}", req.base_url(), req.url()));
            Next::Handled
        }),
    )
    .unwrap();
    let mut router = Router::new();
    router.mount("/foo", sub).unwrap();

    let factory = RequestFactory::new();
    let out = RequestFactory::dispatch(&router, factory.get("http://example.com/foo/bar")).await;
    assert_eq!(out.text(), "/foo|http://example.com/bar");
    assert_eq!(out.request.url(), "http://example.com/foo/bar");
    assert_eq!(out.request.base_url(), "");
}

#[tokio::test]
async fn test_nested_applications() {
    let mut blog = Application::new(test_settings());
    blog.get(
        "/posts/:slug",
        from_sync_fn(|req, res| {
            res.send(format!(
                "{} {} {}",
                req.original_url(),
                req.base_url(),
                req.param("slug").unwrap_or_default()
            ));
            Next::Handled
        }),
    )
    .unwrap();

    let mut app = Application::new(test_settings());
    app.mount_app("/blog", blog).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(
        client.get("/blog/posts/hello").await.text(),
        "/blog/posts/hello /blog hello"
    );
}

#[tokio::test]
async fn test_merge_params_through_mount() {
    let mut items = Router::with_options(RouterOptions::default().merge_params(true));
    items
        .get(
            "/items/:item",
            from_sync_fn(|req, res| {
                res.send(format!(
                    "{}/{}",
                    req.param("user").unwrap_or("-"),
                    req.param("item").unwrap_or("-")
                ));
                Next::Handled
            }),
        )
        .unwrap();

    let mut app = Application::new(test_settings());
    app.mount("/users/:user", items).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/users/ann/items/9").await.text(), "ann/9");
}

// ── Parameter callbacks ──────────────────────────────────────────────

#[tokio::test]
async fn test_param_callback_once_per_value_across_mounts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut first = Router::new();
    first.middleware(from_sync_fn(|_req, _res| Next::Continue));
    let mut second = Router::new();
    second.middleware(from_sync_fn(|req, res| {
        res.send(format!("user={}", req.locals().get_str("user").unwrap_or("-")));
        Next::Handled
    }));

    let mut app = Application::new(test_settings());
    app.param(
        "user",
        param_sync_fn(move |req, _res, value| {
            counter.fetch_add(1, Ordering::SeqCst);
            req.locals_mut().insert_value("user", value.into());
            Next::Continue
        }),
    );
    app.mount("/:user", first).unwrap();
    app.mount("/:user", second).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/ann/x").await.text(), "user=ann");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_param_callback_runs_again_for_new_value() {
    let mut app = Application::new(test_settings());
    app.param(
        "user",
        param_sync_fn(|req, _res, _value| {
            let count = req.locals().get_i64("count").unwrap_or(0) + 1;
            req.locals_mut().insert_value("count", count.into());
            Next::Continue
        }),
    );
    app.get("/:user/bob", from_sync_fn(|_req, _res| Next::Continue))
        .unwrap();
    app.get(
        "/foo/:user",
        from_sync_fn(|req, res| {
            res.send(format!(
                "{} {}",
                req.param("user").unwrap_or_default(),
                req.locals().get_i64("count").unwrap_or(0)
            ));
            Next::Handled
        }),
    )
    .unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/foo/bob").await.text(), "bob 2");
}

#[tokio::test]
async fn test_concurrent_requests_do_not_share_param_state() {
    let mut app = Application::new(test_settings());
    app.param(
        "id",
        param_fn(|req, _res, value| {
            Box::pin(async move {
                let delay = if value == "50" { 40 } else { 1 };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                req.locals_mut().insert_value("user", value.into());
                Next::Continue
            })
        }),
    );
    app.get(
        "/user/:id",
        from_sync_fn(|req, res| {
            res.send(req.locals().get_str("user").unwrap_or("-").to_string());
            Next::Handled
        }),
    )
    .unwrap();
    let client = TestClient::from_app(app);

    let (slow, fast) = tokio::join!(client.get("/user/50"), client.get("/user/10"));
    assert_eq!(slow.text(), "50");
    assert_eq!(fast.text(), "10");
}

#[tokio::test]
async fn test_param_callback_error_reaches_error_handler() {
    let mut app = Application::new(test_settings());
    app.param(
        "id",
        param_sync_fn(|_req, _res, value| {
            if value.parse::<u32>().is_ok() {
                Next::Continue
            } else {
                Next::Error(ExpressError::BadRequest(format!("bad id {value}")))
            }
        }),
    );
    app.get("/user/:id", send("found")).unwrap();
    app.middleware(error_sync_fn(|err, _req, res| {
        res.set_status(http::StatusCode::BAD_REQUEST);
        res.send(format!("caught: {err}"));
        Next::Handled
    }));
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/user/12").await.text(), "found");
    let response = client.get("/user/abc").await;
    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains("bad id abc"));
}

// ── Errors and sentinels ─────────────────────────────────────────────

#[tokio::test]
async fn test_panic_chain_reaches_next_error_handler() {
    let mut app = Application::new(test_settings());
    app.get("/", from_sync_fn(|_req, _res| panic!("first failure")))
        .unwrap();
    app.middleware(error_sync_fn(|err, _req, _res| {
        assert_eq!(err.to_string(), "first failure");
        panic!("second failure")
    }));
    app.middleware(error_sync_fn(|err, _req, res| {
        res.send(format!("last saw: {err}"));
        Next::Handled
    }));
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/").await.text(), "last saw: second failure");
}

#[tokio::test]
async fn test_unhandled_panic_is_500() {
    let mut app = Application::new(test_settings());
    app.get("/", from_sync_fn(|_req, _res| panic!("kaboom")))
        .unwrap();
    let client = TestClient::from_app(app);

    let response = client.get("/").await;
    assert_eq!(response.status_code(), 500);
    assert!(response.contains("kaboom"));
}

#[tokio::test]
async fn test_route_sentinel_skips_without_error() {
    let mut app = Application::new(test_settings());
    app.route("/x")
        .unwrap()
        .get(from_sync_fn(|_req, _res| Next::Route))
        .get(send("same route"));
    app.middleware(error_sync_fn(|_err, _req, res| {
        res.send("error handler");
        Next::Handled
    }));
    app.get("/x", send("next route")).unwrap();
    let client = TestClient::from_app(app);

    let response = client.get("/x").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "next route");
}

#[tokio::test]
async fn test_router_sentinel_leaves_mounted_router() {
    let mut sub = Router::new();
    sub.middleware(from_sync_fn(|_req, _res| Next::Router));
    sub.middleware(send("inside"));

    let mut app = Application::new(test_settings());
    app.mount("/api", sub).unwrap();
    app.middleware(send("outside"));
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/api/x").await.text(), "outside");
}

#[tokio::test]
async fn test_many_layers_do_not_overflow() {
    let mut app = Application::new(test_settings());
    for i in 0..6000 {
        app.get(format!("/nope/{i}"), send("wrong")).unwrap();
    }
    app.get("/yes", send("found")).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/yes").await.text(), "found");
}

// ── Methods ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_automatic_options_response() {
    let mut app = Application::new(test_settings());
    app.get("/items", send("list")).unwrap();
    app.post("/items", send("create")).unwrap();
    let client = TestClient::from_app(app);

    let response = client.options("/items").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("allow"), Some("GET,HEAD,POST"));
    assert_eq!(response.text(), "GET,HEAD,POST");
}

#[tokio::test]
async fn test_method_routing() {
    let mut app = Application::new(test_settings());
    app.get("/thing", send("get")).unwrap();
    app.put("/thing", send("put")).unwrap();
    app.delete("/thing", send("delete")).unwrap();
    app.all("/any", send("any")).unwrap();
    let client = TestClient::from_app(app);

    assert_eq!(client.get("/thing").await.text(), "get");
    assert_eq!(client.put("/thing", "").await.text(), "put");
    assert_eq!(client.delete("/thing").await.text(), "delete");
    assert_eq!(client.patch("/thing", "").await.status_code(), 404);
    assert_eq!(client.head("/thing").await.status_code(), 200);
    assert_eq!(client.patch("/any", "").await.text(), "any");
}

// ── Application defaults ─────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_and_default_headers() {
    let mut app = Application::new(test_settings());
    app.get("/", send("home")).unwrap();
    let client = TestClient::from_app(app);

    let response = client.get("/").await;
    assert_eq!(response.header("x-powered-by"), Some("Express-rs"));

    let response = client.post("/missing", "").await;
    assert_eq!(response.status_code(), 404);
    assert!(response.contains("Cannot POST /missing"));
}

#[tokio::test]
async fn test_json_response_through_client() {
    let mut app = Application::new(test_settings());
    app.get(
        "/api/:id",
        from_sync_fn(|req, res| {
            let body = serde_json::json!({ "id": req.param("id"), "route": req.route_path() });
            Next::handled_or_error(res.json(&body))
        }),
    )
    .unwrap();
    let client = TestClient::from_app(app);

    let value: serde_json::Value = client.get("/api/3").await.json().unwrap();
    assert_eq!(value["id"], "3");
    assert_eq!(value["route"], "/api/:id");
}
