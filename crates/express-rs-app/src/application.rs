//! The application container.
//!
//! [`Application`] is a thin owner around one [`Router`]. The router is created
//! on first registration and seeded with the [bootstrap](crate::bootstrap)
//! middleware. Applications can be mounted inside other applications; the
//! child records where it was mounted and runs its `on_mount` hooks once.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use express_rs_core::{ExpressError, ExpressResult, Settings};
use express_rs_http::routing::{Handler, Middleware, Next, ParamCallback, PathSpec, Route};
use express_rs_http::{Request, Response, Router};

use crate::bootstrap::{Init, QueryParser};
use crate::finalhandler;

/// The terminal callback passed to [`Application::handle`].
pub type Done = Box<dyn FnOnce(Option<ExpressError>, &mut Request, &mut Response) + Send>;

type MountHook = Box<dyn FnOnce(&Application) + Send + Sync>;

/// Where an application sits in the mount tree.
///
/// Shared between a parent and its mounted children, so a child's full path
/// follows its parent even when the parent is mounted later.
#[derive(Debug)]
struct MountPoint {
    path: RwLock<String>,
    parent: RwLock<Option<Arc<MountPoint>>>,
}

impl MountPoint {
    fn new() -> Self {
        Self {
            path: RwLock::new("/".to_string()),
            parent: RwLock::new(None),
        }
    }

    fn mount_path(&self) -> String {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn attach(&self, path: String, parent: Arc<Self>) {
        *self.path.write().unwrap_or_else(PoisonError::into_inner) = path;
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(parent);
    }

    fn full_path(&self) -> String {
        let parent = self
            .parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        parent.map_or_else(String::new, |parent| {
            format!("{}{}", parent.full_path(), self.mount_path())
        })
    }
}

/// An express-rs application.
///
/// # Examples
///
/// ```
/// use express_rs_app::Application;
/// use express_rs_core::Settings;
/// use express_rs_http::routing::{from_sync_fn, Next};
/// use express_rs_http::{Request, Response};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mut app = Application::new(Settings::default());
/// app.get("/", from_sync_fn(|_req, res| {
///     res.send("home");
///     Next::Handled
/// }))
/// .unwrap();
///
/// let mut req = Request::builder().url("/").build();
/// let mut res = Response::new();
/// app.handle(&mut req, &mut res, None).await;
/// assert_eq!(res.text(), "home");
/// # });
/// ```
pub struct Application {
    settings: Settings,
    router: Option<Router>,
    mount: Arc<MountPoint>,
    mount_hooks: Vec<MountHook>,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("router", &self.router)
            .field("mount_path", &self.mount_path())
            .finish_non_exhaustive()
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Application {
    /// Creates an application with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            router: None,
            mount: Arc::new(MountPoint::new()),
            mount_hooks: Vec::new(),
        }
    }

    /// Returns the application settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the path this application was mounted at (`/` if never mounted).
    pub fn mount_path(&self) -> String {
        self.mount.mount_path()
    }

    /// Returns the full mount path: the parent's path followed by this
    /// application's mount path, or an empty string at the top level.
    ///
    /// The path is resolved on each call, so mounting a parent after its
    /// children were mounted is reflected here.
    pub fn path(&self) -> String {
        self.mount.full_path()
    }

    /// Returns `true` once anything has been registered.
    pub const fn has_router(&self) -> bool {
        self.router.is_some()
    }

    /// Returns the router, creating and seeding it on first use.
    pub fn router(&mut self) -> &mut Router {
        let settings = &self.settings;
        self.router.get_or_insert_with(|| {
            tracing::debug!(env = %settings.env, "creating application router");
            let mut router = Router::with_options(settings.router_options());
            router.middleware(Middleware::request(QueryParser));
            router.middleware(Middleware::request(Init::new(settings.x_powered_by)));
            router
        })
    }

    /// Registers a hook that runs when this application is mounted in a parent.
    ///
    /// The hook receives the parent application.
    pub fn on_mount(&mut self, hook: impl FnOnce(&Self) + Send + Sync + 'static) -> &mut Self {
        self.mount_hooks.push(Box::new(hook));
        self
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Adds middleware that runs for every path.
    pub fn middleware(&mut self, handler: impl Into<Middleware>) -> &mut Self {
        self.router().middleware(handler);
        self
    }

    /// Adds middleware (or a router) under a path prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn mount(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().mount(path, handler)?;
        Ok(self)
    }

    /// Mounts a child application under a path prefix.
    ///
    /// The child records its mount path and a link to this application's mount
    /// point, and its `on_mount` hooks run once with `self` as the parent.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn mount_app(
        &mut self,
        path: impl Into<PathSpec>,
        mut child: Self,
    ) -> ExpressResult<&mut Self> {
        let spec = path.into();
        child.mount.attach(spec.to_string(), Arc::clone(&self.mount));
        for hook in std::mem::take(&mut child.mount_hooks) {
            hook(self);
        }
        tracing::debug!(path = %spec, "mounted sub-application");
        self.router()
            .mount(spec, Middleware::request(MountedApp(Arc::new(child))))?;
        Ok(self)
    }

    /// Creates a route for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn route(&mut self, path: impl Into<PathSpec>) -> ExpressResult<&mut Route> {
        self.router().route(path)
    }

    /// Registers a handler for a method given by name.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile or `method` is invalid.
    pub fn method(
        &mut self,
        method: &str,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().method(method, path, handler)?;
        Ok(self)
    }

    /// Registers a `GET` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn get(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().get(path, handler)?;
        Ok(self)
    }

    /// Registers a `POST` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn post(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().post(path, handler)?;
        Ok(self)
    }

    /// Registers a `PUT` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn put(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().put(path, handler)?;
        Ok(self)
    }

    /// Registers a `PATCH` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn patch(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().patch(path, handler)?;
        Ok(self)
    }

    /// Registers a `DELETE` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn delete(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().delete(path, handler)?;
        Ok(self)
    }

    /// Registers a `HEAD` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn head(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().head(path, handler)?;
        Ok(self)
    }

    /// Registers an `OPTIONS` handler.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn options_route(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().options_route(path, handler)?;
        Ok(self)
    }

    /// Registers a handler for every method.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not compile.
    pub fn all(
        &mut self,
        path: impl Into<PathSpec>,
        handler: impl Into<Middleware>,
    ) -> ExpressResult<&mut Self> {
        self.router().all(path, handler)?;
        Ok(self)
    }

    /// Registers a parameter callback.
    pub fn param(&mut self, name: &str, callback: impl ParamCallback + 'static) -> &mut Self {
        self.router().param(name, callback);
        self
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Runs the request through the router without the final handler.
    ///
    /// An application with nothing registered returns [`Next::Continue`].
    pub async fn dispatch(&self, req: &mut Request, res: &mut Response) -> Next {
        match &self.router {
            Some(router) => router.handle(req, res).await,
            None => {
                tracing::debug!("no routes defined on app");
                Next::Continue
            }
        }
    }

    /// Handles a request end to end.
    ///
    /// When the stack is exhausted, `done` is called with the pending error (if
    /// any); without `done` the default [final handler](finalhandler::finalize)
    /// responds instead.
    pub async fn handle(&self, req: &mut Request, res: &mut Response, done: Option<Done>) {
        let err = match self.dispatch(req, res).await {
            Next::Handled => return,
            Next::Error(err) => Some(err),
            Next::Continue | Next::Route | Next::Router => None,
        };

        match done {
            Some(done) => done(err, req, res),
            None => finalhandler::finalize(&self.settings, err, req, res),
        }
    }
}

/// A child application mounted inside a parent's router.
struct MountedApp(Arc<Application>);

#[async_trait]
impl Handler for MountedApp {
    async fn call(&self, req: &mut Request, res: &mut Response) -> Next {
        self.0.dispatch(req, res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use express_rs_http::routing::{error_sync_fn, from_sync_fn};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn test_settings() -> Settings {
        Settings {
            env: "test".into(),
            ..Settings::default()
        }
    }

    async fn run(app: &Application, url: &str) -> Response {
        let mut req = Request::builder().url(url).build();
        let mut res = Response::new();
        app.handle(&mut req, &mut res, None).await;
        res
    }

    #[test]
    fn test_router_is_lazy() {
        let mut app = Application::new(test_settings());
        assert!(!app.has_router());
        app.router();
        assert!(app.has_router());
        assert_eq!(app.router().stack().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_app_is_404() {
        let app = Application::new(test_settings());
        let res = run(&app, "/anything").await;
        assert_eq!(res.status_code(), http::StatusCode::NOT_FOUND);
        assert!(res.text().contains("Cannot GET /anything"));
        assert_eq!(res.header("x-powered-by"), None);
    }

    #[tokio::test]
    async fn test_bootstrap_runs_before_routes() {
        let mut app = Application::new(test_settings());
        app.get(
            "/search",
            from_sync_fn(|req, res| {
                let q = req.query_param("q").unwrap_or_default().to_string();
                res.send(q);
                Next::Handled
            }),
        )
        .unwrap();
        let res = run(&app, "/search?q=rust").await;
        assert_eq!(res.text(), "rust");
        assert_eq!(res.header("x-powered-by"), Some("Express-rs"));
    }

    #[tokio::test]
    async fn test_x_powered_by_disabled() {
        let mut app = Application::new(Settings {
            x_powered_by: false,
            ..test_settings()
        });
        app.get("/", from_sync_fn(|_req, res| {
            res.send("ok");
            Next::Handled
        }))
        .unwrap();
        let res = run(&app, "/").await;
        assert_eq!(res.header("x-powered-by"), None);
    }

    #[tokio::test]
    async fn test_unhandled_error_uses_status() {
        let mut app = Application::new(test_settings());
        app.middleware(from_sync_fn(|_req, _res| {
            Next::Error(ExpressError::http(422, "unprocessable"))
        }));
        let res = run(&app, "/").await;
        assert_eq!(res.status_code().as_u16(), 422);
        assert!(res.text().contains("unprocessable"));
    }

    #[tokio::test]
    async fn test_custom_done() {
        let mut app = Application::new(test_settings());
        app.middleware(from_sync_fn(|_req, _res| {
            Next::Error(ExpressError::BadRequest("x".into()))
        }));
        let mut req = Request::builder().build();
        let mut res = Response::new();
        app.handle(
            &mut req,
            &mut res,
            Some(Box::new(|err, _req, res| {
                res.send(format!("done: {}", err.map_or(0, |e| e.status_code())));
            })),
        )
        .await;
        assert_eq!(res.text(), "done: 400");
    }

    #[tokio::test]
    async fn test_case_sensitive_setting() {
        let mut app = Application::new(Settings {
            case_sensitive_routing: true,
            ..test_settings()
        });
        app.get("/Home", from_sync_fn(|_req, res| {
            res.send("home");
            Next::Handled
        }))
        .unwrap();
        assert_eq!(run(&app, "/home").await.status_code().as_u16(), 404);
        assert_eq!(run(&app, "/Home").await.text(), "home");
    }

    #[tokio::test]
    async fn test_mount_app() {
        let mounted = Arc::new(AtomicBool::new(false));
        let flag = mounted.clone();

        let mut admin = Application::new(test_settings());
        admin.on_mount(move |parent| {
            assert_eq!(parent.path(), "");
            flag.store(true, Ordering::SeqCst);
        });
        admin
            .get(
                "/users",
                from_sync_fn(|req, res| {
                    res.send(format!("{}|{}", req.base_url(), req.url()));
                    Next::Handled
                }),
            )
            .unwrap();

        let mut app = Application::new(test_settings());
        app.mount_app("/admin", admin).unwrap();
        assert!(mounted.load(Ordering::SeqCst));

        assert_eq!(run(&app, "/admin/users").await.text(), "/admin|/users");
        assert_eq!(run(&app, "/admin/other").await.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_child_error_reaches_parent_error_handler() {
        let mut child = Application::new(test_settings());
        child.middleware(from_sync_fn(|_req, _res| panic!("child failed")));

        let mut app = Application::new(test_settings());
        app.mount_app("/child", child).unwrap();
        app.middleware(error_sync_fn(|err, _req, res| {
            res.send(format!("parent caught: {err}"));
            Next::Handled
        }));
        assert_eq!(run(&app, "/child/x").await.text(), "parent caught: child failed");
    }

    #[test]
    fn test_nested_paths() {
        let mut blog = Application::new(test_settings());
        blog.on_mount(|parent| assert_eq!(parent.path(), ""));
        assert_eq!(blog.path(), "");
        assert_eq!(blog.mount_path(), "/");

        let mut admin = Application::new(test_settings());
        let admin_mount = Arc::clone(&admin.mount);
        admin.mount_app("/blog", blog).unwrap();

        let mut app = Application::new(test_settings());
        app.mount_app("/admin", admin).unwrap();

        assert_eq!(admin_mount.full_path(), "/admin");
        assert_eq!(app.path(), "");
    }

    #[test]
    fn test_child_path_follows_later_parent_mount() {
        let paths = Arc::new(RwLock::new(Vec::new()));

        let blog = Application::new(test_settings());
        let blog_mount = Arc::clone(&blog.mount);

        let mut admin = Application::new(test_settings());
        admin.mount_app("/blog", blog).unwrap();
        assert_eq!(blog_mount.full_path(), "/blog");

        let seen = Arc::clone(&paths);
        admin.on_mount(move |parent| seen.write().unwrap().push(parent.path()));

        let mut root = Application::new(test_settings());
        root.mount_app("/admin", admin).unwrap();

        assert_eq!(blog_mount.full_path(), "/admin/blog");
        assert_eq!(*paths.read().unwrap(), vec![String::new()]);
    }
}
