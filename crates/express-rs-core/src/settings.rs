//! Settings system for the express-rs framework.
//!
//! [`Settings`] holds framework configuration with sensible defaults, and
//! [`RouterOptions`] carries the per-router flags derived from it.

use serde::{Deserialize, Serialize};

/// Options that control how a router compiles and matches its patterns.
///
/// # Examples
///
/// ```
/// use express_rs_core::settings::RouterOptions;
///
/// let opts = RouterOptions::default();
/// assert!(!opts.case_sensitive);
/// assert!(!opts.strict);
/// assert!(!opts.merge_params);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Whether `/Foo` and `/foo` are treated as different paths.
    pub case_sensitive: bool,
    /// Whether a trailing slash is significant for route paths.
    pub strict: bool,
    /// Whether a mounted router sees its parent's captured parameters.
    pub merge_params: bool,
}

impl RouterOptions {
    /// Returns options with `case_sensitive` set.
    #[must_use]
    pub const fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    /// Returns options with `strict` set.
    #[must_use]
    pub const fn strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    /// Returns options with `merge_params` set.
    #[must_use]
    pub const fn merge_params(mut self, value: bool) -> Self {
        self.merge_params = value;
        self
    }
}

/// The complete set of framework settings.
///
/// # Examples
///
/// ```
/// use express_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.env, "development");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled.
    pub debug: bool,
    /// The environment name (`development`, `production`, `test`).
    pub env: String,
    /// The address the HTTP server binds to.
    pub bind_address: String,

    // ── Routing ──────────────────────────────────────────────────────

    /// Whether route matching is case sensitive.
    pub case_sensitive_routing: bool,
    /// Whether route matching treats a trailing slash as significant.
    pub strict_routing: bool,

    // ── Responses ────────────────────────────────────────────────────

    /// Whether the `X-Powered-By` header is added to every response.
    pub x_powered_by: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The tracing filter directive (e.g. "info", "`express_rs_http=debug`").
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            env: "development".to_string(),
            bind_address: "127.0.0.1:3000".to_string(),
            case_sensitive_routing: false,
            strict_routing: false,
            x_powered_by: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Returns `true` when running in the production environment.
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Returns the router options implied by these settings.
    pub const fn router_options(&self) -> RouterOptions {
        RouterOptions {
            case_sensitive: self.case_sensitive_routing,
            strict: self.strict_routing,
            merge_params: false,
        }
    }
}
