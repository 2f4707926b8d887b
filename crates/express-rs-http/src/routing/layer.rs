//! A single slot in a router or route stack.

use std::collections::HashMap;

use http::Method;

use express_rs_core::{ExpressError, ExpressResult};

use super::handler::{guard, Middleware, Next};
use super::pattern::{CompiledPattern, PathKey};
use super::route::Route;
use crate::{uri, Request, Response};

/// The result of matching a layer against a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerMatch {
    /// The prefix of the path the layer's pattern consumed.
    pub path: String,
    /// Decoded captured parameters.
    pub params: HashMap<String, String>,
}

/// A compiled pattern plus what runs when it matches.
///
/// A layer holds either a middleware (request or error handler), or a
/// [`Route`] when it was created by `Router::route`. Layers inside a route carry
/// an optional method filter.
#[derive(Debug)]
pub struct Layer {
    pattern: CompiledPattern,
    handler: Option<Middleware>,
    method: Option<Method>,
    pub(crate) route: Option<Route>,
}

impl Layer {
    /// Creates a layer running `handler` when `pattern` matches.
    pub fn new(pattern: CompiledPattern, handler: Middleware) -> Self {
        Self {
            pattern,
            handler: Some(handler),
            method: None,
            route: None,
        }
    }

    /// Creates a route-stack layer, optionally restricted to one method.
    pub fn for_method(method: Option<Method>, handler: Middleware) -> Self {
        Self {
            pattern: CompiledPattern::fast_slash(false),
            handler: Some(handler),
            method,
            route: None,
        }
    }

    /// Creates the layer slot for a route. `Router::route` attaches the
    /// [`Route`] once the layer is on the stack.
    pub(crate) fn route_slot(pattern: CompiledPattern) -> Self {
        Self {
            pattern,
            handler: None,
            method: None,
            route: None,
        }
    }

    /// Returns the compiled pattern.
    pub const fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Returns the pattern's keys.
    pub fn keys(&self) -> &[PathKey] {
        self.pattern.keys()
    }

    /// Returns the method filter of a route-stack layer.
    pub const fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Returns the wrapped route, if this is a route layer.
    pub const fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Returns the wrapped route mutably.
    pub fn route_mut(&mut self) -> Option<&mut Route> {
        self.route.as_mut()
    }

    /// Returns `true` if this layer runs only while an error is pending.
    pub fn is_error_handler(&self) -> bool {
        self.handler.as_ref().is_some_and(Middleware::is_error_handler)
    }

    /// Matches the layer against a path.
    ///
    /// Captured values are percent-decoded. When a name is captured more than
    /// once, the first non-empty value is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ExpressError::ParamDecode`] if a captured value has a
    /// malformed percent-escape.
    pub fn match_path(&self, path: &str) -> ExpressResult<Option<LayerMatch>> {
        let Some(found) = self.pattern.matches(path) else {
            return Ok(None);
        };

        let mut params = HashMap::new();
        for (key, capture) in self.pattern.keys().iter().zip(found.captures) {
            let Some(raw) = capture else { continue };
            if params
                .get(&key.name)
                .is_some_and(|existing: &String| !existing.is_empty())
            {
                continue;
            }
            let value = uri::decode_param(raw).ok_or_else(|| ExpressError::ParamDecode {
                param: key.name.clone(),
                value: raw.to_string(),
            })?;
            params.insert(key.name.clone(), value);
        }

        Ok(Some(LayerMatch {
            path: found.matched.to_string(),
            params,
        }))
    }

    /// Runs the request handler. Error handlers and handler-less layers pass through.
    pub async fn handle_request(&self, req: &mut Request, res: &mut Response) -> Next {
        match &self.handler {
            Some(Middleware::Request(handler)) => guard(|| handler.call(req, res)).await,
            _ => Next::Continue,
        }
    }

    /// Runs the error handler. Other layers forward `err` unchanged.
    pub async fn handle_error(
        &self,
        err: ExpressError,
        req: &mut Request,
        res: &mut Response,
    ) -> Next {
        match &self.handler {
            Some(Middleware::Error(handler)) => guard(|| handler.call(err, req, res)).await,
            _ => Next::Error(err),
        }
    }
}
