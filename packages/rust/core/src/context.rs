//! Explicit state passed to bundles and views.
//!
//! [`Context`] holds process-wide state that bundles install during setup
//! (the document store, the template environment, ...), keyed by type.
//! [`RequestContext`] is built for every routed request and carries the
//! request, the matched endpoint and a handle to the compiled application.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tool_shared::{Result, Settings, ToolError};

use crate::application::Application;
use crate::http::{Request, Response};
use crate::routing::{RouteArgs, RouteValue};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Type-keyed store of bundle state.
#[derive(Default)]
pub struct Context {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }

    /// Like [`get`](Self::get), but fails when `bundle` has not installed it.
    pub fn require<T: Any>(&self, bundle: &str) -> Result<&T> {
        self.get().ok_or_else(|| not_set_up(bundle))
    }

    pub fn require_mut<T: Any>(&mut self, bundle: &str) -> Result<&mut T> {
        self.get_mut().ok_or_else(|| not_set_up(bundle))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn not_set_up(bundle: &str) -> ToolError {
    ToolError::bundle(bundle, "must be set up")
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("entries", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Everything a view needs to answer one request.
pub struct RequestContext {
    request: Request,
    endpoint: String,
    args: RouteArgs,
    app: Arc<Application>,
}

impl RequestContext {
    pub fn new(request: Request, endpoint: String, args: RouteArgs, app: Arc<Application>) -> Self {
        Self {
            request,
            endpoint,
            args,
            app,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    /// Endpoint name of the matched rule, e.g. `blog.note`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Arguments captured from the URL.
    pub fn args(&self) -> &RouteArgs {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&RouteValue> {
        self.args.get(name)
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn settings(&self) -> &Settings {
        self.app.settings()
    }

    /// Bundle state installed in the application context.
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.app.context().get()
    }

    pub fn require<T: Any>(&self, bundle: &str) -> Result<&T> {
        self.app.context().require(bundle)
    }

    /// Build a URL for `endpoint`. A leading dot makes the name relative to
    /// the current namespace (`.note` inside `blog.notes` means `blog.note`).
    pub fn url_for(&self, endpoint: &str, args: &RouteArgs) -> Result<String> {
        self.app.url_for(&self.resolve_endpoint(endpoint), args)
    }

    /// `302` redirect to the URL of `endpoint`.
    pub fn redirect_to(&self, endpoint: &str, args: &RouteArgs) -> Result<Response> {
        Ok(Response::redirect(&self.url_for(endpoint, args)?))
    }

    fn resolve_endpoint(&self, endpoint: &str) -> String {
        resolve_endpoint(&self.endpoint, endpoint)
    }
}

/// Resolve a possibly relative endpoint name against `current`.
pub fn resolve_endpoint(current: &str, endpoint: &str) -> String {
    match endpoint.strip_prefix('.') {
        Some(local) => match current.rsplit_once('.') {
            Some((namespace, _)) => format!("{namespace}.{local}"),
            None => local.to_string(),
        },
        None => endpoint.to_string(),
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("endpoint", &self.endpoint)
            .field("args", &self.args)
            .finish()
    }
}
