//! Core of the Tool framework.
//!
//! An [`ApplicationManager`] reads the configuration, sets up the configured
//! [`Bundle`]s (which add URL routes, middleware, commands and shared state)
//! and compiles everything into an [`Application`]. The application answers
//! HTTP requests through its middleware stack and router, and runs
//! management commands such as `serve` and `shell`.

pub mod application;
pub mod bundle;
pub mod commands;
pub mod context;
pub mod debug;
pub mod http;
pub mod manager;
pub mod middleware;
pub mod pagination;
pub mod routing;
pub mod server;
pub mod shell;
pub mod signals;
pub mod strings;
pub mod view;

// Re-export public API at crate root for ergonomic imports.
pub use application::Application;
pub use bundle::{Bundle, BundleRegistry};
pub use commands::{Command, CommandRegistry};
pub use context::{Context, RequestContext};
pub use self::http::{BasicAuth, Request, Response};
pub use manager::ApplicationManager;
pub use middleware::{Middleware, Next};
pub use pagination::{PageLinks, Pagination};
pub use routing::{MatchError, Route, RouteArgs, RouteMatch, RouteValue, Routes, Rule, UrlMap};
pub use signals::{AppManagerReady, Dispatcher, ReceiverId, RequestReady, Signal};
pub use strings::{escape_html, slugify, slugify_i18n};
pub use view::View;

// Crates that appear in the public API.
pub use async_trait::async_trait;
pub use clap;
pub use tool_shared::{Result, Settings, ToolError};

/// HTTP primitives used by [`Request`] and [`Response`].
pub mod types {
    pub use ::http::header::{self, HeaderMap, HeaderName, HeaderValue};
    pub use ::http::{Method, StatusCode};
}
