//! Error types for Tool.
//!
//! Library crates use [`ToolError`] via `thiserror`.
//! App crates (cli/blog) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all framework operations.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A bundle failed to set up, or a required bundle is missing.
    #[error("bundle {name}: {message}")]
    Bundle { name: String, message: String },

    /// The configuration names a bundle that is not in the registry.
    #[error("unknown bundle: {0}")]
    UnknownBundle(String),

    /// Invalid URL rule or route registration.
    #[error("routing error: {message}")]
    Routing { message: String },

    /// No URL rule could be built for the endpoint and arguments.
    #[error("could not build url for endpoint {endpoint:?}: {message}")]
    Build { endpoint: String, message: String },

    /// Abort request handling with an HTTP status (e.g. 404).
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (missing field, invalid length, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Template lookup or rendering error.
    #[error("template error: {0}")]
    Template(String),

    /// Command-line parsing or command execution error.
    #[error("{0}")]
    Command(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ToolError>;

impl ToolError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a bundle error for the named bundle.
    pub fn bundle(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Bundle {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a routing error from any displayable message.
    pub fn routing(msg: impl Into<String>) -> Self {
        Self::Routing {
            message: msg.into(),
        }
    }

    /// Create a URL build error for the given endpoint.
    pub fn build(endpoint: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Build {
            endpoint: endpoint.into(),
            message: msg.into(),
        }
    }

    /// Abort with an arbitrary HTTP status.
    pub fn http(status: u16, msg: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: msg.into(),
        }
    }

    /// Abort with `404 Not Found`.
    pub fn not_found() -> Self {
        Self::http(404, "Not Found")
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The HTTP status this error maps to when it escapes a view.
    pub fn status(&self) -> u16 {
        match self {
            Self::Http { status, .. } => *status,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ToolError::config("no such file");
        assert_eq!(err.to_string(), "config error: no such file");

        let err = ToolError::bundle("documents", "must be set up");
        assert_eq!(err.to_string(), "bundle documents: must be set up");

        let err = ToolError::UnknownBundle("ponies".into());
        assert!(err.to_string().contains("ponies"));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ToolError::not_found().status(), 404);
        assert_eq!(ToolError::http(403, "Forbidden").status(), 403);
        assert_eq!(ToolError::Storage("boom".into()).status(), 500);
    }
}
