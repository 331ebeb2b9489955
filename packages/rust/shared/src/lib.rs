//! Shared types, error model, and configuration for Tool.
//!
//! This crate is the foundation depended on by all other Tool crates.
//! It provides:
//! - [`ToolError`]: the unified error type
//! - [`Settings`]: the configuration mapping and file loading
//! - [`DocumentId`]: primary keys for stored documents

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, Format, ServerConfig, Settings, load as load_config, parse_bundle_settings,
};
pub use error::{Result, ToolError};
pub use types::DocumentId;
