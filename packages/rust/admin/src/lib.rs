//! Web admin for Tool document types.
//!
//! Document types are registered per namespace with [`register`]; the
//! [`AdminBundle`] serves lists and JSON edit forms for them under `/admin`.

mod bundle;
mod registry;
mod views;

pub use bundle::{AdminBundle, AdminConfig, BUNDLE_NAME};
pub use registry::{AdminOptions, AdminRegistry, DEFAULT_NAMESPACE, ModelAdmin, register};
pub use views::{PER_PAGE, routes};
