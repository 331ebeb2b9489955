//! Document storage for Tool applications.
//!
//! Documents are serde-mapped structs stored as JSON in an embedded libSQL
//! database. The [`DocumentsBundle`] opens the database and installs the
//! [`DocumentStore`] in the application context; views and commands fetch it
//! with [`default_storage`].

mod bundle;
mod document;
mod migrations;
mod query;
mod store;

pub use bundle::{
    BUNDLE_NAME, DocumentsBundle, DocumentsConfig, default_storage, get_object_or_404,
};
pub use document::{Document, Stored, validators};
pub use query::{Lookup, Query, RawQuery};
pub use store::{DocumentStore, MEMORY};
