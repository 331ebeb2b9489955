//! Template rendering for Tool applications.
//!
//! The [`TemplatingBundle`] creates a MiniJinja environment whose loader
//! looks in the project's search paths before the templates registered by
//! bundles. Views render through [`render_template`], [`render_response`] or
//! the [`as_html`] wrapper.

mod bundle;
mod environment;
mod render;

pub use bundle::{
    BUNDLE_NAME, DEFAULT_PATH, TemplatingBundle, TemplatingConfig, TemplatingReady,
    templating_mut,
};
pub use environment::Templating;
pub use render::{AsHtml, Page, RequestInfo, as_html, render_response, render_template};
