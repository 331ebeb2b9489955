//! Sample blog built on the Tool framework.
//!
//! Notes are stored in the document database, listed on the web by year and
//! month, managed from the command line (`blog ls`, `blog add`, `blog drop`)
//! and, when the `admin` bundle is loaded, edited in the admin.

pub mod bundle;
pub mod commands;
pub mod note;
pub mod views;

pub use bundle::{BUNDLE_NAME, BlogBundle, BlogConfig, admin_options};
pub use commands::BlogCommand;
pub use note::Note;
pub use views::routes;

use tool_core::BundleRegistry;

/// The framework bundles plus `blog`.
pub fn registry() -> BundleRegistry {
    tool_cli::builtin_registry().register(BlogBundle)
}

#[cfg(test)]
pub(crate) async fn test_app() -> std::sync::Arc<tool_core::Application> {
    use serde_json::json;
    use tool_core::ApplicationManager;
    use tool_shared::Settings;

    let settings = Settings::from_value(json!({
        "bundles": {
            "documents": {"path": ":memory:"},
            "templating": {"searchpaths": []},
            "admin": null,
            "blog": null,
        }
    }))
    .expect("settings");
    ApplicationManager::load(settings, registry())
        .await
        .expect("load")
        .compile()
}
