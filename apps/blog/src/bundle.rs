//! The `blog` bundle.

use serde::Deserialize;
use serde_json::Value;
use tool_admin::{AdminOptions, AdminRegistry};
use tool_core::{AppManagerReady, ApplicationManager, Bundle, Context, async_trait};
use tool_shared::{Result, parse_bundle_settings};
use tool_templating::templating_mut;
use tracing::{debug, info};

use crate::commands::BlogCommand;
use crate::note::Note;
use crate::views::routes;

pub const BUNDLE_NAME: &str = "blog";

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/blog/base.html")),
    ("notes.html", include_str!("../templates/blog/notes.html")),
    ("note.html", include_str!("../templates/blog/note.html")),
];

/// Bundle settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Where the note listings are mounted.
    pub prefix: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            prefix: "/".to_string(),
        }
    }
}

/// How notes appear in the admin, when the `admin` bundle is loaded.
pub fn admin_options() -> AdminOptions {
    AdminOptions {
        namespace: BUNDLE_NAME.to_string(),
        name: Some("Note".to_string()),
        list_names: vec!["date".to_string(), "text".to_string()],
        ordering: vec!["date".to_string()],
        ordering_reversed: true,
        ..AdminOptions::default()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlogBundle;

#[async_trait]
impl Bundle for BlogBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    fn requires(&self) -> &[&'static str] {
        &[tool_documents::BUNDLE_NAME, tool_templating::BUNDLE_NAME]
    }

    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()> {
        let config: BlogConfig = parse_bundle_settings(BUNDLE_NAME, settings)?;
        templating_mut(app)?.register_embedded(BUNDLE_NAME, TEMPLATES);
        app.add_urls(&config.prefix, routes())?;
        app.add_command(BlogCommand);

        // the admin may be set up after this bundle
        app.dispatcher()
            .connect::<AppManagerReady, _>(|context: &mut Context| {
                if let Some(registry) = context.get_mut::<AdminRegistry>() {
                    registry.register::<Note>(admin_options());
                    debug!("notes registered with the admin");
                }
                Ok(())
            });

        info!(prefix = %config.prefix, "blog bundle set up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_core::debug::Client;

    use crate::test_app;

    #[test]
    fn default_settings() {
        let config: BlogConfig = parse_bundle_settings(BUNDLE_NAME, &Value::Null).expect("defaults");
        assert_eq!(config.prefix, "/");
    }

    #[tokio::test]
    async fn notes_appear_in_the_admin() {
        let app = test_app().await;
        app.dispatch(["blog", "add", "administered"]).await.expect("add");

        let mut client = Client::new(app);
        let namespace = client.get("/admin/blog/").await;
        assert_eq!(namespace.status().as_u16(), 200);
        assert!(namespace.text_body().contains("Note"));

        let list = client.get("/admin/blog/Note/").await;
        assert_eq!(list.status().as_u16(), 200);
        let body = list.text_body();
        assert!(body.contains("1 objects"));
        assert!(body.contains("administered"));
    }
}
