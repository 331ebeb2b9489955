//! The `admin` bundle.

use serde::Deserialize;
use serde_json::Value;
use tool_core::{ApplicationManager, Bundle, async_trait};
use tool_shared::{Result, parse_bundle_settings};
use tool_templating::templating_mut;
use tracing::info;

use crate::registry::AdminRegistry;
use crate::views;

pub const BUNDLE_NAME: &str = "admin";

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("namespace.html", include_str!("../templates/namespace.html")),
    ("object_list.html", include_str!("../templates/object_list.html")),
    ("object_detail.html", include_str!("../templates/object_detail.html")),
];

/// Bundle settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// URL prefix of the admin site.
    pub prefix: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            prefix: "/admin".to_string(),
        }
    }
}

/// Web interface for registered document types.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminBundle;

#[async_trait]
impl Bundle for AdminBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    fn requires(&self) -> &[&'static str] {
        &[tool_documents::BUNDLE_NAME, tool_templating::BUNDLE_NAME]
    }

    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()> {
        let config: AdminConfig = parse_bundle_settings(BUNDLE_NAME, settings)?;
        if !app.context().contains::<AdminRegistry>() {
            app.context_mut().insert(AdminRegistry::new());
        }
        templating_mut(app)?.register_embedded(BUNDLE_NAME, TEMPLATES);
        app.add_urls(&config.prefix, views::routes())?;
        info!(prefix = %config.prefix, "admin bundle set up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;
    use tool_core::BundleRegistry;
    use tool_core::debug::Client;
    use tool_core::types::StatusCode;
    use tool_documents::{Document, DocumentsBundle, validators};
    use tool_shared::Settings;
    use tool_templating::TemplatingBundle;

    use crate::registry::{AdminOptions, register};

    #[derive(Debug, Serialize, Deserialize)]
    struct Page {
        title: String,
        #[serde(default)]
        slug: String,
    }

    impl Document for Page {
        const COLLECTION: &'static str = "pages";

        fn label(&self) -> String {
            self.title.clone()
        }

        fn prepare(&mut self) {
            if self.slug.is_empty() {
                self.slug = self.title.to_lowercase();
            }
        }

        fn validate(&self) -> Result<()> {
            validators::required("title", &self.title)
        }
    }

    async fn client() -> Client {
        let settings = Settings::from_value(json!({
            "bundles": {
                "documents": {"path": ":memory:"},
                "templating": {"searchpaths": []},
                "admin": null,
            }
        }))
        .expect("settings");
        let registry = BundleRegistry::new()
            .register(DocumentsBundle)
            .register(TemplatingBundle)
            .register(AdminBundle);
        let mut manager = ApplicationManager::load(settings, registry)
            .await
            .expect("load");
        register::<Page>(
            &mut manager,
            AdminOptions {
                list_names: vec!["title".into(), "slug".into()],
                ..AdminOptions::default()
            },
        )
        .expect("register");
        Client::new(manager.compile())
    }

    #[tokio::test]
    async fn index_and_namespace() {
        let mut client = client().await;
        let response = client.get("/admin/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.text_body();
        assert!(body.contains("Admin site"));
        assert!(body.contains(">main</a>"));
        assert!(body.contains(">Page</a>"));

        assert_eq!(client.get("/admin/main/").await.status(), StatusCode::OK);
        assert_eq!(client.get("/admin/nope/").await.status(), StatusCode::NOT_FOUND);
        assert_eq!(client.get("/admin/main/Nope/").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_names_are_escaped_in_404s() {
        let mut client = client().await;
        let response = client.get("/admin/%3Cscript%3Ealert(1)%3C%2Fscript%3E/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.text_body().contains("<script>"));

        let response = client.get("/admin/main/%3Cb%3E/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.text_body().contains("&lt;b&gt;"));
    }

    #[tokio::test]
    async fn listing_parameters_are_checked() {
        let mut client = client().await;
        for query in ["page=0", "per_page=0", "page=x", "per_page=-3", "sort_by=no%20such"] {
            let response = client.get(&format!("/admin/main/Page/?{query}")).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{query}");
        }

        let response = client.get("/admin/main/Page/?page=999999999999999999").await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = client
            .get("/admin/main/Page/?sort_by=title&sort_reverse=1&per_page=5")
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_edit_delete() {
        let mut client = client().await;
        assert!(client.get("/admin/main/Page/").await.text_body().contains("0 objects"));

        let response = client
            .post_form("/admin/main/Page/add", &[("data", r#"{"title": "About"}"#)])
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.header("location").expect("location").to_string();
        assert!(location.starts_with("/admin/main/Page/"));

        let body = client.get(&location).await.text_body().to_string();
        assert!(body.contains("Editing Page"));
        assert!(body.contains("about"));

        let list = client.get("/admin/main/Page/").await.text_body().to_string();
        assert!(list.contains("1 objects"));
        assert!(list.contains(">About</a>"));

        let response = client
            .post_form(&location, &[("data", r#"{"title": ""}"#)])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.text_body().contains("this field is required"));

        let response = client.post_form(&location, &[("data", "not json")]).await;
        assert!(response.text_body().contains("data is not valid JSON"));

        let response = client.post_form(&location, &[("DELETE", "1")]).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("/admin/main/Page/"));
        assert!(client.get("/admin/main/Page/").await.text_body().contains("0 objects"));
        assert_eq!(client.get(&location).await.status(), StatusCode::NOT_FOUND);
    }
}
