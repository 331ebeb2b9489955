//! The `auth` bundle.

use serde::Deserialize;
use serde_json::Value;
use tool_core::{ApplicationManager, Bundle, async_trait};
use tool_shared::{Result, ToolError, parse_bundle_settings};
use tracing::info;

use crate::command::AuthCommand;
use crate::middleware::{AuthMiddleware, Preset};

pub const BUNDLE_NAME: &str = "auth";

/// Bundle settings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signs the login ticket; required.
    pub secret: Option<String>,
    pub preset: Preset,
    /// Mark the ticket cookie `Secure`.
    pub secure_cookie: bool,
}

/// Authentication against [`User`](crate::User) documents.
///
/// ```yaml
/// bundles:
///   auth:
///     secret: change me
///     preset: form
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthBundle;

#[async_trait]
impl Bundle for AuthBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    fn requires(&self) -> &[&'static str] {
        &[tool_documents::BUNDLE_NAME]
    }

    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()> {
        let config: AuthConfig = parse_bundle_settings(BUNDLE_NAME, settings)?;
        let Some(secret) = config.secret.filter(|s| !s.is_empty()) else {
            return Err(ToolError::config("bundle auth requires setting \"secret\""));
        };
        app.wrap_in(AuthMiddleware::new(config.preset, &secret).secure_cookie(config.secure_cookie));
        app.add_command(AuthCommand);
        info!(preset = ?config.preset, "auth bundle set up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tool_core::debug::Client;
    use tool_core::types::StatusCode;
    use tool_core::{BundleRegistry, RequestContext, Response, Route};
    use tool_documents::{DocumentsBundle, default_storage};
    use tool_shared::Settings;

    use crate::guard::{get_user, requires_auth};
    use crate::middleware::LOGIN_PATH;
    use crate::user::User;

    async fn secret(cx: RequestContext) -> Result<Response> {
        let name = get_user(&cx).map(|u| u.username.clone()).unwrap_or_default();
        Ok(Response::text(format!("hello {name}")))
    }

    async fn client(auth: Value) -> Client {
        let settings = Settings::from_value(json!({
            "bundles": {
                "documents": {"path": ":memory:"},
                "auth": auth,
            }
        }))
        .expect("settings");
        let registry = BundleRegistry::new()
            .register(DocumentsBundle)
            .register(AuthBundle);
        let mut manager = ApplicationManager::load(settings, registry)
            .await
            .expect("load");
        manager
            .add_url(Route::new("secret", requires_auth(secret)))
            .expect("route");

        let mut user = User::new("john");
        user.set_password("pw");
        default_storage(manager.context())
            .expect("store")
            .save(user)
            .await
            .expect("save user");
        Client::new(manager.compile())
    }

    #[tokio::test]
    async fn secret_is_required() {
        let settings = Settings::from_value(json!({
            "bundles": {"documents": {"path": ":memory:"}, "auth": {"preset": "basic"}}
        }))
        .expect("settings");
        let registry = BundleRegistry::new()
            .register(DocumentsBundle)
            .register(AuthBundle);
        let err = ApplicationManager::load(settings, registry)
            .await
            .err()
            .expect("no secret");
        assert!(err.to_string().contains("requires setting \"secret\""));
    }

    #[tokio::test]
    async fn basic_preset() {
        let mut client = client(json!({"secret": "s3cret"})).await;

        let response = client.get("/secret/").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.header("www-authenticate"),
            Some("Basic realm=\"Login Required\"")
        );
        assert!(response.text_body().starts_with("Could not verify your access level"));

        let response = client
            .request(tool_core::Request::get("/secret/").with_basic_auth("john", "pw"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text_body(), "hello john");

        let response = client
            .request(tool_core::Request::get("/secret/").with_basic_auth("john", "nope"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn form_preset() {
        let mut client = client(json!({"secret": "s3cret", "preset": "form"})).await;

        let response = client.get("/secret/").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.header("www-authenticate").is_none());
        assert!(response.text_body().contains(LOGIN_PATH));

        let response = client
            .post_form(
                LOGIN_PATH,
                &[("login", "john"), ("password", "nope"), ("came_from", "/secret/")],
            )
            .await;
        assert!(response.text_body().contains("Wrong username or password."));
        assert!(client.cookie("auth_tkt").is_none());

        let response = client
            .post_form(
                LOGIN_PATH,
                &[("login", "john"), ("password", "pw"), ("came_from", "/secret/")],
            )
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("/secret/"));
        assert!(client.cookie("auth_tkt").is_some());

        assert_eq!(client.get("/secret/").await.text_body(), "hello john");

        client.get("/__do_logout").await;
        assert!(client.cookie("auth_tkt").is_none());
        assert_eq!(client.get("/secret/").await.status(), StatusCode::UNAUTHORIZED);
    }
}
