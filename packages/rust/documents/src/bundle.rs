//! The `documents` bundle.

use serde::Deserialize;
use serde_json::Value;
use tool_core::{ApplicationManager, Bundle, Context, async_trait};
use tool_shared::{Result, ToolError, parse_bundle_settings};
use tracing::info;

use crate::document::{Document, Stored};
use crate::query::Query;
use crate::store::DocumentStore;

pub const BUNDLE_NAME: &str = "documents";

/// Bundle settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Database file, or `:memory:`.
    pub path: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}

fn default_path() -> String {
    "documents.db".to_string()
}

/// Opens the document store and installs it in the application context.
///
/// ```yaml
/// bundles:
///   documents:
///     path: blog.db
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentsBundle;

#[async_trait]
impl Bundle for DocumentsBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()> {
        let config: DocumentsConfig = parse_bundle_settings(BUNDLE_NAME, settings)?;
        let store = DocumentStore::open(&config.path).await?;
        info!(path = %config.path, "documents bundle set up");
        app.context_mut().insert(store);
        Ok(())
    }
}

/// The store installed by [`DocumentsBundle`].
pub fn default_storage(context: &Context) -> Result<&DocumentStore> {
    context.require::<DocumentStore>(BUNDLE_NAME)
}

/// The single document matching `query`: HTTP 404 if there is none, an
/// error if there are several.
pub async fn get_object_or_404<D: Document>(query: Query<'_, D>) -> Result<Stored<D>> {
    let mut found = query.limit(2).all().await?.into_iter();
    match (found.next(), found.next()) {
        (None, _) => Err(ToolError::not_found()),
        (Some(doc), None) => Ok(doc),
        (Some(_), Some(_)) => Err(ToolError::Storage("multiple objects returned".into())),
    }
}
