//! Document types exposed in the admin, grouped by namespace.

use std::collections::BTreeMap;

use serde_json::Value;
use tool_core::ApplicationManager;
use tool_documents::Document;
use tool_shared::{Result, ToolError};
use tracing::debug;

use crate::bundle::BUNDLE_NAME;

pub const DEFAULT_NAMESPACE: &str = "main";

/// How a document type is presented.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminOptions {
    /// URL segment grouping related models.
    pub namespace: String,
    /// Model name in URLs; the Rust type name when `None`.
    pub name: Option<String>,
    /// Fields shown as list columns; the document label when empty.
    pub list_names: Vec<String>,
    /// Default list ordering.
    pub ordering: Vec<String>,
    pub ordering_reversed: bool,
    /// Fields hidden from the edit form and kept as stored.
    pub exclude: Vec<String>,
}

impl Default for AdminOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: None,
            list_names: Vec::new(),
            ordering: Vec::new(),
            ordering_reversed: false,
            exclude: Vec::new(),
        }
    }
}

/// A registered document type with its typed hooks erased.
#[derive(Debug, Clone)]
pub struct ModelAdmin {
    pub name: String,
    pub collection: &'static str,
    pub options: AdminOptions,
    normalize: fn(Value) -> Result<Value>,
    label: fn(&Value) -> Option<String>,
}

impl ModelAdmin {
    /// Run the document type's defaults and validation over `data`.
    pub fn normalize(&self, data: Value) -> Result<Value> {
        (self.normalize)(data)
    }

    /// The document label, or the collection name if `data` does not fit.
    pub fn label(&self, data: &Value) -> String {
        (self.label)(data).unwrap_or_else(|| self.collection.to_string())
    }
}

fn normalize<D: Document>(data: Value) -> Result<Value> {
    let mut doc: D = serde_json::from_value(data)?;
    doc.prepare();
    doc.validate()?;
    Ok(serde_json::to_value(doc)?)
}

fn label<D: Document>(data: &Value) -> Option<String> {
    serde_json::from_value::<D>(data.clone())
        .ok()
        .map(|doc| doc.label())
}

fn type_name<D>() -> String {
    let full = std::any::type_name::<D>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

/// Namespace → model name → model.
#[derive(Debug, Default)]
pub struct AdminRegistry {
    namespaces: BTreeMap<String, BTreeMap<String, ModelAdmin>>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `D` in the admin; registering a name again replaces it.
    pub fn register<D: Document>(&mut self, options: AdminOptions) -> &ModelAdmin {
        let name = options.name.clone().unwrap_or_else(type_name::<D>);
        debug!(namespace = %options.namespace, model = %name, "registering admin model");
        let model = ModelAdmin {
            name: name.clone(),
            collection: D::COLLECTION,
            options,
            normalize: normalize::<D>,
            label: label::<D>,
        };
        let models = self.namespaces.entry(model.options.namespace.clone()).or_default();
        models.insert(name.clone(), model);
        &models[&name]
    }

    pub fn namespaces(&self) -> &BTreeMap<String, BTreeMap<String, ModelAdmin>> {
        &self.namespaces
    }

    pub fn namespace(&self, namespace: &str) -> Result<&BTreeMap<String, ModelAdmin>> {
        self.namespaces.get(namespace).ok_or_else(|| {
            ToolError::http(404, format!("There is no registered namespace \"{namespace}\""))
        })
    }

    pub fn model(&self, namespace: &str, name: &str) -> Result<&ModelAdmin> {
        self.namespace(namespace)?.get(name).ok_or_else(|| {
            ToolError::http(
                404,
                format!("\"{name}\" is not a registered model in namespace {namespace}."),
            )
        })
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Register `D` with the admin of the application being set up.
pub fn register<D: Document>(app: &mut ApplicationManager, options: AdminOptions) -> Result<()> {
    app.context_mut()
        .require_mut::<AdminRegistry>(BUNDLE_NAME)?
        .register::<D>(options);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tool_documents::validators;

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

    #[test]
    fn registration_and_lookup() {
        let mut registry = AdminRegistry::new();
        assert_eq!(registry.register::<Page>(AdminOptions::default()).name, "Page");
        registry.register::<Page>(AdminOptions {
            namespace: "cms".into(),
            name: Some("StaticPage".into()),
            ..AdminOptions::default()
        });

        assert_eq!(registry.namespaces().len(), 2);
        let model = registry.model("cms", "StaticPage").expect("model");
        assert_eq!(model.collection, "pages");
        assert_eq!(registry.model("cms", "Page").expect_err("missing").status(), 404);
        assert_eq!(registry.namespace("nope").expect_err("missing").status(), 404);
    }

    #[test]
    fn type_erased_hooks() {
        let mut registry = AdminRegistry::new();
        let model = registry.register::<Page>(AdminOptions::default()).clone();

        let data = model.normalize(json!({"title": "About"})).expect("normalize");
        assert_eq!(data, json!({"title": "About", "slug": "about"}));
        assert!(model.normalize(json!({"title": ""})).is_err());
        assert!(model.normalize(json!({"name": 1})).is_err());

        assert_eq!(model.label(&data), "About");
        assert_eq!(model.label(&json!({"other": true})), "pages");
    }
}
