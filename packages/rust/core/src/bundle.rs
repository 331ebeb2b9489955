//! Bundles: pluggable units that set up features on the application manager.
//!
//! A bundle is looked up by name in an explicit [`BundleRegistry`] when the
//! configuration lists it under `bundles:`. During `setup` it may add URLs,
//! wrap the middleware stack, register commands, install state in the
//! context and connect signal receivers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tool_shared::Result;

use crate::manager::ApplicationManager;

#[async_trait]
pub trait Bundle: Send + Sync + 'static {
    /// Name used in the `bundles:` section of the configuration.
    fn name(&self) -> &str;

    /// Bundles that must be set up before this one.
    fn requires(&self) -> &[&'static str] {
        &[]
    }

    /// Install the bundle. `settings` is the bundle's configuration value
    /// (`null` when configured without settings or pulled in as a
    /// requirement).
    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()>;
}

/// Explicit name → bundle table.
#[derive(Clone, Default)]
pub struct BundleRegistry {
    bundles: Vec<Arc<dyn Bundle>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle, replacing any earlier one with the same name.
    pub fn register(mut self, bundle: impl Bundle) -> Self {
        self.insert(bundle);
        self
    }

    pub fn insert(&mut self, bundle: impl Bundle) {
        self.bundles.retain(|b| b.name() != bundle.name());
        self.bundles.push(Arc::new(bundle));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Bundle>> {
        self.bundles.iter().find(|b| b.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.bundles.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

impl fmt::Debug for BundleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
