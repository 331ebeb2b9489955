//! The application manager: loads bundles and assembles the application.
//!
//! Loading happens in two phases. First the configured bundle list is
//! resolved against the registry, pulling in each bundle's requirements
//! ahead of it. Then every bundle's `setup` runs in that order, and
//! [`AppManagerReady`] is sent once all of them are done.
//! [`ApplicationManager::compile`] freezes the result into an
//! [`Application`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tool_shared::{Result, Settings, ToolError, parse_bundle_settings};
use tracing::{debug, info, instrument};

use crate::application::Application;
use crate::bundle::{Bundle, BundleRegistry};
use crate::commands::{Command, CommandRegistry};
use crate::context::Context;
use crate::middleware::Middleware;
use crate::routing::{Route, Routes, UrlMap};
use crate::signals::{AppManagerReady, Dispatcher};

/// Mutable builder for an [`Application`].
pub struct ApplicationManager {
    settings: Settings,
    registry: BundleRegistry,
    context: Context,
    urls: UrlMap,
    middleware: Vec<Arc<dyn Middleware>>,
    commands: CommandRegistry,
    dispatcher: Dispatcher,
    loaded: Vec<String>,
}

impl ApplicationManager {
    /// A manager with the built-in commands and nothing else set up.
    pub fn new(settings: Settings, registry: BundleRegistry) -> Self {
        Self {
            settings,
            registry,
            context: Context::new(),
            urls: UrlMap::new(),
            middleware: Vec::new(),
            commands: CommandRegistry::with_builtins(),
            dispatcher: Dispatcher::new(),
            loaded: Vec::new(),
        }
    }

    /// Create a manager and set up every configured bundle.
    pub async fn load(settings: Settings, registry: BundleRegistry) -> Result<Self> {
        let mut manager = Self::new(settings, registry);
        manager.load_bundles().await?;
        Ok(manager)
    }

    /// Set up the bundles listed in the configuration, requirements first,
    /// then send [`AppManagerReady`].
    #[instrument(skip(self))]
    pub async fn load_bundles(&mut self) -> Result<()> {
        let plan = self.resolve(&self.settings.bundles()?)?;
        for (bundle, settings) in plan {
            self.setup_bundle(bundle, &settings).await?;
        }
        let receivers = self.dispatcher.send::<AppManagerReady>(&mut self.context)?;
        info!(
            bundles = self.loaded.len(),
            receivers, "application manager ready"
        );
        Ok(())
    }

    /// Set up a single bundle from the registry, unless it already is.
    pub async fn load_bundle(&mut self, name: &str, settings: &Value) -> Result<()> {
        let plan = self.resolve(&[(name.to_string(), settings.clone())])?;
        for (bundle, settings) in plan {
            self.setup_bundle(bundle, &settings).await?;
        }
        Ok(())
    }

    async fn setup_bundle(&mut self, bundle: Arc<dyn Bundle>, settings: &Value) -> Result<()> {
        let name = bundle.name().to_string();
        debug!(bundle = %name, "setting up bundle");
        bundle.setup(self, settings).await?;
        self.loaded.push(name.clone());
        info!(bundle = %name, "bundle set up");
        Ok(())
    }

    /// Order `configured` so that every bundle follows its requirements.
    /// Already loaded bundles are skipped; unconfigured requirements get
    /// `null` settings.
    fn resolve(&self, configured: &[(String, Value)]) -> Result<Vec<(Arc<dyn Bundle>, Value)>> {
        let mut plan = Vec::new();
        let mut done: HashSet<String> = self.loaded.iter().cloned().collect();
        for (name, _) in configured {
            let mut path = Vec::new();
            self.visit(name, configured, &mut done, &mut path, &mut plan)?;
        }
        Ok(plan)
    }

    fn visit(
        &self,
        name: &str,
        configured: &[(String, Value)],
        done: &mut HashSet<String>,
        path: &mut Vec<String>,
        plan: &mut Vec<(Arc<dyn Bundle>, Value)>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if path.iter().any(|p| p == name) {
            path.push(name.to_string());
            return Err(ToolError::config(format!(
                "circular bundle requirement: {}",
                path.join(" -> ")
            )));
        }
        let bundle = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::UnknownBundle(name.to_string()))?;

        path.push(name.to_string());
        for requirement in bundle.requires() {
            self.visit(requirement, configured, done, path, plan)?;
        }
        path.pop();

        let settings = configured
            .iter()
            .find(|(configured_name, _)| configured_name == name)
            .map(|(_, settings)| settings.clone())
            .or_else(|| self.settings.bundle(name))
            .unwrap_or(Value::Null);
        done.insert(name.to_string());
        plan.push((bundle, settings));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // API for bundles
    // -----------------------------------------------------------------------

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Typed settings of a configured bundle, defaults otherwise.
    pub fn bundle_settings<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match self.settings.bundle(name) {
            Some(value) => parse_bundle_settings(name, &value),
            None => Ok(T::default()),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn urls(&self) -> &UrlMap {
        &self.urls
    }

    /// Mount `routes` under `prefix`.
    pub fn add_urls(&mut self, prefix: &str, routes: Routes) -> Result<()> {
        debug!(prefix, routes = routes.len(), "adding urls");
        self.urls.mount(prefix, routes)
    }

    /// Register a single route at the root.
    pub fn add_url(&mut self, route: Route) -> Result<()> {
        self.urls.add(route)
    }

    /// Add a middleware below the ones already wrapped in. The first one
    /// wrapped in sees requests first.
    pub fn wrap_in(&mut self, middleware: impl Middleware) {
        debug!(middleware = middleware.name(), "wrapping application");
        self.middleware.push(Arc::new(middleware));
    }

    pub fn add_command(&mut self, command: impl Command) {
        self.commands.register(command);
    }

    pub fn loaded_bundles(&self) -> &[String] {
        &self.loaded
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|b| b == name)
    }

    /// Freeze into an application shared by the server, shell and tests.
    pub fn compile(self) -> Arc<Application> {
        Arc::new(Application {
            settings: self.settings,
            context: self.context,
            urls: self.urls,
            middleware: self.middleware,
            commands: self.commands,
            dispatcher: self.dispatcher,
            bundles: self.loaded,
        })
    }
}
