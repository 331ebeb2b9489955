//! The `templating` bundle.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};
use tool_core::{
    ApplicationManager, Bundle, RequestContext, RequestReady, Signal, async_trait,
};
use tool_shared::{Result, parse_bundle_settings};
use tracing::info;

use crate::environment::Templating;
use crate::render::RequestInfo;

pub const BUNDLE_NAME: &str = "templating";

/// Directory searched for project templates by default.
pub const DEFAULT_PATH: &str = "templates";

/// Fired once the environment exists, before it is installed in the
/// context. Receivers may register templates or globals.
pub struct TemplatingReady;

impl Signal for TemplatingReady {
    type Payload = Templating;
    const NAME: &'static str = "templating_ready";
}

/// Bundle settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemplatingConfig {
    /// Project template directories, searched in order.
    pub searchpaths: Vec<PathBuf>,
    /// Values visible in every template.
    pub globals: Map<String, Value>,
}

impl Default for TemplatingConfig {
    fn default() -> Self {
        Self {
            searchpaths: vec![PathBuf::from(DEFAULT_PATH)],
            globals: Map::new(),
        }
    }
}

/// Sets up the template environment.
///
/// ```yaml
/// bundles:
///   templating:
///     searchpaths: [templates]
///     globals:
///       site_name: My notes
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplatingBundle;

#[async_trait]
impl Bundle for TemplatingBundle {
    fn name(&self) -> &str {
        BUNDLE_NAME
    }

    async fn setup(&self, app: &mut ApplicationManager, settings: &Value) -> Result<()> {
        let config: TemplatingConfig = parse_bundle_settings(BUNDLE_NAME, settings)?;
        let mut templating = Templating::new(config.searchpaths.clone());
        for (name, value) in &config.globals {
            templating.add_global(name, minijinja::Value::from_serialize(value));
        }
        app.dispatcher().send::<TemplatingReady>(&mut templating)?;

        app.dispatcher().connect::<RequestReady, _>(|cx: &mut RequestContext| {
            let info = RequestInfo::from_context(cx);
            cx.request_mut().extensions_mut().insert(info);
            Ok(())
        });

        info!(searchpaths = ?config.searchpaths, "templating bundle set up");
        app.context_mut().insert(templating);
        Ok(())
    }
}

/// The environment installed by [`TemplatingBundle`], for bundles that
/// register their templates during setup.
pub fn templating_mut(app: &mut ApplicationManager) -> Result<&mut Templating> {
    app.context_mut().require_mut::<Templating>(BUNDLE_NAME)
}
