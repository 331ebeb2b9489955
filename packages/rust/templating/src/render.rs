//! Rendering templates from views.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use minijinja::value::Kwargs;
use serde::Serialize;
use serde_json::Value;
use tool_core::context::resolve_endpoint;
use tool_core::{Application, RequestContext, Response, RouteArgs, RouteValue, View};
use tool_shared::{Result, ToolError};

use crate::bundle::BUNDLE_NAME;
use crate::environment::Templating;

/// Request data exposed to templates as `request`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub full_path: String,
    pub endpoint: String,
    pub args: BTreeMap<String, String>,
}

impl RequestInfo {
    pub fn from_context(cx: &RequestContext) -> Self {
        let request = cx.request();
        Self {
            method: request.method().to_string(),
            path: request.path().to_string(),
            full_path: request.full_path(),
            endpoint: cx.endpoint().to_string(),
            args: request.args().into_iter().collect(),
        }
    }
}

/// What a view needs to keep to render after the request context is gone.
struct RenderScope {
    app: Arc<Application>,
    request: RequestInfo,
}

impl RenderScope {
    fn new(cx: &RequestContext) -> Self {
        let request = cx
            .request()
            .extensions()
            .get::<RequestInfo>()
            .cloned()
            .unwrap_or_else(|| RequestInfo::from_context(cx));
        Self {
            app: Arc::clone(cx.app()),
            request,
        }
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let templating = self.app.context().require::<Templating>(BUNDLE_NAME)?;

        let mut values: BTreeMap<String, minijinja::Value> = BTreeMap::new();
        values.insert("request".into(), minijinja::Value::from_serialize(&self.request));
        values.insert("url_for".into(), url_for_function(&self.app, &self.request.endpoint));
        match serde_json::to_value(ctx)? {
            Value::Object(map) => {
                for (key, value) in map {
                    values.insert(key, minijinja::Value::from_serialize(&value));
                }
            }
            Value::Null => {}
            other => {
                return Err(ToolError::Template(format!(
                    "template context must be a mapping, got {other}"
                )));
            }
        }
        templating.render(name, minijinja::Value::from_iter(values))
    }
}

/// `url_for(endpoint, **args)` bound to the current request's namespace.
fn url_for_function(app: &Arc<Application>, current: &str) -> minijinja::Value {
    let app = Arc::clone(app);
    let current = current.to_string();
    minijinja::Value::from_function(
        move |endpoint: String,
              kwargs: Kwargs|
              -> std::result::Result<minijinja::Value, minijinja::Error> {
            let mut args = RouteArgs::new();
            for name in kwargs.args() {
                let value: minijinja::Value = kwargs.get(name)?;
                args.insert(name, route_value(value));
            }
            // built URLs are percent-encoded, so they need no HTML escaping
            app.url_for(&resolve_endpoint(&current, &endpoint), &args)
                .map(minijinja::Value::from_safe_string)
                .map_err(|e| {
                    minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string())
                })
        },
    )
}

fn route_value(value: minijinja::Value) -> RouteValue {
    if let Some(i) = value.as_i64() {
        return RouteValue::Int(i);
    }
    if let Some(s) = value.as_str() {
        return RouteValue::from(s);
    }
    match f64::try_from(value.clone()) {
        Ok(f) => RouteValue::Float(f),
        Err(_) => RouteValue::from(value.to_string()),
    }
}

/// Render `name` for the current request. Templates see `request`,
/// `url_for` and the configured globals besides the keys of `ctx`.
pub fn render_template<S: Serialize>(cx: &RequestContext, name: &str, ctx: S) -> Result<String> {
    RenderScope::new(cx).render(name, ctx)
}

/// [`render_template`] wrapped in an HTML response.
pub fn render_response<S: Serialize>(cx: &RequestContext, name: &str, ctx: S) -> Result<Response> {
    Ok(Response::html(render_template(cx, name, ctx)?))
}

/// Result of a view wrapped with [`as_html`].
#[derive(Debug)]
pub enum Page {
    /// Render the view's template with this context.
    Context(Value),
    /// Send this response as is.
    Response(Response),
}

impl Page {
    pub fn context<S: Serialize>(ctx: S) -> Result<Self> {
        Ok(Self::Context(serde_json::to_value(ctx)?))
    }
}

impl From<Response> for Page {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// A view whose context is rendered with a fixed template.
pub struct AsHtml<F> {
    template: String,
    view: F,
}

/// Wrap `view` so that a returned [`Page::Context`] is rendered with
/// `template`, and a [`Page::Response`] is passed through.
pub fn as_html<F, Fut>(template: &str, view: F) -> AsHtml<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page>> + Send + 'static,
{
    AsHtml {
        template: template.to_string(),
        view,
    }
}

#[async_trait]
impl<F, Fut> View for AsHtml<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page>> + Send + 'static,
{
    async fn call(&self, cx: RequestContext) -> Result<Response> {
        let scope = RenderScope::new(&cx);
        match (self.view)(cx).await? {
            Page::Context(ctx) => Ok(Response::html(scope.render(&self.template, ctx)?)),
            Page::Response(response) => Ok(response),
        }
    }
}
