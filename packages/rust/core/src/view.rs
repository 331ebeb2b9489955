//! The view abstraction: anything that turns a routed request into a response.

use std::future::Future;

use async_trait::async_trait;
use tool_shared::Result;

use crate::context::RequestContext;
use crate::http::Response;

/// A request handler bound to an endpoint.
///
/// Plain async functions `async fn(RequestContext) -> Result<Response>`
/// implement this trait, so most views never name it. Wrappers such as
/// `as_html` or `requires_auth` implement it directly.
#[async_trait]
pub trait View: Send + Sync + 'static {
    async fn call(&self, cx: RequestContext) -> Result<Response>;
}

#[async_trait]
impl<F, Fut> View for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    async fn call(&self, cx: RequestContext) -> Result<Response> {
        (self)(cx).await
    }
}
