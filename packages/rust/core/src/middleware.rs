//! Middleware around the router.
//!
//! The stack is a list folded around the router: the first middleware
//! wrapped in sees the request first and the response last.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::Application;
use crate::http::{Request, Response};

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Label shown by the `stack` command.
    fn name(&self) -> &str;

    /// Handle `request`, usually by passing it on with `next.run(request)`.
    async fn handle(&self, request: Request, next: Next<'_>) -> Response;
}

/// The rest of the stack below the current middleware.
pub struct Next<'a> {
    app: &'a Arc<Application>,
    stack: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(app: &'a Arc<Application>, stack: &'a [Arc<dyn Middleware>]) -> Self {
        Self { app, stack }
    }

    pub fn app(&self) -> &Arc<Application> {
        self.app
    }

    /// Pass the request to the next middleware, or to the router.
    pub async fn run(self, request: Request) -> Response {
        match self.stack.split_first() {
            Some((first, rest)) => first.handle(request, Next::new(self.app, rest)).await,
            None => self.app.route(request).await,
        }
    }
}
