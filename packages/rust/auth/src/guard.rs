//! Protecting views and reading the current user.

use async_trait::async_trait;
use tool_core::types::{HeaderValue, StatusCode, header};
use tool_core::{RequestContext, Response, View};
use tool_documents::{Stored, default_storage};
use tool_shared::Result;
use tracing::debug;

use crate::user::{User, verify_credentials};

/// The authenticated user, attached to the request by the middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user: Stored<User>,
}

/// The user the current request is authenticated as.
pub fn get_user(cx: &RequestContext) -> Option<&Stored<User>> {
    cx.request()
        .extensions()
        .get::<Identity>()
        .map(|identity| &identity.user)
}

/// `401` response asking the client for basic credentials.
pub fn authenticate() -> Response {
    Response::new(
        StatusCode::UNAUTHORIZED,
        "Could not verify your access level for that URL.\n\
         You have to login with proper credentials",
    )
    .with_header(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"Login Required\""),
    )
}

/// A view only available to authenticated users.
pub struct RequiresAuth<V> {
    view: V,
}

/// Wrap `view` so that anonymous requests get [`authenticate`] instead.
pub fn requires_auth<V: View>(view: V) -> RequiresAuth<V> {
    RequiresAuth { view }
}

#[async_trait]
impl<V: View> View for RequiresAuth<V> {
    async fn call(&self, mut cx: RequestContext) -> Result<Response> {
        if get_user(&cx).is_none() {
            // without the middleware, fall back to the Authorization header
            let Some(credentials) = cx.request().authorization() else {
                return Ok(authenticate());
            };
            let user = {
                let store = default_storage(cx.app().context())?;
                verify_credentials(store, &credentials.username, &credentials.password).await?
            };
            match user {
                Some(user) => {
                    cx.request_mut().extensions_mut().insert(Identity { user });
                }
                None => {
                    debug!(username = %credentials.username, "invalid credentials");
                    return Ok(authenticate());
                }
            }
        }
        self.view.call(cx).await
    }
}
