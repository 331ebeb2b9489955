//! Development HTTP server.
//!
//! axum only provides the socket handling here: every request goes to a
//! single fallback handler that converts it into the framework's
//! [`Request`] and runs it through [`Application::handle`].

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use http::StatusCode;
use tokio::net::TcpListener;
use tool_shared::{Result, ToolError};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::Application;
use crate::http::{Request, Response};

/// Largest request body the server buffers.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Bind `host:port` and serve `app` until Ctrl-C.
pub async fn serve(app: Arc<Application>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ToolError::Command(format!("could not bind {addr}: {e}")))?;
    info!(%addr, "serving on http://{addr}/");
    serve_on(listener, app, shutdown_signal()).await
}

/// Serve `app` on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, app: Arc<Application>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(app))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ToolError::Command(format!("server error: {e}")))
}

/// The axum router wrapping `app`.
pub fn router(app: Arc<Application>) -> Router {
    Router::new()
        .fallback(handle)
        .with_state(app)
        .layer(TraceLayer::new_for_http())
}

async fn handle(
    State(app): State<Arc<Application>>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "could not read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };
    let request = Request::from_parts(parts.method, &parts.uri, parts.headers, body);
    app.handle(request).await.into_response()
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let (status, headers, body) = self.into_parts();
        (status, headers, body).into_response()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::routing::Route;
    use crate::{ApplicationManager, BundleRegistry};
    use tool_shared::Settings;

    async fn greet(cx: RequestContext) -> Result<Response> {
        let name = cx.request().arg("name").unwrap_or_else(|| "world".into());
        Ok(Response::text(format!("Hello, {name}!")))
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let mut manager = ApplicationManager::new(Settings::new(), BundleRegistry::new());
        manager.add_url(Route::new("greet", greet).url("/")).expect("route");
        let app = manager.compile();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_on(listener, app, async {
            let _ = stopped.await;
        }));

        let body = reqwest::get(format!("http://{addr}/?name=Tool"))
            .await
            .expect("request")
            .text()
            .await
            .expect("body");
        assert_eq!(body, "Hello, Tool!");

        let response = reqwest::get(format!("http://{addr}/missing"))
            .await
            .expect("request");
        assert_eq!(response.status().as_u16(), 404);

        stop.send(()).expect("stop server");
        server.await.expect("join").expect("clean shutdown");
    }
}
