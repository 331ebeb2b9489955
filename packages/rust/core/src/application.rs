//! The compiled application: immutable after the manager is done.

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use http::header::{ALLOW, HeaderValue};
use http::StatusCode;
use tool_shared::{Result, Settings, ToolError};
use tracing::{debug, error, instrument, warn};

use crate::commands::{CommandRegistry, clap_error};
use crate::context::{Context, RequestContext};
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use crate::routing::{MatchError, RouteArgs, UrlMap};
use crate::signals::{Dispatcher, RequestReady};

/// A fully set-up application, shared between requests.
pub struct Application {
    pub(crate) settings: Settings,
    pub(crate) context: Context,
    pub(crate) urls: UrlMap,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) commands: CommandRegistry,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) bundles: Vec<String>,
}

impl Application {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn urls(&self) -> &UrlMap {
        &self.urls
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Names of the bundles that were set up, in setup order.
    pub fn bundles(&self) -> &[String] {
        &self.bundles
    }

    /// Middleware names from outermost to innermost.
    pub fn middleware_names(&self) -> Vec<String> {
        self.middleware.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn url_for(&self, endpoint: &str, args: &RouteArgs) -> Result<String> {
        self.urls.build(endpoint, args)
    }

    // -----------------------------------------------------------------------
    // Web
    // -----------------------------------------------------------------------

    /// Run a request through the middleware stack and the router.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.path()))]
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        let response = Next::new(self, &self.middleware).run(request).await;
        debug!(status = response.status().as_u16(), "response ready");
        response
    }

    /// Match the request to a view and call it.
    pub(crate) async fn route(self: &Arc<Self>, request: Request) -> Response {
        let matched = match self.urls.match_path(request.method(), request.path()) {
            Ok(matched) => matched,
            Err(MatchError::NotFound) => {
                return Response::error(
                    StatusCode::NOT_FOUND,
                    "The requested URL was not found on the server.",
                );
            }
            Err(MatchError::MethodNotAllowed(allowed)) => {
                let response = Response::error(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "The method is not allowed for the requested URL.",
                );
                return match HeaderValue::from_str(&allowed.join(", ")) {
                    Ok(value) => response.with_header(ALLOW, value),
                    Err(_) => response,
                };
            }
            Err(MatchError::Redirect(path)) => {
                let location = match request.query_string() {
                    "" => path,
                    query => format!("{path}?{query}"),
                };
                return Response::permanent_redirect(&location);
            }
        };

        let Some(view) = self.urls.view(&matched.endpoint) else {
            return error_response(&ToolError::not_found());
        };
        debug!(endpoint = %matched.endpoint, "dispatching to view");

        let mut cx = RequestContext::new(request, matched.endpoint, matched.args, Arc::clone(self));
        if let Err(e) = self.dispatcher.send::<RequestReady>(&mut cx) {
            return error_response(&e);
        }
        match view.call(cx).await {
            Ok(response) => response,
            Err(e) => error_response(&e),
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// The command-line parser covering every registered command.
    pub fn cli(&self) -> clap::Command {
        self.commands.cli(&self.settings.name())
    }

    /// Parse `args` (without the program name) and run the chosen command.
    ///
    /// Without a command the help text is returned. Parse errors, including
    /// `--help`, come back as [`ToolError::Command`] with clap's rendering.
    pub async fn dispatch<I, T>(self: &Arc<Self>, args: I) -> Result<String>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = {
            let mut cli = self.cli();
            let argv = std::iter::once(OsString::from(self.settings.name()))
                .chain(args.into_iter().map(Into::into));
            let matches = cli.try_get_matches_from_mut(argv).map_err(clap_error)?;
            if matches.subcommand().is_none() {
                return Ok(cli.render_help().to_string());
            }
            matches
        };

        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(ToolError::Command("no command given".into()));
        };
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| ToolError::Command(format!("unknown command {name:?}")))?;
        debug!(command = name, "running command");
        command.run(self, sub_matches).await
    }
}

fn error_response(e: &ToolError) -> Response {
    match e {
        ToolError::Http { status, message } => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                warn!(%status, reason = %message, "view aborted");
            }
            Response::error(status, message)
        }
        other => {
            error!(error = %other, "view failed");
            Response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "The server encountered an internal error.",
            )
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("bundles", &self.bundles)
            .field("rules", &self.urls.rules().len())
            .field("middleware", &self.middleware_names())
            .field("commands", &self.commands)
            .finish()
    }
}
