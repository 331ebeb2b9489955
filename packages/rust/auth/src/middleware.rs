//! Identification and challenge middleware.
//!
//! The `basic` preset identifies users from the `Authorization` header and
//! challenges `401` responses with `WWW-Authenticate`. The `form` preset logs
//! users in through a `POST` to [`LOGIN_PATH`], remembers them with a signed
//! `auth_tkt` cookie and replaces `401` responses with a login form.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tool_core::types::{HeaderValue, Method, StatusCode, header};
use tool_core::{Application, Middleware, Next, Request, Response, escape_html};
use tool_documents::{DocumentStore, default_storage};
use tool_shared::{DocumentId, Result};
use tracing::{debug, info, warn};

use crate::guard::Identity;
use crate::user::{User, constant_time_eq, verify_credentials};

pub const LOGIN_PATH: &str = "/__do_login";
pub const LOGOUT_PATH: &str = "/__do_logout";
pub const TICKET_COOKIE: &str = "auth_tkt";

/// Seconds a ticket stays valid.
pub const TICKET_TIMEOUT: i64 = 7 * 24 * 60 * 60;

/// Which identification and challenge scheme to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Basic,
    Form,
}

pub struct AuthMiddleware {
    preset: Preset,
    secret: String,
    secure_cookie: bool,
}

impl AuthMiddleware {
    pub fn new(preset: Preset, secret: &str) -> Self {
        Self {
            preset,
            secret: secret.to_string(),
            secure_cookie: false,
        }
    }

    /// Send the ticket cookie over HTTPS only.
    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    // -----------------------------------------------------------------------
    // Tickets
    // -----------------------------------------------------------------------

    /// `userid!timestamp!signature` for a ticket issued at `timestamp`.
    pub fn make_ticket(&self, userid: &DocumentId, timestamp: i64) -> String {
        format!("{userid}!{timestamp}!{}", self.sign(&userid.to_string(), timestamp))
    }

    /// The user id of a valid, unexpired ticket.
    pub fn parse_ticket(&self, ticket: &str, now: i64) -> Option<DocumentId> {
        let mut parts = ticket.splitn(3, '!');
        let (userid, timestamp, signature) = (parts.next()?, parts.next()?, parts.next()?);
        let timestamp: i64 = timestamp.parse().ok()?;
        if timestamp > now || now.checked_sub(timestamp)? > TICKET_TIMEOUT {
            return None;
        }
        let expected = self.sign(userid, timestamp);
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return None;
        }
        userid.parse().ok()
    }

    fn sign(&self, userid: &str, timestamp: i64) -> String {
        format!(
            "{:x}",
            Sha256::digest(format!("{}{userid}{timestamp}", self.secret).as_bytes())
        )
    }

    fn ticket_cookie(&self, value: &str, max_age: i64) -> String {
        let secure = if self.secure_cookie { "; Secure" } else { "" };
        format!("{TICKET_COOKIE}={value}; Path=/; HttpOnly; Max-Age={max_age}{secure}")
    }

    // -----------------------------------------------------------------------
    // Identification
    // -----------------------------------------------------------------------

    async fn identify(&self, store: &DocumentStore, request: &Request) -> Result<Option<Identity>> {
        let user = match self.preset {
            Preset::Basic => match request.authorization() {
                Some(credentials) => {
                    verify_credentials(store, &credentials.username, &credentials.password).await?
                }
                None => None,
            },
            Preset::Form => {
                let userid = request
                    .cookie(TICKET_COOKIE)
                    .and_then(|ticket| self.parse_ticket(&ticket, Utc::now().timestamp()));
                match userid {
                    Some(pk) => store.get::<User>(&pk).await?,
                    None => None,
                }
            }
        };
        Ok(user.map(|user| Identity { user }))
    }

    async fn login(&self, store: &DocumentStore, request: &Request) -> Result<Response> {
        let came_from = safe_redirect(request.form_value("came_from"));
        let login = request.form_value("login").unwrap_or_default();
        let password = request.form_value("password").unwrap_or_default();
        match verify_credentials(store, &login, &password).await? {
            Some(user) => {
                info!(username = %user.username, "user logged in");
                let ticket = self.make_ticket(&user.pk, Utc::now().timestamp());
                Ok(Response::redirect(&came_from)
                    .with_cookie(&self.ticket_cookie(&ticket, TICKET_TIMEOUT)))
            }
            None => {
                debug!(%login, "login failed");
                Ok(login_form(&came_from, Some("Wrong username or password.")))
            }
        }
    }

    fn logout(&self, request: &Request) -> Response {
        let came_from = safe_redirect(request.value("came_from"));
        Response::redirect(&came_from).with_cookie(&self.ticket_cookie("", 0))
    }

    fn challenge(&self, request: &Request, response: Response) -> Response {
        match self.preset {
            Preset::Basic => {
                if response.header(header::WWW_AUTHENTICATE).is_some() {
                    response
                } else {
                    response.with_header(
                        header::WWW_AUTHENTICATE,
                        HeaderValue::from_static("Basic realm=\"Login Required\""),
                    )
                }
            }
            Preset::Form => login_form(&request.full_path(), None),
        }
    }

    async fn run(&self, app: &Arc<Application>, mut request: Request, next: Next<'_>) -> Result<Response> {
        let store = default_storage(app.context())?;
        if self.preset == Preset::Form {
            if request.path() == LOGIN_PATH && *request.method() == Method::POST {
                return self.login(store, &request).await;
            }
            if request.path() == LOGOUT_PATH {
                return Ok(self.logout(&request));
            }
        }

        if let Some(identity) = self.identify(store, &request).await? {
            debug!(username = %identity.user.username, "request identified");
            request.extensions_mut().insert(identity);
        }
        // the request moves on, keep what the challenge needs
        let challenge_target = Request::new(request.method().clone(), &request.full_path());
        let response = next.run(request).await;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(self.challenge(&challenge_target, response));
        }
        Ok(response)
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    fn name(&self) -> &str {
        match self.preset {
            Preset::Basic => "auth (basic)",
            Preset::Form => "auth (form)",
        }
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let app = Arc::clone(next.app());
        match self.run(&app, request, next).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "authentication failed");
                Response::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "The server encountered an internal error.",
                )
            }
        }
    }
}

/// Only same-site paths are followed after login and logout.
fn safe_redirect(target: Option<String>) -> String {
    match target {
        Some(target)
            if target.starts_with('/') && !target.starts_with("//") && !target.starts_with("/\\") =>
        {
            target
        }
        _ => "/".to_string(),
    }
}

fn login_form(came_from: &str, message: Option<&str>) -> Response {
    let message = message
        .map(|m| format!("<p class=\"error\">{}</p>\n", escape_html(m)))
        .unwrap_or_default();
    Response::html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Log in</title></head>\n<body>\n\
         <h1>Log in</h1>\n{message}\
         <form action=\"{LOGIN_PATH}\" method=\"post\">\n\
         <input type=\"hidden\" name=\"came_from\" value=\"{}\">\n\
         <label>Username <input type=\"text\" name=\"login\"></label>\n\
         <label>Password <input type=\"password\" name=\"password\"></label>\n\
         <button type=\"submit\">Log in</button>\n\
         </form>\n</body>\n</html>\n",
        escape_html(came_from)
    ))
    .with_status(StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets() {
        let auth = AuthMiddleware::new(Preset::Form, "s3cret");
        let pk = DocumentId::new();
        let ticket = auth.make_ticket(&pk, 1_000);

        assert_eq!(auth.parse_ticket(&ticket, 1_000), Some(pk));
        assert_eq!(auth.parse_ticket(&ticket, 1_000 + TICKET_TIMEOUT), Some(pk));
        assert_eq!(auth.parse_ticket(&ticket, 1_001 + TICKET_TIMEOUT), None);

        let other = AuthMiddleware::new(Preset::Form, "other");
        assert_eq!(other.parse_ticket(&ticket, 1_000), None);

        let forged = ticket.replacen("!1000!", "!1001!", 1);
        assert_eq!(auth.parse_ticket(&forged, 1_001), None);
        assert_eq!(auth.parse_ticket("garbage", 1_000), None);
    }

    #[test]
    fn extreme_ticket_timestamps_are_rejected() {
        let auth = AuthMiddleware::new(Preset::Form, "s3cret");
        let pk = DocumentId::new();
        let now = 1_700_000_000;
        for timestamp in [i64::MIN, i64::MIN + 1, -1, i64::MAX] {
            let ticket = format!("{pk}!{timestamp}!x");
            assert_eq!(auth.parse_ticket(&ticket, now), None, "{timestamp}");
        }
        let signed = auth.make_ticket(&pk, i64::MIN);
        assert_eq!(auth.parse_ticket(&signed, now), None);
    }

    #[test]
    fn redirect_targets() {
        assert_eq!(safe_redirect(Some("/notes/".into())), "/notes/");
        assert_eq!(safe_redirect(Some("//evil.example".into())), "/");
        assert_eq!(safe_redirect(Some("http://evil.example".into())), "/");
        assert_eq!(safe_redirect(Some("/\\evil.example".into())), "/");
        assert_eq!(safe_redirect(None), "/");
    }

    #[test]
    fn form_escapes_target() {
        let response = login_form("/a?b=\"c\"", None);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.text_body().contains("value=\"/a?b=&quot;c&quot;\""));
    }
}
