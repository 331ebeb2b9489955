//! Debugging helpers: URL map and middleware stack listings, and an
//! in-process test client.

use std::collections::BTreeMap;
use std::sync::Arc;

use colored::Colorize;
use http::header::{self, HeaderValue};
use http::Method;

use crate::application::Application;
use crate::http::{Request, Response};
use crate::routing::UrlMap;

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// One line per URL rule: `rule..... endpoint (arguments)`.
pub fn format_url_map(urls: &UrlMap, color: bool) -> String {
    let mut out = String::from("\n URLS:\n");
    if urls.is_empty() {
        out.push_str("   (the URL map does not contain any rules.)\n\n");
        return out;
    }
    let width = urls
        .rules()
        .iter()
        .map(|r| r.pattern().chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    for rule in urls.rules() {
        let pattern = rule.pattern();
        let dots = ".".repeat(width - pattern.chars().count());
        let arguments = rule.arguments();
        let arguments = if arguments.is_empty() {
            String::new()
        } else {
            format!(" ({})", arguments.join(", "))
        };
        let methods = rule
            .methods()
            .map(|m| format!(" [{}]", m.join(", ")))
            .unwrap_or_default();
        out.push_str(&format!(
            "   {}{dots} {}{arguments}{methods}\n",
            paint(pattern, color, |s| s.blue()),
            paint(rule.endpoint(), color, |s| s.green()),
        ));
    }
    out.push('\n');
    out
}

/// The middleware stack in the order a request flows through it: ingress
/// (green), routing (yellow), egress (blue).
pub fn format_middleware_stack(names: &[String], color: bool) -> String {
    let mut out = String::from("The middleware stack:\n");
    for name in names {
        out.push_str(&format!(" ↳ {}\n", paint(name, color, |s| s.green())));
    }
    out.push_str(&format!(
        " ↳ {}\n",
        paint("URL/view routing (Tool core)", color, |s| s.yellow())
    ));
    for name in names.iter().rev() {
        out.push_str(&format!(" ↳ {}\n", paint(name, color, |s| s.blue())));
    }
    out
}

fn paint(text: &str, color: bool, style: fn(&str) -> colored::ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Test client
// ---------------------------------------------------------------------------

/// Sends requests straight into an [`Application`], keeping cookies between
/// requests like a browser would.
pub struct Client {
    app: Arc<Application>,
    cookies: BTreeMap<String, String>,
}

impl Client {
    pub fn new(app: Arc<Application>) -> Self {
        Self {
            app,
            cookies: BTreeMap::new(),
        }
    }

    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub async fn get(&mut self, target: &str) -> Response {
        self.request(Request::get(target)).await
    }

    pub async fn post_form(&mut self, target: &str, fields: &[(&str, &str)]) -> Response {
        self.request(Request::post_form(target, fields)).await
    }

    /// `GET` the target, following redirects (up to a limit).
    pub async fn follow(&mut self, target: &str) -> Response {
        let mut response = self.get(target).await;
        for _ in 0..5 {
            if !response.status().is_redirection() {
                break;
            }
            let Some(location) = response.header(header::LOCATION).map(str::to_string) else {
                break;
            };
            response = self.get(&location).await;
        }
        response
    }

    /// Send an arbitrary request with the stored cookies attached.
    pub async fn request(&mut self, mut request: Request) -> Response {
        if !self.cookies.is_empty() && request.header(header::COOKIE).is_none() {
            let jar = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            if let Ok(value) = HeaderValue::from_str(&jar) {
                request.headers_mut().insert(header::COOKIE, value);
            }
        }
        let response = self.app.handle(request).await;
        self.store_cookies(&response);
        response
    }

    fn store_cookies(&mut self, response: &Response) {
        for raw in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            let mut parts = raw.split(';');
            let pair = parts.next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let expired = value.is_empty()
                || parts.any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
            if expired {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.to_string());
            }
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Issue a request with an explicit method and no body.
    pub async fn send(&mut self, method: Method, target: &str) -> Response {
        self.request(Request::new(method, target)).await
    }
}
