//! Request and response types seen by views and middleware.
//!
//! These are deliberately small owned structs built on the `http` crate's
//! primitives, so views never depend on the server implementation. The
//! server module converts to and from axum's types at the edge.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Extensions, Method, StatusCode, Uri};

use crate::strings::escape_html;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An incoming HTTP request with a fully buffered body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: String,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
}

/// Credentials from an `Authorization: Basic ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl Request {
    /// Build a request for `target`, which may carry a query string.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            extensions: Extensions::new(),
        }
    }

    /// Assemble a request from its already-parsed parts.
    pub fn from_parts(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            headers,
            body,
            extensions: Extensions::new(),
        }
    }

    /// `GET target`.
    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// `POST target` with a urlencoded form body.
    pub fn post_form(target: &str, fields: &[(&str, &str)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        Self::new(Method::POST, target)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .with_body(body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach HTTP Basic credentials.
    pub fn with_basic_auth(self, username: &str, password: &str) -> Self {
        let token = STANDARD.encode(format!("{username}:{password}"));
        match HeaderValue::from_str(&format!("Basic {token}")) {
            Ok(value) => self.with_header(header::AUTHORIZATION, value),
            Err(_) => self,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Path plus query string, as it appeared on the request line.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Typed per-request values attached by middleware and signal receivers.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Decoded query string arguments, in order.
    pub fn args(&self) -> Vec<(String, String)> {
        parse_urlencoded(self.query.as_bytes())
    }

    /// First query argument with the given name.
    pub fn arg(&self, name: &str) -> Option<String> {
        first_value(self.args(), name)
    }

    /// Decoded form fields; empty unless the body is urlencoded.
    pub fn form(&self) -> Vec<(String, String)> {
        let is_form = self
            .header(header::CONTENT_TYPE)
            .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));
        if is_form {
            parse_urlencoded(&self.body)
        } else {
            Vec::new()
        }
    }

    /// First form field with the given name.
    pub fn form_value(&self, name: &str) -> Option<String> {
        first_value(self.form(), name)
    }

    /// Form field, falling back to the query string.
    pub fn value(&self, name: &str) -> Option<String> {
        self.form_value(name).or_else(|| self.arg(name))
    }

    /// Credentials from an `Authorization: Basic` header, if well formed.
    pub fn authorization(&self) -> Option<BasicAuth> {
        let value = self.header(header::AUTHORIZATION)?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// All cookies sent with the request.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.trim_matches('"').to_string()))
            })
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        first_value(self.cookies(), name)
    }
}

fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

fn first_value(pairs: Vec<(String, String)>, name: &str) -> Option<String> {
    pairs.into_iter().find(|(k, _)| k == name).map(|(_, v)| v)
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// An outgoing HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK, Bytes::new())
    }
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// `200 OK` with a `text/plain` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body.into()).with_mimetype("text/plain")
    }

    /// `200 OK` with a `text/html` body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, body.into()).with_mimetype("text/html")
    }

    /// `200 OK` with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK, value.to_string()).with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )
    }

    /// `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        Self::redirect_with(StatusCode::FOUND, location)
    }

    /// `301 Moved Permanently` pointing at `location`.
    pub fn permanent_redirect(location: &str) -> Self {
        Self::redirect_with(StatusCode::MOVED_PERMANENTLY, location)
    }

    fn redirect_with(status: StatusCode, location: &str) -> Self {
        let escaped = escape_html(location);
        let body = format!(
            "<!doctype html>\n<title>Redirecting...</title>\n<h1>Redirecting...</h1>\n\
             <p>You should be redirected automatically to <a href=\"{escaped}\">{escaped}</a>.</p>\n"
        );
        let response = Self::new(status, body).with_mimetype("text/html");
        match HeaderValue::from_str(location) {
            Ok(value) => response.with_header(header::LOCATION, value),
            Err(_) => response,
        }
    }

    /// A plain HTML error page for `status`.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            "<!doctype html>\n<title>{code} {reason}</title>\n<h1>{reason}</h1>\n<p>{message}</p>\n",
            code = status.as_u16(),
            message = escape_html(message),
        );
        Self::new(status, body).with_mimetype("text/html")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set `Content-Type` to `mimetype` with a UTF-8 charset.
    pub fn with_mimetype(self, mimetype: &str) -> Self {
        match HeaderValue::from_str(&format!("{mimetype}; charset=utf-8")) {
            Ok(value) => self.with_header(header::CONTENT_TYPE, value),
            Err(_) => self,
        }
    }

    /// Append a raw `Set-Cookie` header (e.g. `name=value; Path=/`).
    pub fn with_cookie(mut self, cookie: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            self.headers.append(header::SET_COOKIE, value);
        }
        self
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// The body decoded as UTF-8 (lossily).
    pub fn text_body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}
