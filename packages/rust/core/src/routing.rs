//! URL routing: rules, converters, matching and reverse building.
//!
//! Rules use the familiar `/<converter(args):name>/` syntax:
//!
//! ```text
//! /                                    static
//! /<int(4):year>/<int(2):month>/       fixed-width integers
//! /<string(maxlength=8):code>/         length-limited segment
//! /files/<path:file>                   rest of the path, slashes included
//! /<any(about, help):page>/            one of a fixed set
//! ```
//!
//! Views are registered through [`Route`]s grouped into [`Routes`]; every
//! route has an *endpoint* name used for reverse lookup with
//! [`UrlMap::build`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, LazyLock};

use http::Method;
use regex::Regex;
use serde::Serialize;
use tool_shared::{Result, ToolError};
use tracing::debug;

use crate::view::View;

static VARIABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<(?:(?P<conv>[a-zA-Z_][a-zA-Z0-9_]*)(?:\((?P<args>[^)]*)\))?:)?(?P<var>[a-zA-Z_][a-zA-Z0-9_]*)>",
    )
    .expect("valid rule variable regex")
});

// ---------------------------------------------------------------------------
// Route arguments
// ---------------------------------------------------------------------------

/// A value captured from (or substituted into) a URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl RouteValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
            Self::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RouteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RouteValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for RouteValue {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<u32> for RouteValue {
    fn from(n: u32) -> Self {
        Self::Int(n.into())
    }
}

impl From<usize> for RouteValue {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for RouteValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for RouteValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RouteValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Named URL arguments, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RouteArgs(BTreeMap<String, RouteValue>);

impl RouteArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert: `RouteArgs::new().with("year", 2024)`.
    pub fn with(mut self, name: &str, value: impl Into<RouteValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<RouteValue>) -> Option<RouteValue> {
        self.0.insert(name.to_string(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&RouteValue> {
        self.0.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(RouteValue::as_int)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(RouteValue::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<RouteValue> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<RouteValue>> FromIterator<(K, V)> for RouteArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Converters
// ---------------------------------------------------------------------------

/// Parses one URL segment into a typed value and back.
#[derive(Debug, Clone, PartialEq)]
enum Converter {
    Default {
        minlength: usize,
        maxlength: Option<usize>,
    },
    Path,
    Int {
        fixed_digits: Option<usize>,
        min: Option<i64>,
        max: Option<i64>,
    },
    Float {
        min: Option<f64>,
        max: Option<f64>,
    },
    Any(Vec<String>),
    Uuid,
}

/// Converter arguments as written in the rule: positional, then keyword.
#[derive(Default)]
struct ConverterArgs {
    positional: Vec<String>,
    keyword: HashMap<String, String>,
}

impl ConverterArgs {
    fn parse(raw: Option<&str>) -> Self {
        let mut args = Self::default();
        let Some(raw) = raw else { return args };
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item.split_once('=') {
                Some((key, value)) => {
                    args.keyword
                        .insert(key.trim().to_string(), unquote(value.trim()).to_string());
                }
                None => args.positional.push(unquote(item).to_string()),
            }
        }
        args
    }

    /// Keyword argument, or the positional one at `index`.
    fn get(&self, key: &str, index: usize) -> Option<&str> {
        self.keyword
            .get(key)
            .or_else(|| self.positional.get(index))
            .map(String::as_str)
    }

    fn parse_num<T: std::str::FromStr>(&self, key: &str, index: usize) -> Result<Option<T>> {
        self.get(key, index)
            .map(|raw| {
                raw.parse()
                    .map_err(|_| ToolError::routing(format!("invalid converter argument {key}={raw}")))
            })
            .transpose()
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

impl Converter {
    fn parse(name: &str, raw_args: Option<&str>) -> Result<Self> {
        let args = ConverterArgs::parse(raw_args);
        let converter = match name {
            "default" | "string" => {
                let length: Option<usize> = args.parse_num("length", usize::MAX)?;
                match length {
                    Some(n) => Self::Default {
                        minlength: n,
                        maxlength: Some(n),
                    },
                    None => Self::Default {
                        minlength: args.parse_num("minlength", 0)?.unwrap_or(1),
                        maxlength: args.parse_num("maxlength", 1)?,
                    },
                }
            }
            "path" => Self::Path,
            "int" => Self::Int {
                fixed_digits: args.parse_num("fixed_digits", 0)?,
                min: args.parse_num("min", 1)?,
                max: args.parse_num("max", 2)?,
            },
            "float" => Self::Float {
                min: args.parse_num("min", 0)?,
                max: args.parse_num("max", 1)?,
            },
            "any" => {
                if args.positional.is_empty() {
                    return Err(ToolError::routing("any() converter needs at least one item"));
                }
                Self::Any(args.positional)
            }
            "uuid" => Self::Uuid,
            other => return Err(ToolError::routing(format!("unknown converter {other:?}"))),
        };
        Ok(converter)
    }

    fn regex(&self) -> String {
        match self {
            Self::Default {
                minlength,
                maxlength,
            } => match maxlength {
                Some(max) if max == minlength => format!("[^/]{{{max}}}"),
                Some(max) => format!("[^/]{{{minlength},{max}}}"),
                None => format!("[^/]{{{minlength},}}"),
            },
            Self::Path => "[^/].*?".into(),
            Self::Int {
                fixed_digits: Some(n),
                ..
            } => format!(r"\d{{{n}}}"),
            Self::Int { .. } => r"\d+".into(),
            Self::Float { .. } => r"\d+\.\d+".into(),
            Self::Any(items) => {
                let alternatives: Vec<String> = items.iter().map(|i| regex::escape(i)).collect();
                format!("(?:{})", alternatives.join("|"))
            }
            Self::Uuid => {
                "[A-Fa-f0-9]{8}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{4}-[A-Fa-f0-9]{12}"
                    .into()
            }
        }
    }

    /// Lower weights match first among rules of equal shape.
    fn weight(&self) -> u32 {
        match self {
            Self::Any(_) | Self::Uuid => 10,
            Self::Int { .. } | Self::Float { .. } => 50,
            Self::Default { .. } => 100,
            Self::Path => 200,
        }
    }

    fn to_value(&self, raw: &str) -> Option<RouteValue> {
        match self {
            Self::Int { min, max, .. } => {
                let n: i64 = raw.parse().ok()?;
                in_range(n, *min, *max).then_some(RouteValue::Int(n))
            }
            Self::Float { min, max } => {
                let x: f64 = raw.parse().ok()?;
                in_range(x, *min, *max).then_some(RouteValue::Float(x))
            }
            _ => Some(RouteValue::Str(decode_segment(raw))),
        }
    }

    fn to_url(&self, value: &RouteValue) -> Option<String> {
        match self {
            Self::Int {
                fixed_digits,
                min,
                max,
            } => {
                let n = value.as_int()?;
                // the rule only matches unsigned digits
                if n < 0 || !in_range(n, *min, *max) {
                    return None;
                }
                match fixed_digits {
                    Some(width) => {
                        let url = format!("{n:0width$}");
                        (url.len() == *width).then_some(url)
                    }
                    None => Some(n.to_string()),
                }
            }
            Self::Float { min, max } => {
                let x = match value {
                    RouteValue::Float(x) => *x,
                    RouteValue::Int(n) => *n as f64,
                    RouteValue::Str(s) => s.parse().ok()?,
                };
                in_range(x, *min, *max).then(|| format!("{x:?}"))
            }
            Self::Any(items) => {
                let s = value.to_string();
                items.contains(&s).then_some(s)
            }
            Self::Uuid => {
                let s = value.to_string();
                uuid::Uuid::parse_str(&s).ok().map(|_| s)
            }
            Self::Path => Some(
                value
                    .to_string()
                    .split('/')
                    .map(encode_segment)
                    .collect::<Vec<_>>()
                    .join("/"),
            ),
            Self::Default {
                minlength,
                maxlength,
            } => {
                let s = value.to_string();
                let len = s.chars().count();
                if len < *minlength || maxlength.is_some_and(|max| len > max) {
                    return None;
                }
                Some(encode_segment(&s))
            }
        }
    }
}

fn in_range<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
}

fn encode_segment(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn decode_segment(s: &str) -> String {
    // form decoding treats '+' as a space, which path segments must not
    let escaped = s.replace('+', "%2B");
    url::form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Part {
    Static(String),
    Variable { name: String, converter: Converter },
}

/// A compiled URL rule bound to an endpoint.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    endpoint: String,
    methods: Option<BTreeSet<String>>,
    parts: Vec<Part>,
    regex: Regex,
}

impl Rule {
    /// Compile `pattern` for `endpoint`. `None` methods accept any method.
    pub fn new(pattern: &str, endpoint: &str, methods: Option<&[Method]>) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(ToolError::routing(format!(
                "rule {pattern:?} must start with a slash"
            )));
        }

        let mut parts = Vec::new();
        let mut seen = BTreeSet::new();
        let mut last = 0;
        for caps in VARIABLE_RE.captures_iter(pattern) {
            let whole = caps.get(0).ok_or_else(|| ToolError::routing("empty capture"))?;
            if whole.start() > last {
                parts.push(Part::Static(pattern[last..whole.start()].to_string()));
            }
            let name = caps["var"].to_string();
            if !seen.insert(name.clone()) {
                return Err(ToolError::routing(format!(
                    "variable {name:?} appears twice in rule {pattern:?}"
                )));
            }
            let converter = Converter::parse(
                caps.name("conv").map_or("default", |m| m.as_str()),
                caps.name("args").map(|m| m.as_str()),
            )?;
            parts.push(Part::Variable { name, converter });
            last = whole.end();
        }
        if last < pattern.len() {
            parts.push(Part::Static(pattern[last..].to_string()));
        }

        let mut source = String::from("^");
        for part in &parts {
            match part {
                Part::Static(s) => source.push_str(&regex::escape(s)),
                Part::Variable { name, converter } => {
                    source.push_str(&format!("(?P<{name}>{})", converter.regex()));
                }
            }
        }
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|e| ToolError::routing(format!("invalid rule {pattern:?}: {e}")))?;

        let methods = methods.map(|methods| {
            let mut set: BTreeSet<String> = methods.iter().map(|m| m.as_str().to_string()).collect();
            if set.contains("GET") {
                set.insert("HEAD".into());
            }
            set
        });

        Ok(Self {
            pattern: pattern.to_string(),
            endpoint: endpoint.to_string(),
            methods,
            parts,
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Allowed methods, or `None` when any method is accepted.
    pub fn methods(&self) -> Option<Vec<&str>> {
        self.methods
            .as_ref()
            .map(|set| set.iter().map(String::as_str).collect())
    }

    /// Variable names in the order they appear in the rule.
    pub fn arguments(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Variable { name, .. } => Some(name.as_str()),
                Part::Static(_) => None,
            })
            .collect()
    }

    fn allows(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .is_none_or(|set| set.contains(method.as_str()))
    }

    /// Sort key for matching: static rules first, then longer rules, then
    /// by converter weight.
    fn match_key(&self) -> (bool, std::cmp::Reverse<usize>, Vec<u32>) {
        let weights = self
            .parts
            .iter()
            .map(|part| match part {
                Part::Static(_) => 0,
                Part::Variable { converter, .. } => converter.weight(),
            })
            .collect();
        let has_arguments = self.parts.iter().any(|p| matches!(p, Part::Variable { .. }));
        let segments = self.pattern.matches('/').count();
        (has_arguments, std::cmp::Reverse(segments), weights)
    }

    fn captures(&self, path: &str) -> Option<RouteArgs> {
        let caps = self.regex.captures(path)?;
        let mut args = RouteArgs::new();
        for part in &self.parts {
            if let Part::Variable { name, converter } = part {
                let raw = caps.name(name)?.as_str();
                args.0.insert(name.clone(), converter.to_value(raw)?);
            }
        }
        Some(args)
    }

    /// Build a URL from `args`. Returns the path and the arguments left over.
    fn build(&self, args: &RouteArgs) -> Option<(String, Vec<(String, String)>)> {
        let mut url = String::new();
        let mut used = BTreeSet::new();
        for part in &self.parts {
            match part {
                Part::Static(s) => url.push_str(s),
                Part::Variable { name, converter } => {
                    let value = args.get(name)?;
                    url.push_str(&converter.to_url(value)?);
                    used.insert(name.as_str());
                }
            }
        }
        let rest = args
            .iter()
            .filter(|(name, _)| !used.contains(name))
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Some((url, rest))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

// ---------------------------------------------------------------------------
// Route registration
// ---------------------------------------------------------------------------

/// One view with the URL rules it answers to.
#[derive(Clone)]
pub struct Route {
    name: String,
    view: Arc<dyn View>,
    rules: Vec<(String, Option<Vec<Method>>)>,
}

impl Route {
    pub fn new(name: &str, view: impl View) -> Self {
        Self {
            name: name.to_string(),
            view: Arc::new(view),
            rules: Vec::new(),
        }
    }

    /// Add a URL rule. May be called several times; a route without any
    /// rule is served at `/<name>/`.
    pub fn url(mut self, rule: &str) -> Self {
        self.rules.push((rule.to_string(), None));
        self
    }

    /// Add a URL rule restricted to `methods`.
    pub fn url_with_methods(mut self, rule: &str, methods: &[Method]) -> Self {
        self.rules.push((rule.to_string(), Some(methods.to_vec())));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn rules(&self) -> Vec<(String, Option<Vec<Method>>)> {
        if self.rules.is_empty() {
            vec![(format!("/{}/", self.name), None)]
        } else {
            self.rules.clone()
        }
    }
}

/// A group of routes, optionally namespaced (`blog.note`).
#[derive(Clone, Default)]
pub struct Routes {
    namespace: Option<String>,
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes whose endpoints are prefixed with `namespace.`.
    pub fn namespaced(namespace: &str) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            routes: Vec::new(),
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Merge routes gathered elsewhere into this group.
    pub fn extend(&mut self, other: Routes) {
        self.routes.extend(other.routes);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn endpoint(&self, route: &Route) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", route.name),
            None => route.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// URL map
// ---------------------------------------------------------------------------

/// Successful match of a request path.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub endpoint: String,
    pub args: RouteArgs,
}

/// Why a path did not resolve to a view.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchError {
    NotFound,
    /// The path exists but not for this method; carries the allowed ones.
    MethodNotAllowed(Vec<String>),
    /// The rule requires a trailing slash; carries the canonical path.
    Redirect(String),
}

/// All URL rules of an application plus the views behind their endpoints.
#[derive(Clone, Default)]
pub struct UrlMap {
    rules: Vec<Rule>,
    views: HashMap<String, Arc<dyn View>>,
}

impl UrlMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single route at the root.
    pub fn add(&mut self, route: Route) -> Result<()> {
        self.mount("/", Routes::new().route(route))
    }

    /// Register a group of routes under `prefix` (`/` or empty for none).
    pub fn mount(&mut self, prefix: &str, routes: Routes) -> Result<()> {
        let prefix = prefix.trim_end_matches('/');
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ToolError::routing(format!(
                "prefix {prefix:?} must start with a slash"
            )));
        }
        // nothing is registered unless the whole group is valid
        let mut rules = Vec::new();
        let mut views: HashMap<String, Arc<dyn View>> = HashMap::new();
        for route in &routes.routes {
            let endpoint = routes.endpoint(route);
            if self.views.contains_key(&endpoint) || views.contains_key(&endpoint) {
                return Err(ToolError::routing(format!(
                    "endpoint {endpoint:?} is already registered"
                )));
            }
            for (pattern, methods) in route.rules() {
                let full = format!("{prefix}{pattern}");
                rules.push(Rule::new(&full, &endpoint, methods.as_deref())?);
            }
            views.insert(endpoint, Arc::clone(&route.view));
        }
        for rule in &rules {
            debug!(rule = %rule.pattern, endpoint = %rule.endpoint, "adding url rule");
        }
        self.rules.extend(rules);
        self.views.extend(views);
        self.rules.sort_by_key(Rule::match_key);
        Ok(())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn view(&self, endpoint: &str) -> Option<Arc<dyn View>> {
        self.views.get(endpoint).cloned()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    /// Resolve a request path to an endpoint and its arguments.
    pub fn match_path(&self, method: &Method, path: &str) -> std::result::Result<RouteMatch, MatchError> {
        let mut allowed = BTreeSet::new();
        for rule in &self.rules {
            let Some(args) = rule.captures(path) else {
                continue;
            };
            if rule.allows(method) {
                return Ok(RouteMatch {
                    endpoint: rule.endpoint.clone(),
                    args,
                });
            }
            if let Some(methods) = &rule.methods {
                allowed.extend(methods.iter().cloned());
            }
        }
        if !allowed.is_empty() {
            return Err(MatchError::MethodNotAllowed(allowed.into_iter().collect()));
        }

        if !path.ends_with('/') {
            let canonical = format!("{path}/");
            let redirects = self
                .rules
                .iter()
                .any(|rule| rule.pattern.ends_with('/') && rule.captures(&canonical).is_some());
            if redirects {
                return Err(MatchError::Redirect(canonical));
            }
        }
        Err(MatchError::NotFound)
    }

    /// Reverse lookup: the URL for `endpoint` with `args`.
    ///
    /// Rules with more arguments are tried first; arguments a rule does not
    /// use are appended as a query string.
    pub fn build(&self, endpoint: &str, args: &RouteArgs) -> Result<String> {
        let mut candidates: Vec<&Rule> =
            self.rules.iter().filter(|r| r.endpoint == endpoint).collect();
        if candidates.is_empty() {
            return Err(ToolError::build(endpoint, "no such endpoint"));
        }
        candidates.sort_by_key(|rule| std::cmp::Reverse(rule.arguments().len()));

        for rule in candidates {
            if let Some((url, rest)) = rule.build(args) {
                if rest.is_empty() {
                    return Ok(url);
                }
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(rest)
                    .finish();
                return Ok(format!("{url}?{query}"));
            }
        }
        Err(ToolError::build(
            endpoint,
            format!("no rule accepts arguments {:?}", args.iter().map(|(k, _)| k).collect::<Vec<_>>()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::RequestContext;

    async fn noop(_cx: RequestContext) -> Result<Response> {
        Ok(Response::text("ok"))
    }

    fn blog_map() -> UrlMap {
        let mut map = UrlMap::new();
        let routes = Routes::namespaced("blog")
            .route(
                Route::new("notes", noop)
                    .url("/")
                    .url("/<int(4):year>/")
                    .url("/<int(4):year>/<int(2):month>/"),
            )
            .route(Route::new("note", noop).url("/<int(4):year>/<int(2):month>/<slug>/"));
        map.mount("/", routes).expect("mount blog");
        map
    }

    #[test]
    fn matches_static_and_typed_rules() {
        let map = blog_map();

        let m = map.match_path(&Method::GET, "/").expect("index");
        assert_eq!(m.endpoint, "blog.notes");
        assert!(m.args.is_empty());

        let m = map.match_path(&Method::GET, "/2010/05/").expect("month");
        assert_eq!(m.endpoint, "blog.notes");
        assert_eq!(m.args.get_int("year"), Some(2010));
        assert_eq!(m.args.get_int("month"), Some(5));

        let m = map.match_path(&Method::GET, "/2010/05/hello-world/").expect("detail");
        assert_eq!(m.endpoint, "blog.note");
        assert_eq!(m.args.get_str("slug"), Some("hello-world"));

        // fixed digits: a three-digit year is not a year
        assert_eq!(map.match_path(&Method::GET, "/201/"), Err(MatchError::NotFound));
    }

    #[test]
    fn missing_slash_redirects() {
        let map = blog_map();
        assert_eq!(
            map.match_path(&Method::GET, "/2010"),
            Err(MatchError::Redirect("/2010/".into()))
        );
    }

    #[test]
    fn method_not_allowed() {
        let mut map = UrlMap::new();
        map.add(Route::new("login", noop).url_with_methods("/login", &[Method::POST]))
            .expect("add");
        assert!(map.match_path(&Method::POST, "/login").is_ok());
        assert_eq!(
            map.match_path(&Method::GET, "/login"),
            Err(MatchError::MethodNotAllowed(vec!["POST".into()]))
        );
    }

    #[test]
    fn get_implies_head() {
        let mut map = UrlMap::new();
        map.add(Route::new("index", noop).url_with_methods("/", &[Method::GET]))
            .expect("add");
        assert!(map.match_path(&Method::HEAD, "/").is_ok());
    }

    #[test]
    fn inferred_rule_uses_name() {
        let mut map = UrlMap::new();
        map.add(Route::new("about", noop)).expect("add");
        assert_eq!(map.rules()[0].pattern(), "/about/");
        assert_eq!(map.build("about", &RouteArgs::new()).expect("build"), "/about/");
    }

    #[test]
    fn build_prefers_rules_with_more_arguments() {
        let map = blog_map();
        let url = map
            .build("blog.notes", &RouteArgs::new().with("year", 2010).with("month", 5))
            .expect("build");
        assert_eq!(url, "/2010/05/");

        let url = map
            .build("blog.notes", &RouteArgs::new().with("year", 2010))
            .expect("build");
        assert_eq!(url, "/2010/");

        // leftovers go to the query string
        let url = map
            .build("blog.notes", &RouteArgs::new().with("page", 2))
            .expect("build");
        assert_eq!(url, "/?page=2");

        // string month as in templates: '05'
        let url = map
            .build(
                "blog.note",
                &RouteArgs::new()
                    .with("year", 2010)
                    .with("month", "05")
                    .with("slug", "hello world"),
            )
            .expect("build");
        assert_eq!(url, "/2010/05/hello%20world/");
    }

    #[test]
    fn build_errors() {
        let map = blog_map();
        assert!(matches!(
            map.build("blog.nope", &RouteArgs::new()),
            Err(ToolError::Build { .. })
        ));
        // a 5-digit year does not fit int(4) on any rule
        assert!(map
            .build("blog.note", &RouteArgs::new().with("year", 20100).with("month", 1).with("slug", "x"))
            .is_err());
        assert!(map
            .build("blog.note", &RouteArgs::new().with("year", -12).with("month", 1).with("slug", "x"))
            .is_err());
        assert!(map
            .build("blog.note", &RouteArgs::new().with("year", 2010).with("month", 100).with("slug", "x"))
            .is_err());

        let url = map
            .build("blog.note", &RouteArgs::new().with("year", 990).with("month", 1).with("slug", "x"))
            .expect("padded");
        assert_eq!(url, "/0990/01/x/");
        let matched = map.match_path(&Method::GET, &url).expect("round trip");
        assert_eq!(matched.args.get_int("year"), Some(990));
    }

    #[test]
    fn prefixes_and_duplicates() {
        let mut map = UrlMap::new();
        map.mount("/admin/", Routes::namespaced("admin").route(Route::new("index", noop).url("/")))
            .expect("mount");
        assert!(map.match_path(&Method::GET, "/admin/").is_ok());

        let again = Routes::namespaced("admin").route(Route::new("index", noop).url("/x"));
        assert!(map.mount("/", again).is_err());

        // a failing group leaves no partial registrations behind
        let broken = Routes::namespaced("site")
            .route(Route::new("home", noop).url("/"))
            .route(Route::new("bad", noop).url("/<bogus:x>/"));
        assert!(map.mount("/", broken).is_err());
        assert_eq!(map.rules().len(), 1);
        assert!(map.view("site.home").is_none());
        assert_eq!(map.match_path(&Method::GET, "/"), Err(MatchError::NotFound));

        let twice = Routes::namespaced("site")
            .route(Route::new("home", noop).url("/"))
            .route(Route::new("home", noop).url("/home/"));
        assert!(map.mount("/", twice).is_err());
        assert_eq!(map.rules().len(), 1);
    }

    #[test]
    fn converters() {
        let mut map = UrlMap::new();
        map.add(Route::new("file", noop).url("/files/<path:file>")).expect("path");
        map.add(Route::new("page", noop).url("/<any(about, help):page>/")).expect("any");
        map.add(Route::new("code", noop).url("/c/<string(length=3):code>/")).expect("length");
        map.add(Route::new("ratio", noop).url("/r/<float:x>/")).expect("float");
        map.add(Route::new("obj", noop).url("/o/<uuid:id>/")).expect("uuid");
        map.add(Route::new("n", noop).url("/n/<int(min=1, max=9):n>/")).expect("range");

        let m = map.match_path(&Method::GET, "/files/a/b.txt").expect("path match");
        assert_eq!(m.args.get_str("file"), Some("a/b.txt"));
        assert!(map.match_path(&Method::GET, "/help/").is_ok());
        assert_eq!(map.match_path(&Method::GET, "/other/"), Err(MatchError::NotFound));
        assert!(map.match_path(&Method::GET, "/c/abc/").is_ok());
        assert!(map.match_path(&Method::GET, "/c/abcd/").is_err());
        let m = map.match_path(&Method::GET, "/r/1.5/").expect("float match");
        assert_eq!(m.args.get("x"), Some(&RouteValue::Float(1.5)));
        assert!(map
            .match_path(&Method::GET, "/o/0190f5a4-7d7b-7c4e-9b8a-1c2d3e4f5a6b/")
            .is_ok());
        assert!(map.match_path(&Method::GET, "/n/5/").is_ok());
        assert!(map.match_path(&Method::GET, "/n/10/").is_err());
    }

    #[test]
    fn invalid_rules() {
        assert!(Rule::new("no-slash", "x", None).is_err());
        assert!(Rule::new("/<foo:bar>/", "x", None).is_err());
        assert!(Rule::new("/<a>/<a>/", "x", None).is_err());
    }
}
