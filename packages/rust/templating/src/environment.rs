//! The template environment and its loader.
//!
//! Templates are looked up in the project search paths first (the first
//! directory containing the full name wins), then under registered bundle
//! prefixes: `admin/index.html` is `index.html` in whatever was registered
//! for `admin`. A project can therefore override any bundle template by
//! placing a file at the same relative path in a search path.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use minijinja::{Environment, ErrorKind};
use serde::Serialize;
use tool_shared::{Result, ToolError};
use tracing::{debug, trace};

/// Where the templates of one prefix come from.
#[derive(Debug, Clone)]
enum PrefixSource {
    Dir(PathBuf),
    Embedded(HashMap<String, String>),
}

#[derive(Debug, Default)]
struct Sources {
    searchpaths: Vec<PathBuf>,
    prefixes: BTreeMap<String, PrefixSource>,
}

impl Sources {
    fn load(&self, name: &str) -> io::Result<Option<String>> {
        if name.split(['/', '\\']).any(|segment| segment == "..") {
            return Ok(None);
        }
        for dir in &self.searchpaths {
            if let Some(source) = read_template(&dir.join(name))? {
                trace!(name, dir = %dir.display(), "template found in search path");
                return Ok(Some(source));
            }
        }
        let Some((prefix, rest)) = name.split_once('/') else {
            return Ok(None);
        };
        match self.prefixes.get(prefix) {
            Some(PrefixSource::Dir(dir)) => read_template(&dir.join(rest)),
            Some(PrefixSource::Embedded(templates)) => Ok(templates.get(rest).cloned()),
            None => Ok(None),
        }
    }
}

fn read_template(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::IsADirectory) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The Jinja-style template environment shared by all views.
pub struct Templating {
    env: Environment<'static>,
    sources: Arc<RwLock<Sources>>,
}

impl Templating {
    /// Environment looking up templates in `searchpaths` first.
    pub fn new(searchpaths: Vec<PathBuf>) -> Self {
        let sources = Arc::new(RwLock::new(Sources {
            searchpaths,
            prefixes: BTreeMap::new(),
        }));
        let mut env = Environment::new();
        let loader_sources = Arc::clone(&sources);
        env.set_loader(move |name| {
            loader_sources
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .load(name)
                .map_err(|e| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("could not read template {name:?}"),
                    )
                    .with_source(e)
                })
        });
        Self { env, sources }
    }

    /// Make the templates in `dir` available as `prefix/<name>`.
    pub fn register_templates(&mut self, prefix: &str, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        debug!(prefix, dir = %dir.display(), "registering template directory");
        self.register(prefix, PrefixSource::Dir(dir));
    }

    /// Make templates compiled into the binary available as `prefix/<name>`.
    pub fn register_embedded(&mut self, prefix: &str, templates: &[(&str, &str)]) {
        debug!(prefix, count = templates.len(), "registering embedded templates");
        let templates = templates
            .iter()
            .map(|(name, source)| ((*name).to_string(), (*source).to_string()))
            .collect();
        self.register(prefix, PrefixSource::Embedded(templates));
    }

    fn register(&mut self, prefix: &str, source: PrefixSource) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .prefixes
            .insert(prefix.to_string(), source);
        // drop anything cached under the old lookup
        self.env.clear_templates();
    }

    /// Prefixes registered so far.
    pub fn prefixes(&self) -> Vec<String> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .prefixes
            .keys()
            .cloned()
            .collect()
    }

    /// A value (or function) visible in every template.
    pub fn add_global(&mut self, name: &str, value: minijinja::Value) {
        self.env.add_global(name.to_string(), value);
    }

    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Render the template `name` with `ctx`.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let template = self.env.get_template(name).map_err(template_error)?;
        template.render(ctx).map_err(template_error)
    }

    /// Render template source that is not stored anywhere.
    pub fn render_str<S: Serialize>(&self, source: &str, ctx: S) -> Result<String> {
        self.env.render_str(source, ctx).map_err(template_error)
    }
}

impl std::fmt::Debug for Templating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Templating")
            .field("searchpaths", &sources.searchpaths)
            .field("prefixes", &sources.prefixes.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn template_error(e: minijinja::Error) -> ToolError {
    match e.name() {
        Some(name) => ToolError::Template(format!("{name}: {e}")),
        None => ToolError::Template(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tool_templates_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn search_paths_override_prefixes() {
        let project = temp_dir();
        std::fs::create_dir_all(project.join("admin")).expect("mkdir");
        std::fs::write(project.join("admin/index.html"), "project index").expect("write");

        let mut templating = Templating::new(vec![project]);
        templating.register_embedded(
            "admin",
            &[("index.html", "bundle index"), ("list.html", "bundle list")],
        );

        assert_eq!(templating.render("admin/index.html", ()).expect("render"), "project index");
        assert_eq!(templating.render("admin/list.html", ()).expect("render"), "bundle list");
        assert!(templating.render("admin/missing.html", ()).is_err());
        assert!(templating.render("nobody/index.html", ()).is_err());
    }

    #[test]
    fn directory_prefixes_and_traversal() {
        let bundle = temp_dir();
        std::fs::write(bundle.join("hello.txt"), "Hello {{ name }}!").expect("write");

        let mut templating = Templating::new(vec![]);
        templating.register_templates("greet", &bundle);
        assert_eq!(templating.prefixes(), ["greet"]);
        assert_eq!(
            templating
                .render("greet/hello.txt", context! { name => "Tool" })
                .expect("render"),
            "Hello Tool!"
        );
        assert!(templating.render("greet/../greet/hello.txt", ()).is_err());
    }

    #[test]
    fn html_is_escaped() {
        let mut templating = Templating::new(vec![]);
        templating.register_embedded("t", &[("page.html", "<p>{{ text }}</p>")]);
        templating.add_global("site", minijinja::Value::from("Notes"));
        assert_eq!(
            templating
                .render("t/page.html", context! { text => "<b>" })
                .expect("render"),
            "<p>&lt;b&gt;</p>"
        );
        assert_eq!(templating.render_str("{{ site }}", ()).expect("render"), "Notes");
    }
}
