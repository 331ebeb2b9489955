//! Application settings for Tool.
//!
//! The configuration is just a mapping. It usually comes from a YAML file next
//! to the project (`conf.yaml`), but JSON and TOML work as well. Sections are
//! handed to bundles untouched; each bundle deserializes its own piece.
//! CLI flags override config file values, which override defaults.

use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ToolError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "conf.yaml";

// ---------------------------------------------------------------------------
// File formats
// ---------------------------------------------------------------------------

/// Serialization format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for Format {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(ToolError::config(format!("unknown format {other}"))),
        }
    }
}

/// Read a configuration file and return its top-level mapping.
///
/// Fails with [`ToolError::Config`] if the file does not exist, its format
/// cannot be guessed, it cannot be read or deserialized, or the result is not
/// a mapping.
pub fn load(path: &Path, format: Option<Format>) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Err(ToolError::config(format!(
            "File \"{}\" does not exist",
            path.display()
        )));
    }

    let format = match format {
        Some(format) => format,
        None => Format::from_path(path).ok_or_else(|| {
            ToolError::config(format!("Could not guess format for \"{}\"", path.display()))
        })?,
    };

    let data = std::fs::read_to_string(path).map_err(|e| {
        ToolError::config(format!("Could not open \"{}\": {e}", path.display()))
    })?;

    let value: Value = match format {
        Format::Yaml => serde_yaml::from_str(&data).map_err(deserialize_error)?,
        Format::Json => serde_json::from_str(&data).map_err(deserialize_error)?,
        Format::Toml => toml::from_str(&data).map_err(deserialize_error)?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ToolError::config(format!(
            "Deserialized config must be a mapping, got \"{other}\""
        ))),
    }
}

fn deserialize_error(e: impl std::fmt::Display) -> ToolError {
    ToolError::config(format!("Could not deserialize config data: {e}"))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The application-wide configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    inner: Map<String, Value>,
}

impl Settings {
    /// Empty settings; every section falls back to its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from an in-memory value. `null` means "no settings".
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(inner) => Ok(Self { inner }),
            other => Err(ToolError::config(format!(
                "settings must be a mapping or a path, got \"{other}\""
            ))),
        }
    }

    /// Load settings from a file, guessing the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");
        Ok(Self {
            inner: load(path, None)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.inner
    }

    /// Raw access to a top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.get(key)
    }

    /// Deserialize a top-level section; missing or `null` yields defaults.
    pub fn section<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ToolError::config(format!("invalid section {key:?}: {e}"))),
        }
    }

    /// Bundles listed under `bundles:`, in configuration order.
    ///
    /// Accepts either a mapping of `name: settings` (`~` meaning defaults) or
    /// a plain list of names.
    pub fn bundles(&self) -> Result<Vec<(String, Value)>> {
        match self.inner.get("bundles") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Object(map)) => Ok(map
                .iter()
                .map(|(name, conf)| (name.clone(), conf.clone()))
                .collect()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok((name.clone(), Value::Null)),
                    other => Err(ToolError::config(format!(
                        "bundle names must be strings, got \"{other}\""
                    ))),
                })
                .collect(),
            Some(other) => Err(ToolError::config(format!(
                "\"bundles\" must be a mapping or a list, got \"{other}\""
            ))),
        }
    }

    /// Raw settings for a single bundle, if it is configured at all.
    pub fn bundle(&self, name: &str) -> Option<Value> {
        self.bundles()
            .ok()?
            .into_iter()
            .find(|(bundle, _)| bundle == name)
            .map(|(_, conf)| conf)
    }

    /// Typed settings for a bundle. `Ok(None)` when the bundle is not listed.
    pub fn bundle_settings<T: DeserializeOwned + Default>(&self, name: &str) -> Result<Option<T>> {
        match self.bundle(name) {
            None => Ok(None),
            Some(value) => parse_bundle_settings(name, &value).map(Some),
        }
    }

    /// The `server:` section used by the `serve` command.
    pub fn server(&self) -> Result<ServerConfig> {
        self.section("server")
    }

    /// Program name shown in CLI help; `name:` in the config, `manage` otherwise.
    pub fn name(&self) -> String {
        self.inner
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("manage")
            .to_string()
    }
}

/// Deserialize a bundle's settings value; `null` yields defaults.
pub fn parse_bundle_settings<T: DeserializeOwned + Default>(name: &str, value: &Value) -> Result<T> {
    match value {
        Value::Null => Ok(T::default()),
        value => serde_json::from_value(value.clone())
            .map_err(|e| ToolError::bundle(name, format!("invalid settings: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Server section
// ---------------------------------------------------------------------------

/// `server:` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the development server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the development server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    6060
}
