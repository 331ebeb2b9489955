//! Command-line entry point shared by Tool applications.
//!
//! Reads the YAML configuration, sets up the configured bundles and runs the
//! management command given on the command line (`serve`, `shell`, `urls`,
//! ...). Applications with their own bundles build a [`BundleRegistry`] on
//! top of [`builtin_registry`] and call [`run`] from their `main`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use tool_core::{ApplicationManager, BundleRegistry, Settings, ToolError};
use tracing::{debug, info, warn};

/// Configuration file looked up when none is given.
pub const DEFAULT_CONFIG: &str = "conf.yaml";

#[derive(Parser, Debug)]
#[command(name = "tool", version, about = "Run Tool applications")]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short, long, env = "TOOL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Management command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initialize the tracing subscriber based on CLI flags.
pub fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "tool=info",
        1 => "tool=debug",
        _ => "tool=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

/// Bundles shipped with the framework.
pub fn builtin_registry() -> BundleRegistry {
    BundleRegistry::new()
        .register(tool_documents::DocumentsBundle)
        .register(tool_templating::TemplatingBundle)
        .register(tool_auth::AuthBundle)
        .register(tool_admin::AdminBundle)
}

/// Settings from the configured file. Without `--config`, a missing
/// [`DEFAULT_CONFIG`] means an empty configuration.
pub fn load_settings(config: Option<&Path>) -> color_eyre::Result<Settings> {
    match config {
        Some(path) => Settings::from_path(path)
            .wrap_err_with(|| format!("failed to load {}", path.display())),
        None => {
            let path = Path::new(DEFAULT_CONFIG);
            if path.exists() {
                Settings::from_path(path)
                    .wrap_err_with(|| format!("failed to load {}", path.display()))
            } else {
                warn!(path = DEFAULT_CONFIG, "no configuration file, using defaults");
                Ok(Settings::new())
            }
        }
    }
}

/// Set up the application and run the requested command.
pub async fn run(cli: Cli, registry: BundleRegistry) -> color_eyre::Result<ExitCode> {
    let settings = load_settings(cli.config.as_deref())?;
    info!(name = %settings.name(), bundles = registry.len(), "loading application");

    let manager = ApplicationManager::load(settings, registry)
        .await
        .wrap_err("failed to set up the application")?;
    let app = manager.compile();
    debug!(?app, "application compiled");

    match app.dispatch(&cli.args).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output.trim_end());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ToolError::Command(message)) => {
            eprintln!("{}", message.trim_end());
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_command() {
        let cli = Cli::try_parse_from(["tool", "-vv", "--config", "blog.yaml", "serve", "-p", "9000"])
            .expect("parse");
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config.as_deref(), Some(Path::new("blog.yaml")));
        assert_eq!(cli.args, ["serve", "-p", "9000"]);
    }

    #[test]
    fn no_command_is_allowed() {
        let cli = Cli::try_parse_from(["tool"]).expect("parse");
        assert!(cli.args.is_empty());
        assert!(matches!(cli.log_format, LogFormat::Text));
    }

    #[test]
    fn builtin_bundles() {
        let registry = builtin_registry();
        for name in ["documents", "templating", "auth", "admin"] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn explicit_config_must_exist() {
        let missing = std::env::temp_dir().join(format!("tool_missing_{}.yaml", uuid::Uuid::new_v4()));
        assert!(load_settings(Some(&missing)).is_err());
    }

    #[tokio::test]
    async fn runs_command_from_config() {
        let path = std::env::temp_dir().join(format!("tool_conf_{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "name: demo\nbundles:\n  documents:\n    path: \":memory:\"\n")
            .expect("write config");

        let cli = Cli::try_parse_from(["tool", "--config", path.to_str().expect("utf-8"), "urls"])
            .expect("parse");
        let code = run(cli, builtin_registry()).await.expect("run");
        assert_eq!(code, ExitCode::SUCCESS);

        let _ = std::fs::remove_file(&path);
    }
}
