//! Management commands dispatched from the command line or the shell.
//!
//! Every command describes its arguments with a `clap::Command` and runs
//! against the compiled [`Application`]. Commands return their output as a
//! string; the binary prints it, the shell writes it to its output, and tests
//! simply compare it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Arg, ArgMatches};
use tool_shared::{Result, ToolError};
use tracing::info;

use crate::application::Application;
use crate::debug::{format_middleware_stack, format_url_map};

#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Name, arguments and help text.
    fn definition(&self) -> clap::Command;

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String>;
}

/// Commands known to an application, in registration order.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in management commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ServeCommand);
        registry.register(ShellCommand);
        registry.register(UrlsCommand);
        registry.register(StackCommand);
        registry
    }

    /// Add a command, replacing an earlier one with the same name.
    pub fn register(&mut self, command: impl Command) {
        let name = command.definition().get_name().to_string();
        self.commands
            .retain(|c| c.definition().get_name() != name.as_str());
        self.commands.push(Arc::new(command));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands
            .iter()
            .find(|c| c.definition().get_name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| c.definition().get_name().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The full command-line parser for program `name`.
    pub fn cli(&self, name: &str) -> clap::Command {
        self.commands.iter().fold(
            clap::Command::new(name.to_string())
                .about("Application management")
                .disable_version_flag(true),
            |cli, command| cli.subcommand(command.definition()),
        )
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ---------------------------------------------------------------------------
// Built-in commands
// ---------------------------------------------------------------------------

/// `serve`: run the development HTTP server.
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new("serve")
            .about("Runs development server for your application")
            .arg(
                Arg::new("host")
                    .short('H')
                    .long("host")
                    .help("Interface to bind (default from config, then localhost)"),
            )
            .arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_parser(clap::value_parser!(u16))
                    .help("Port to listen on (default from config, then 6060)"),
            )
    }

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
        let server = app.settings().server()?;
        let host = matches
            .get_one::<String>("host")
            .cloned()
            .unwrap_or(server.host);
        let port = matches.get_one::<u16>("port").copied().unwrap_or(server.port);
        crate::server::serve(Arc::clone(app), &host, port).await?;
        info!("server stopped");
        Ok(String::new())
    }
}

/// `shell`: interactive command console over the same application.
pub struct ShellCommand;

#[async_trait]
impl Command for ShellCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new("shell").about("Spawns an interactive command shell")
    }

    async fn run(&self, app: &Arc<Application>, _matches: &ArgMatches) -> Result<String> {
        crate::shell::run(app, tokio::io::stdin(), tokio::io::stdout()).await?;
        Ok(String::new())
    }
}

/// `urls`: print the URL map.
pub struct UrlsCommand;

#[async_trait]
impl Command for UrlsCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new("urls")
            .about("Lists URL rules and their endpoints")
            .arg(
                Arg::new("no-color")
                    .long("no-color")
                    .action(clap::ArgAction::SetTrue)
                    .help("Plain output without ANSI colors"),
            )
    }

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
        Ok(format_url_map(app.urls(), !matches.get_flag("no-color")))
    }
}

/// `stack`: print the middleware stack in request flow order.
pub struct StackCommand;

#[async_trait]
impl Command for StackCommand {
    fn definition(&self) -> clap::Command {
        clap::Command::new("stack")
            .about("Shows the middleware stack in request flow order")
            .arg(
                Arg::new("no-color")
                    .long("no-color")
                    .action(clap::ArgAction::SetTrue)
                    .help("Plain output without ANSI colors"),
            )
    }

    async fn run(&self, app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
        Ok(format_middleware_stack(
            &app.middleware_names(),
            !matches.get_flag("no-color"),
        ))
    }
}

/// Turn a clap error into a command error, keeping help output intact.
pub(crate) fn clap_error(e: clap::Error) -> ToolError {
    ToolError::Command(e.render().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hello;

    #[async_trait]
    impl Command for Hello {
        fn definition(&self) -> clap::Command {
            clap::Command::new("hello").arg(Arg::new("name").required(true))
        }

        async fn run(&self, _app: &Arc<Application>, matches: &ArgMatches) -> Result<String> {
            let name = matches.get_one::<String>("name").cloned().unwrap_or_default();
            Ok(format!("Hello, {name}!"))
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = CommandRegistry::with_builtins();
        assert_eq!(registry.names(), ["serve", "shell", "urls", "stack"]);
    }

    #[test]
    fn later_registration_replaces() {
        let mut registry = CommandRegistry::new();
        registry.register(Hello);
        registry.register(Hello);
        assert_eq!(registry.names(), ["hello"]);
        assert!(registry.get("hello").is_some());

        let matches = registry
            .cli("manage")
            .try_get_matches_from(["manage", "hello", "world"])
            .expect("parse");
        assert_eq!(matches.subcommand_name(), Some("hello"));
    }
}
