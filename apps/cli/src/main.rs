//! The `tool` command: runs an application built from the framework bundles.

use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use tool_cli::{Cli, builtin_registry};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    tool_cli::init_tracing(&cli);
    tool_cli::run(cli, builtin_registry()).await
}
