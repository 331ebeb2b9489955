//! The `blog` command: serves and manages the sample blog.

use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use tool_cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    tool_cli::init_tracing(&cli);
    tool_cli::run(cli, tool_blog::registry()).await
}
