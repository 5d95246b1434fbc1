// ABOUTME: Entry point for the ephem CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{CleanupArgs, Context, DeployArgs};
use ephem::config;
use ephem::error::Result;
use ephem::lifecycle::CleanupSelector;
use ephem::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli.command, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;

    match command {
        Commands::Init { owner, force } => {
            let path = config::init_config(&cwd, owner.as_deref(), force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(())
        }
        Commands::Deploy {
            scenarios,
            cleanup_policy,
            branch,
            no_live,
        } => {
            let ctx = Context::open(&cwd).await?;
            let args = DeployArgs {
                scenarios,
                cleanup_policy,
                branch,
                live: !no_live,
            };
            commands::deploy(&ctx, args, output).await
        }
        Commands::Monitor { no_live } => {
            let ctx = Context::open(&cwd).await?;
            commands::monitor(&ctx, !no_live, output).await
        }
        Commands::Status { all, orphans } => {
            let ctx = Context::open(&cwd).await?;
            commands::status(&ctx, all, orphans, &output).await
        }
        Commands::Cleanup {
            id,
            all: _,
            older_than,
            force,
            dry_run,
            wait,
        } => {
            // clap guarantees exactly one of id, older_than, or all
            let selector = match (id, older_than) {
                (Some(id), _) => CleanupSelector::ById(id),
                (None, Some(age)) => CleanupSelector::OlderThan(age),
                (None, None) => CleanupSelector::All,
            };
            let ctx = Context::open(&cwd).await?;
            let args = CleanupArgs {
                selector,
                force,
                dry_run,
                wait,
            };
            commands::cleanup(&ctx, args, output).await
        }
        Commands::TestResult { id, status } => {
            let ctx = Context::open(&cwd).await?;
            commands::test_result(&ctx, &id, status, &output).await
        }
    }
}
