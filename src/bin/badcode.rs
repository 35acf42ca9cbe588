//! Badcode CLI
//!
//! Mines repositories, postprocesses the statistics, inspects the resulting
//! pattern set and serves review comments.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::PrintDefaultConfig => cli::print_default_config(),
        Commands::ValidateConfig(args) => cli::validate_config(args),
        command => {
            cli::display::print_header();
            let config = cli::load_configuration(cli.config.as_deref())?;
            match command {
                Commands::Mine(args) => {
                    tokio::task::spawn_blocking(move || cli::mine_command(args, config)).await?
                }
                Commands::Postprocess(args) => {
                    tokio::task::spawn_blocking(move || cli::postprocess_command(args, config))
                        .await?
                }
                Commands::Train(args) => {
                    tokio::task::spawn_blocking(move || cli::train_command(args, config)).await?
                }
                Commands::Inspect(args) => cli::inspect_command(args, config),
                Commands::Serve(args) => cli::serve_command(args, config).await,
                Commands::PrintDefaultConfig | Commands::ValidateConfig(_) => Ok(()),
            }
        }
    }
}
