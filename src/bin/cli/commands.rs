//! Command Execution Logic
//!
//! Loads configuration, wires progress reporting into the library and runs
//! each subcommand.

use crate::cli::args::*;
use crate::cli::display::*;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use badcode_rs::api::miner::{read_repository_list, Trainer};
use badcode_rs::api::review::Reviewer;
use badcode_rs::api::server;
use badcode_rs::core::config::display_path;
use badcode_rs::core::pipeline::{PipelineStage, ProgressCallback};
use badcode_rs::io::persistence::load_stats;
use badcode_rs::{BadcodeConfig, PostprocessPipeline, TreeSitterParseService};

/// Load configuration from file or use defaults, then validate it
pub fn load_configuration(config_path: Option<&Path>) -> anyhow::Result<BadcodeConfig> {
    let config = match config_path {
        Some(path) => BadcodeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BadcodeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Progress bar driven by a library progress callback.
fn progress_bar(message: &str) -> anyhow::Result<(ProgressBar, ProgressCallback)> {
    let pb = ProgressBar::new(100);
    pb.set_style(ProgressStyle::with_template(
        "🚀 {msg} [{bar:40.bright_blue/blue}] {pos:>3}% {elapsed_precise}",
    )?);
    pb.set_message(message.to_string());

    let callback: ProgressCallback = Box::new({
        let pb = pb.clone();
        move |stage: &str, fraction: f64| {
            pb.set_message(stage.to_string());
            pb.set_position((fraction * 100.0).round() as u64);
        }
    });
    Ok((pb, callback))
}

fn repositories(args: &MineArgs) -> anyhow::Result<Vec<String>> {
    let mut repositories = args.repositories.clone();
    if let Some(list) = &args.repo_list {
        repositories.extend(read_repository_list(list)?);
    }
    if repositories.is_empty() {
        anyhow::bail!("No repositories given; pass names or --repo-list");
    }
    Ok(repositories)
}

fn default_model_path(config: &BadcodeConfig) -> PathBuf {
    PipelineStage::Pruned.path_for(&config.io.global_stats_path())
}

/// Mine repositories and reduce them into the global statistics
pub fn mine_command(args: MineArgs, mut config: BadcodeConfig) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;
    let repositories = repositories(&args)?;
    info!("Mining {} repositories", repositories.len());

    let (pb, callback) = progress_bar("Mining repositories")?;
    let trainer = Trainer::new(config, Arc::new(TreeSitterParseService::new())).with_progress(callback);
    let summary = trainer.mine_all(&repositories)?;
    pb.finish_with_message("Mining complete");

    print_training_summary(&summary);
    println!(
        "{} {}",
        "📦 Statistics written to".bright_green(),
        display_path(&trainer.config().io.global_stats_path()).cyan()
    );
    Ok(())
}

/// Merge, rank and prune raw statistics
pub fn postprocess_command(args: PostprocessArgs, mut config: BadcodeConfig) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;
    let stats = args
        .stats
        .clone()
        .unwrap_or_else(|| config.io.global_stats_path());

    let (pb, callback) = progress_bar("Postprocessing")?;
    let pipeline = PostprocessPipeline::new(config.postprocess.clone()).with_progress(callback);
    let (_, report) = pipeline.run(&stats)?;
    pb.finish_with_message("Postprocessing complete");

    print_pipeline_report(&report);
    println!(
        "{} {}",
        "📦 Pattern set written to".bright_green(),
        display_path(&PipelineStage::Pruned.path_for(&stats)).cyan()
    );
    Ok(())
}

/// Mine, then postprocess
pub fn train_command(args: TrainArgs, mut config: BadcodeConfig) -> anyhow::Result<()> {
    if let Some(min_score) = args.min_score {
        config.postprocess.min_score = min_score;
    }
    mine_command(args.mine.clone(), config.clone())?;
    args.mine.apply(&mut config);
    postprocess_command(PostprocessArgs::default(), config)
}

/// Print the strongest patterns
pub fn inspect_command(args: InspectArgs, config: BadcodeConfig) -> anyhow::Result<()> {
    let model = args.model.clone().unwrap_or_else(|| default_model_path(&config));
    let store = load_stats(&model).with_context(|| format!("Failed to load {}", model.display()))?;
    let k = args.top.unwrap_or(config.postprocess.top_k);
    print_top_patterns(&store, k, args.trees);
    Ok(())
}

/// Run the review server until interrupted
pub async fn serve_command(args: ServeArgs, mut config: BadcodeConfig) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;
    let model = args.model.clone().unwrap_or_else(|| default_model_path(&config));
    let reviewer = Reviewer::load(&config, &model, Arc::new(TreeSitterParseService::new()))?;
    println!(
        "{} {} ({} patterns)",
        "🛰️  Serving reviews on".bright_blue().bold(),
        config.serve.bind_address().cyan(),
        reviewer.index().len()
    );
    server::serve(&config.serve.bind_address(), reviewer).await?;
    Ok(())
}

/// Print default configuration in YAML format
pub fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default badcode configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: badcode --config your-config.yml train <repos>".dimmed());
    println!();

    let yaml_output = serde_yaml::to_string(&BadcodeConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// Validate a configuration file
pub fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        display_path(&args.file).cyan()
    );
    println!();

    match load_configuration(Some(&args.file)) {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            print_config_summary(&config, args.detailed);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Configuration validation failed:".red(), e);
            println!();
            println!(
                "{}",
                "💡 Tip: Use 'badcode print-default-config' to see valid format".dimmed()
            );
            std::process::exit(1);
        }
    }
}
