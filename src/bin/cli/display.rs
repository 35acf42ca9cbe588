//! Console rendering of configuration, run summaries and patterns.

use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use badcode_rs::api::miner::{RepositoryOutcome, TrainingSummary};
use badcode_rs::core::config::display_path;
use badcode_rs::core::pipeline::PipelineReport;
use badcode_rs::{BadcodeConfig, StatsStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest exemplar shown in the pattern table
const EXEMPLAR_WIDTH: usize = 60;

/// One-line banner
pub fn print_header() {
    println!("{} v{}", "badcode".bright_blue().bold(), VERSION);
    println!();
}

#[derive(Tabled)]
struct SettingRow {
    setting: String,
    value: String,
}

fn print_settings(rows: Vec<SettingRow>) {
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!();
}

/// Key settings of a configuration
pub fn print_config_summary(config: &BadcodeConfig, detailed: bool) {
    let mut rows = vec![
        SettingRow {
            setting: "Data directory".to_string(),
            value: display_path(&config.io.data_dir),
        },
        SettingRow {
            setting: "Branch".to_string(),
            value: config.mining.branch.clone(),
        },
        SettingRow {
            setting: "Languages".to_string(),
            value: config.mining.languages.join(", "),
        },
        SettingRow {
            setting: "Fragment depth".to_string(),
            value: format!(
                "{}..={}",
                config.extraction.min_depth, config.extraction.max_depth
            ),
        },
        SettingRow {
            setting: "Fragment size".to_string(),
            value: format!(
                "{}..={}",
                config.extraction.min_size, config.extraction.max_size
            ),
        },
        SettingRow {
            setting: "Minimum score".to_string(),
            value: format!("{:.2}", config.postprocess.min_score),
        },
    ];

    if detailed {
        rows.extend([
            SettingRow {
                setting: "Repository workers".to_string(),
                value: config.mining.repository_workers.to_string(),
            },
            SettingRow {
                setting: "Change workers".to_string(),
                value: config.mining.change_workers.to_string(),
            },
            SettingRow {
                setting: "Blob cache capacity".to_string(),
                value: config.mining.blob_cache_capacity.to_string(),
            },
            SettingRow {
                setting: "Max blob size".to_string(),
                value: format!("{} bytes", config.mining.max_blob_size),
            },
            SettingRow {
                setting: "Max edit distance".to_string(),
                value: config.postprocess.max_edit_distance.to_string(),
            },
            SettingRow {
                setting: "Signals".to_string(),
                value: config
                    .postprocess
                    .signals
                    .iter()
                    .map(|signal| format!("{:?}", signal))
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            SettingRow {
                setting: "Server".to_string(),
                value: config.serve.bind_address(),
            },
        ]);
    }

    print_settings(rows);
}

/// Per-repository outcomes of a mining run
pub fn print_training_summary(summary: &TrainingSummary) {
    #[derive(Tabled)]
    struct RepositoryRow {
        repository: String,
        status: String,
        commits: String,
        changes: String,
        fragments: String,
    }

    let rows: Vec<RepositoryRow> = summary
        .repositories
        .iter()
        .map(|(name, outcome)| match outcome {
            RepositoryOutcome::Mined(report) => RepositoryRow {
                repository: name.clone(),
                status: "mined".to_string(),
                commits: report.commits.to_string(),
                changes: report.changes.to_string(),
                fragments: report.fragments.to_string(),
            },
            RepositoryOutcome::Skipped => RepositoryRow {
                repository: name.clone(),
                status: "cached".to_string(),
                commits: "-".to_string(),
                changes: "-".to_string(),
                fragments: "-".to_string(),
            },
            RepositoryOutcome::Failed(message) => RepositoryRow {
                repository: name.clone(),
                status: format!("failed: {}", message),
                commits: "-".to_string(),
                changes: "-".to_string(),
                fragments: "-".to_string(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!(
        "{} {} distinct fragments",
        "✅ Reduced statistics:".bright_green().bold(),
        summary.fragments
    );
    if summary.failures() > 0 {
        println!(
            "{} {} repositories failed",
            "⚠️".yellow(),
            summary.failures()
        );
    }
    println!();
}

/// What the postprocessing pipeline did
pub fn print_pipeline_report(report: &PipelineReport) {
    let stages = |stages: &[badcode_rs::core::pipeline::PipelineStage]| {
        if stages.is_empty() {
            "-".to_string()
        } else {
            stages
                .iter()
                .map(|stage| stage.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let mut rows = vec![
        SettingRow {
            setting: "Computed stages".to_string(),
            value: stages(&report.computed),
        },
        SettingRow {
            setting: "Reused stages".to_string(),
            value: stages(&report.skipped),
        },
        SettingRow {
            setting: "Same-text duplicates removed".to_string(),
            value: report.same_text_removed.to_string(),
        },
    ];
    if let Some(generalization) = &report.generalization {
        rows.extend([
            SettingRow {
                setting: "Generalization candidates".to_string(),
                value: generalization.candidates.to_string(),
            },
            SettingRow {
                setting: "Generalized patterns".to_string(),
                value: generalization.patterns.to_string(),
            },
        ]);
    }
    rows.extend([
        SettingRow {
            setting: "Pruned".to_string(),
            value: report.pruned.to_string(),
        },
        SettingRow {
            setting: "Patterns".to_string(),
            value: report.patterns.to_string(),
        },
    ]);
    print_settings(rows);
}

/// First line of an exemplar, shortened for the table.
fn exemplar(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|line| !line.is_empty());
    let line = line.unwrap_or_default();
    if line.chars().count() > EXEMPLAR_WIDTH {
        let short: String = line.chars().take(EXEMPLAR_WIDTH - 1).collect();
        format!("{}…", short)
    } else {
        line.to_string()
    }
}

/// The `k` best patterns of a store
pub fn print_top_patterns(store: &StatsStore, k: usize, show_trees: bool) {
    #[derive(Tabled)]
    struct PatternRow {
        #[tabled(rename = "#")]
        rank: usize,
        score: String,
        deleted: u64,
        added: u64,
        repos: usize,
        merged: u64,
        exemplar: String,
    }

    let top = store.top(k);
    println!(
        "{} {} of {} patterns",
        "🏆 Top".bright_blue().bold(),
        top.len(),
        store.len()
    );

    let rows: Vec<PatternRow> = top
        .iter()
        .enumerate()
        .map(|(index, (tree, record))| PatternRow {
            rank: index + 1,
            score: record
                .score
                .map_or_else(|| "-".to_string(), |score| format!("{:.3}", score)),
            deleted: record.deleted,
            added: record.added,
            repos: store.repositories_of(tree).count(),
            merged: record.merged,
            exemplar: exemplar(store.text(tree).unwrap_or_default()),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    if show_trees {
        for (index, (tree, _)) in top.iter().enumerate() {
            println!();
            println!("{}", format!("#{}", index + 1).bold());
            println!("{}", tree.pretty_format().dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exemplar_uses_first_non_blank_line() {
        assert_eq!(exemplar("\n\t panic(err)\n}\n"), "panic(err)");
        assert_eq!(exemplar(""), "");
        let long = "x".repeat(100);
        assert_eq!(exemplar(&long).chars().count(), EXEMPLAR_WIDTH);
    }
}
