//! Postprocessing pipeline.
//!
//! Turns raw mined statistics into the trained pattern set through four
//! persisted states:
//!
//! 1. **raw** (`<name>`): counters as produced by mining
//! 2. **merged** (`<name>_merged`): same-text duplicates collapsed, then
//!    near-duplicate net-negative fragments generalized into wildcard patterns
//! 3. **ranked** (`<name>_merged_ranked`): per-signal percentiles and the
//!    blended score set on every fragment
//! 4. **pruned** (`<name>_merged_ranked_pruned`): fragments below
//!    `min_score` removed
//!
//! Every state is written before the next one starts, and a state whose file
//! already exists is not recomputed, so an interrupted run resumes where it
//! stopped.

pub mod merge_stage;
pub mod ranking_stage;


use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::config::PostprocessConfig;
use crate::core::errors::{BadcodeError, Result};
use crate::core::scoring::build_signals;
use crate::core::stats::StatsStore;
use crate::detectors::generalization::MergePolicy;
use crate::io::persistence::{load_stats, save_stats};

pub use merge_stage::{merge_same_text, merge_similar, GeneralizationSummary};
pub use ranking_stage::{prune, rank};

/// Progress callback: stage name and completed fraction.
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Persisted pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    /// Mined counters
    Raw,
    /// Deduplicated and generalized
    Merged,
    /// Scored
    Ranked,
    /// Thresholded
    Pruned,
}

impl PipelineStage {
    /// All stages in order
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Raw,
        PipelineStage::Merged,
        PipelineStage::Ranked,
        PipelineStage::Pruned,
    ];

    /// Short stage name
    pub fn name(self) -> &'static str {
        match self {
            PipelineStage::Raw => "raw",
            PipelineStage::Merged => "merged",
            PipelineStage::Ranked => "ranked",
            PipelineStage::Pruned => "pruned",
        }
    }

    /// File name suffix appended to the raw stats name
    pub fn suffix(self) -> &'static str {
        match self {
            PipelineStage::Raw => "",
            PipelineStage::Merged => "_merged",
            PipelineStage::Ranked => "_merged_ranked",
            PipelineStage::Pruned => "_merged_ranked_pruned",
        }
    }

    /// Path of this stage's file for a raw stats path
    pub fn path_for(self, raw: &Path) -> PathBuf {
        let mut name = raw
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(self.suffix());
        raw.with_file_name(name)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one pipeline run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Stages computed in this run
    pub computed: Vec<PipelineStage>,
    /// Stages whose files already existed
    pub skipped: Vec<PipelineStage>,
    /// Fragments removed as same-text duplicates
    pub same_text_removed: usize,
    /// Generalization counters, if the merged stage ran
    pub generalization: Option<GeneralizationSummary>,
    /// Fragments removed by pruning
    pub pruned: usize,
    /// Fragments in the final pattern set
    pub patterns: usize,
}

/// Resumable raw → merged → ranked → pruned pipeline.
pub struct PostprocessPipeline {
    config: PostprocessConfig,
    progress: Option<ProgressCallback>,
}

impl PostprocessPipeline {
    /// Pipeline with the given settings
    pub fn new(config: PostprocessConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Report generalization progress through `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run every missing stage for the raw stats at `raw_path` and return the
    /// pruned pattern set.
    pub fn run(&self, raw_path: &Path) -> Result<(StatsStore, PipelineReport)> {
        let mut report = PipelineReport::default();
        let mut current: Option<StatsStore> = None;

        let merged_path = PipelineStage::Merged.path_for(raw_path);
        if merged_path.exists() {
            info!("Stage merged already computed: {}", merged_path.display());
            report.skipped.push(PipelineStage::Merged);
        } else {
            let mut store = load_stage(raw_path, PipelineStage::Raw)?;
            info!("Merging {} fragments", store.len());
            report.same_text_removed = merge_same_text(&mut store);
            report.generalization = Some(merge_similar(
                &mut store,
                MergePolicy::from_config(&self.config),
                self.progress.as_ref(),
            ));
            save_stage(&store, &merged_path, PipelineStage::Merged)?;
            report.computed.push(PipelineStage::Merged);
            current = Some(store);
        }

        let ranked_path = PipelineStage::Ranked.path_for(raw_path);
        if ranked_path.exists() {
            info!("Stage ranked already computed: {}", ranked_path.display());
            report.skipped.push(PipelineStage::Ranked);
            current = None;
        } else {
            let mut store = match current.take() {
                Some(store) => store,
                None => load_stage(&merged_path, PipelineStage::Merged)?,
            };
            rank(&mut store, &build_signals(&self.config.signals));
            save_stage(&store, &ranked_path, PipelineStage::Ranked)?;
            report.computed.push(PipelineStage::Ranked);
            current = Some(store);
        }

        let pruned_path = PipelineStage::Pruned.path_for(raw_path);
        let store = if pruned_path.exists() {
            info!("Stage pruned already computed: {}", pruned_path.display());
            report.skipped.push(PipelineStage::Pruned);
            load_stage(&pruned_path, PipelineStage::Pruned)?
        } else {
            let mut store = match current.take() {
                Some(store) => store,
                None => load_stage(&ranked_path, PipelineStage::Ranked)?,
            };
            report.pruned = prune(&mut store, self.config.min_score);
            save_stage(&store, &pruned_path, PipelineStage::Pruned)?;
            report.computed.push(PipelineStage::Pruned);
            store
        };

        report.patterns = store.len();
        Ok((store, report))
    }
}

/// Load one stage's file; any failure is fatal for that stage.
pub fn load_stage(path: &Path, stage: PipelineStage) -> Result<StatsStore> {
    load_stats(path).map_err(|e| {
        BadcodeError::pipeline(
            stage.name(),
            format!("cannot load {}: {}", path.display(), e),
        )
    })
}

fn save_stage(store: &StatsStore, path: &Path, stage: PipelineStage) -> Result<()> {
    save_stats(store, path)?;
    info!(
        "Stage {} saved with {} fragments to {}",
        stage,
        store.len(),
        path.display()
    );
    Ok(())
}
