//! Repository mining and cross-repository training.
//!
//! [`RepositoryMiner`] turns one repository's history into a [`StatsStore`]:
//! the calling thread walks commits and reads blobs, a bounded queue feeds a
//! small pool of extraction workers, and a single writer thread owns the store
//! so counters are never updated concurrently.
//!
//! [`Trainer`] runs the miner over many repositories, one rayon task per
//! repository, persists each result, reduces them into the global store and
//! optionally runs the postprocessing pipeline on it.

use std::fs;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use git2::{Oid, Repository};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::core::config::{BadcodeConfig, MiningConfig};
use crate::core::errors::{BadcodeError, Result, ResultExt};
use crate::core::pipeline::{PipelineReport, PostprocessPipeline, ProgressCallback};
use crate::core::stats::{Direction, StatsStore};
use crate::detectors::extraction::{Fragment, FragmentExtractor, LineSet};
use crate::io::cache::{BlobCache, CacheStats, ParsedBlob};
use crate::io::git::{
    open_or_clone, read_blob, ChangeWalker, FileChange, LanguageFilter, PathFilter, VendorFilter,
};
use crate::io::persistence::{load_stats, save_stats};
use crate::lang::common::ParseService;

/// Counters of one repository mining run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MiningReport {
    /// Repository name
    pub repository: String,
    /// Commits diffed
    pub commits: usize,
    /// Root and octopus commits skipped
    pub skipped_commits: usize,
    /// File changes processed
    pub changes: usize,
    /// Blobs skipped for size or read errors
    pub skipped_blobs: usize,
    /// Blobs the parse service rejected
    pub parse_failures: usize,
    /// Fragment occurrences recorded
    pub occurrences: usize,
    /// Distinct fragments in the repository store
    pub fragments: usize,
    /// Blob cache hits and misses
    pub cache: CacheStats,
}

/// One blob queued for extraction.
struct BlobJob {
    oid: Oid,
    path: String,
    bytes: Vec<u8>,
    lines: LineSet,
    direction: Direction,
}

/// Mines a single repository.
pub struct RepositoryMiner {
    mining: MiningConfig,
    extractor: FragmentExtractor,
    parser: Arc<dyn ParseService>,
}

impl RepositoryMiner {
    /// Miner using `config`'s bounds and the given parse service
    pub fn new(config: &BadcodeConfig, parser: Arc<dyn ParseService>) -> Self {
        Self {
            mining: config.mining.clone(),
            extractor: FragmentExtractor::new(&config.extraction),
            parser,
        }
    }

    fn filters(&self) -> Result<Vec<Box<dyn PathFilter>>> {
        Ok(vec![
            Box::new(VendorFilter::new(&self.mining.vendor_patterns)?),
            Box::new(LanguageFilter::new(&self.mining.languages)?),
        ])
    }

    /// Mine the configured branch of `repo` into a fresh store.
    pub fn mine(&self, name: &str, repo: &Repository) -> Result<(StatsStore, MiningReport)> {
        let walker = ChangeWalker::new(repo, self.filters()?);
        let cache = BlobCache::new(self.mining.blob_cache_capacity);
        let parse_failures = AtomicUsize::new(0);
        let mut skipped_blobs = 0;

        let (job_tx, job_rx) = channel::bounded::<BlobJob>(self.mining.queue_capacity);
        let (out_tx, out_rx) =
            channel::bounded::<Vec<(Fragment, Direction)>>(self.mining.queue_capacity);

        let (walked, store, occurrences) = thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let mut store = StatsStore::new();
                let mut occurrences = 0;
                for batch in out_rx {
                    occurrences += batch.len();
                    for (fragment, direction) in batch {
                        store.record(name, fragment.tree, &fragment.text, direction);
                    }
                }
                (store, occurrences)
            });

            for _ in 0..self.mining.change_workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let cache = &cache;
                let parse_failures = &parse_failures;
                scope.spawn(move || {
                    for job in job_rx {
                        let Some(batch) = self.process(cache, job) else {
                            parse_failures.fetch_add(1, Ordering::Relaxed);
                            continue;
                        };
                        if !batch.is_empty() && out_tx.send(batch).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(out_tx);

            let walked = walker.walk(&self.mining.branch, |change| {
                for job in self.jobs_for(repo, change, &mut skipped_blobs) {
                    job_tx
                        .send(job)
                        .map_err(|_| BadcodeError::internal("extraction workers stopped"))?;
                }
                Ok(())
            });
            drop(job_tx);

            let (store, occurrences) = writer
                .join()
                .map_err(|_| BadcodeError::internal("stats writer panicked"))?;
            Ok::<_, BadcodeError>((walked, store, occurrences))
        })?;
        let summary = walked?;

        let report = MiningReport {
            repository: name.to_string(),
            commits: summary.commits,
            skipped_commits: summary.skipped_commits,
            changes: summary.changes,
            skipped_blobs,
            parse_failures: parse_failures.into_inner(),
            occurrences,
            fragments: store.len(),
            cache: cache.stats(),
        };
        info!(
            "Mined {}: {} commits, {} changes, {} fragments",
            name, report.commits, report.changes, report.fragments
        );
        Ok((store, report))
    }

    /// Deleted lines are read from the base blob, added lines from the head.
    fn jobs_for(&self, repo: &Repository, change: FileChange, skipped: &mut usize) -> Vec<BlobJob> {
        let sides = [
            (change.base, change.deleted_lines, Direction::Deleted),
            (change.head, change.added_lines, Direction::Added),
        ];
        let mut jobs = Vec::with_capacity(2);
        for (blob, lines, direction) in sides {
            if lines.is_empty() {
                continue;
            }
            match read_blob(repo, blob.oid, self.mining.max_blob_size) {
                Ok(Some(bytes)) => jobs.push(BlobJob {
                    oid: blob.oid,
                    path: blob.path,
                    bytes,
                    lines,
                    direction,
                }),
                Ok(None) => {
                    debug!("Skipping oversized blob {} ({})", blob.oid, blob.path);
                    *skipped += 1;
                }
                Err(e) => {
                    warn!("Cannot read blob {} ({}): {}", blob.oid, blob.path, e);
                    *skipped += 1;
                }
            }
        }
        jobs
    }

    /// Fragments of one blob, or `None` when it could not be parsed.
    fn process(&self, cache: &BlobCache, job: BlobJob) -> Option<Vec<(Fragment, Direction)>> {
        let BlobJob {
            oid,
            path,
            bytes,
            lines,
            direction,
        } = job;
        let parsed = cache
            .get_or_parse(oid, || parse_blob(self.parser.as_ref(), &path, bytes))
            .map_err(|e| warn!("Skipping {} at {}: {}", path, oid, e))
            .ok()?;
        let fragments = self.extractor.extract(&parsed.tree, &lines, &parsed.content);
        Some(
            fragments
                .into_iter()
                .map(|fragment| (fragment, direction))
                .collect(),
        )
    }
}

/// Decode and parse a blob; a non-`Ok` parse status is an error.
pub fn parse_blob(parser: &dyn ParseService, path: &str, bytes: Vec<u8>) -> Result<ParsedBlob> {
    let response = parser.parse(path, &bytes)?;
    let errors = response.errors.join("; ");
    let tree = response.into_tree().ok_or_else(|| {
        BadcodeError::parse_in_file("unknown", format!("parse failed: {}", errors), path)
    })?;
    let content = String::from_utf8(bytes).map_err(|e| {
        BadcodeError::parse_in_file("unknown", format!("invalid UTF-8: {}", e), path)
    })?;
    Ok(ParsedBlob { content, tree })
}

/// Outcome of one repository in a training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryOutcome {
    /// Mined and persisted
    Mined(MiningReport),
    /// Stats already on disk
    Skipped,
    /// Mining failed; the message is logged
    Failed(String),
}

/// Results of [`Trainer::mine_all`].
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    /// Per-repository outcomes, in input order
    pub repositories: Vec<(String, RepositoryOutcome)>,
    /// Distinct fragments in the reduced global store
    pub fragments: usize,
}

impl TrainingSummary {
    /// Repositories that failed
    pub fn failures(&self) -> usize {
        self.repositories
            .iter()
            .filter(|(_, outcome)| matches!(outcome, RepositoryOutcome::Failed(_)))
            .count()
    }
}

/// Mines many repositories and reduces them into the global store.
pub struct Trainer {
    config: BadcodeConfig,
    parser: Arc<dyn ParseService>,
    progress: Option<ProgressCallback>,
}

impl Trainer {
    /// Trainer over `config` using `parser` for every blob
    pub fn new(config: BadcodeConfig, parser: Arc<dyn ParseService>) -> Self {
        Self {
            config,
            parser,
            progress: None,
        }
    }

    /// Report progress through `callback` as `("mine", fraction)`, and pass
    /// the same callback's generalization progress to the pipeline.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &BadcodeConfig {
        &self.config
    }

    /// Mine one repository unless its stats already exist.
    pub fn mine_repository(&self, name: &str) -> Result<Option<MiningReport>> {
        validate_repository_name(name)?;
        let stats_path = self.config.io.repo_stats_path(name);
        if stats_path.exists() {
            info!("Stats for {} already exist, skipping", name);
            return Ok(None);
        }

        let repo = open_or_clone(
            &self.config.io.repo_path(name),
            &self.config.mining.clone_url(name),
        )?;
        let miner = RepositoryMiner::new(&self.config, Arc::clone(&self.parser));
        let (store, report) = miner.mine(name, &repo)?;
        save_stats(&store, &stats_path).with_context(|| format!("Saving stats for {}", name))?;
        Ok(Some(report))
    }

    /// Mine every repository, then reduce all per-repository stats into the
    /// global raw store.
    ///
    /// A repository that fails (missing branch, clone failure) is logged and
    /// left out; the others are unaffected.
    pub fn mine_all(&self, repositories: &[String]) -> Result<TrainingSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.mining.repository_workers)
            .build()
            .map_err(|e| BadcodeError::internal(format!("Cannot build mining pool: {}", e)))?;

        let total = repositories.len();
        let done = AtomicUsize::new(0);
        let outcomes: Vec<(String, RepositoryOutcome)> = pool.install(|| {
            repositories
                .par_iter()
                .map(|name| {
                    let outcome = match self.mine_repository(name) {
                        Ok(Some(report)) => RepositoryOutcome::Mined(report),
                        Ok(None) => RepositoryOutcome::Skipped,
                        Err(e) => {
                            warn!("Skipping repository {}: {}", name, e);
                            RepositoryOutcome::Failed(e.to_string())
                        }
                    };
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(callback) = &self.progress {
                        callback("mine", finished as f64 / total.max(1) as f64);
                    }
                    (name.clone(), outcome)
                })
                .collect()
        });

        let store = self.reduce(repositories)?;
        let global = self.config.io.global_stats_path();
        save_stats(&store, &global)?;
        info!(
            "Reduced {} repositories into {} fragments at {}",
            repositories.len(),
            store.len(),
            global.display()
        );

        Ok(TrainingSummary {
            repositories: outcomes,
            fragments: store.len(),
        })
    }

    /// Sum every persisted per-repository store.
    pub fn reduce(&self, repositories: &[String]) -> Result<StatsStore> {
        repositories
            .par_iter()
            .map(|name| self.config.io.repo_stats_path(name))
            .filter(|path| path.exists())
            .map(|path| load_stats(&path))
            .try_reduce(StatsStore::new, |mut acc, store| {
                acc += store;
                Ok(acc)
            })
    }

    /// Mine, reduce and postprocess into the pruned pattern set.
    pub fn train(self, repositories: &[String]) -> Result<(StatsStore, PipelineReport)> {
        let summary = self.mine_all(repositories)?;
        if summary.failures() > 0 {
            warn!("{} repositories failed to mine", summary.failures());
        }
        let mut pipeline = PostprocessPipeline::new(self.config.postprocess.clone());
        if let Some(callback) = self.progress {
            pipeline = pipeline.with_progress(callback);
        }
        pipeline.run(&self.config.io.global_stats_path())
    }
}

/// Repository names from a list file: one per line, `#` starts a comment.
pub fn read_repository_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        BadcodeError::io(
            format!("Failed to read repository list: {}", path.display()),
            e,
        )
    })?;
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(|name| validate_repository_name(name).map(|()| name.to_string()))
        .collect()
}

/// Reject names that would resolve outside the data directory.
///
/// Names are relative `owner/name` style paths; they are joined onto the
/// repository and stats directories as-is.
pub fn validate_repository_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Component::Normal(_)));
    if name.trim().is_empty() || escapes || name.contains('\\') {
        return Err(BadcodeError::validation(format!(
            "invalid repository name '{}'",
            name
        )));
    }
    Ok(())
}
