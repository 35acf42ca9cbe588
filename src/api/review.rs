//! Review-time matching of changed code against the trained pattern set.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::config::BadcodeConfig;
use crate::core::errors::{BadcodeError, Result, ResultExt};
use crate::core::stats::StatsStore;
use crate::core::tree::Tree;
use crate::detectors::extraction::FragmentExtractor;
use crate::io::git::{diff_buffers, LanguageFilter, PathFilter};
use crate::io::persistence::load_stats;
use crate::lang::common::ParseService;

/// Prefix of every review comment.
pub const COMMENT_PREFIX: &str = "Something looks wrong here";

/// One file of a revision pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFile {
    /// Path of the file in the head revision
    pub path: String,
    /// Contents before the change; absent for new files
    #[serde(default)]
    pub base: Option<String>,
    /// Contents after the change
    pub head: String,
}

/// Files to review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// Changed files
    pub files: Vec<ReviewFile>,
}

/// A comment anchored on a head-side line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Comment {
    /// File path
    pub file: String,
    /// 1-based line in the head revision
    pub line: u32,
    /// Comment body
    pub text: String,
}

/// Comments for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResponse {
    /// Version of the analyzer that produced the comments
    pub analyzer_version: String,
    /// Comments, ordered by file then line
    pub comments: Vec<Comment>,
}

/// Wildcard-aware lookup over the trained patterns.
///
/// Concrete patterns are found by hash. Wildcard patterns always have the
/// size of the trees they match, so only the bucket of the queried size is
/// scanned.
#[derive(Debug, Default)]
pub struct PatternIndex {
    patterns: Vec<Tree>,
    exact: HashMap<Tree, usize>,
    wildcard_buckets: HashMap<usize, Vec<usize>>,
}

impl PatternIndex {
    /// Index every fragment of a pruned store, best score first
    pub fn from_store(store: &StatsStore) -> Self {
        let patterns: Vec<Tree> = store
            .top(store.len())
            .into_iter()
            .map(|(tree, _)| tree.clone())
            .collect();

        let mut exact = HashMap::new();
        let mut wildcard_buckets: HashMap<usize, Vec<usize>> = HashMap::new();
        for (index, pattern) in patterns.iter().enumerate() {
            if pattern.has_wildcards() {
                wildcard_buckets
                    .entry(pattern.size())
                    .or_default()
                    .push(index);
            } else {
                exact.insert(pattern.clone(), index);
            }
        }

        Self {
            patterns,
            exact,
            wildcard_buckets,
        }
    }

    /// Number of indexed patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether no pattern is indexed
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Pattern matching `tree`, if any
    pub fn find(&self, tree: &Tree) -> Option<&Tree> {
        if let Some(&index) = self.exact.get(tree) {
            return Some(&self.patterns[index]);
        }
        self.wildcard_buckets
            .get(&tree.size())?
            .iter()
            .map(|&index| &self.patterns[index])
            .find(|pattern| pattern.matches(tree))
    }
}

/// Produces review comments for changed files.
pub struct Reviewer {
    index: PatternIndex,
    extractor: FragmentExtractor,
    parser: Arc<dyn ParseService>,
    languages: LanguageFilter,
    analyzer_version: String,
}

impl Reviewer {
    /// Reviewer over an in-memory pattern set
    pub fn new(
        config: &BadcodeConfig,
        patterns: &StatsStore,
        parser: Arc<dyn ParseService>,
    ) -> Result<Self> {
        Ok(Self {
            index: PatternIndex::from_store(patterns),
            extractor: FragmentExtractor::new(&config.extraction),
            parser,
            languages: LanguageFilter::new(&config.serve.languages)?,
            analyzer_version: config.serve.analyzer_version.clone(),
        })
    }

    /// Reviewer over the pattern set persisted at `path`
    pub fn load(config: &BadcodeConfig, path: &Path, parser: Arc<dyn ParseService>) -> Result<Self> {
        let patterns = load_stats(path).context("Loading pattern set")?;
        info!("Loaded {} patterns from {}", patterns.len(), path.display());
        Self::new(config, &patterns, parser)
    }

    /// Version string reported in responses
    pub fn analyzer_version(&self) -> &str {
        &self.analyzer_version
    }

    /// Patterns available for matching
    pub fn index(&self) -> &PatternIndex {
        &self.index
    }

    /// Comment on every changed fragment matching a pattern.
    ///
    /// A file that cannot be diffed or parsed contributes no comments.
    pub fn review(&self, request: &ReviewRequest) -> ReviewResponse {
        let mut comments = Vec::new();
        for file in &request.files {
            match self.review_file(file) {
                Ok(found) => comments.extend(found),
                Err(e) => warn!("No review for {}: {}", file.path, e),
            }
        }
        info!("{} comments produced", comments.len());
        ReviewResponse {
            analyzer_version: self.analyzer_version.clone(),
            comments,
        }
    }

    fn review_file(&self, file: &ReviewFile) -> Result<Vec<Comment>> {
        if !self.languages.accepts(&file.path) {
            debug!("Skipping {}: language not reviewed", file.path);
            return Ok(Vec::new());
        }

        let base = file.base.as_deref().unwrap_or_default();
        let (_, added) = diff_buffers(base.as_bytes(), file.head.as_bytes())?;
        if added.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.parser.parse(&file.path, file.head.as_bytes())?;
        let root = response.into_tree().ok_or_else(|| {
            BadcodeError::parse_in_file("unknown", "head revision did not parse", file.path.clone())
        })?;

        let mut seen: HashSet<(u32, &Tree)> = HashSet::new();
        let mut comments = Vec::new();
        for fragment in self.extractor.extract(&root, &added, &file.head) {
            let Some(pattern) = self.index.find(&fragment.tree) else {
                continue;
            };
            let line = fragment.span.start_line;
            if seen.insert((line, pattern)) {
                comments.push(Comment {
                    file: file.path.clone(),
                    line,
                    text: format!("{}: {}", COMMENT_PREFIX, pattern),
                });
            }
        }
        comments.sort_by_key(|comment| comment.line);
        Ok(comments)
    }
}
