//! Configuration types and management for badcode-rs.
//!
//! A single [`BadcodeConfig`] is threaded explicitly through mining,
//! postprocessing and serving. Every section has serde defaults so partial YAML
//! files are accepted.

pub mod validation;


use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BadcodeError, Result};
use crate::core::scoring::SignalKind;
pub use validation::{
    validate_bounded_usize, validate_language_keys, validate_non_empty, validate_positive_usize,
    validate_unit_range,
};

/// Main configuration for the mining and review engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BadcodeConfig {
    /// Fragment extraction bounds
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Repository mining settings
    #[serde(default)]
    pub mining: MiningConfig,

    /// Postprocessing (merge, rank, prune) settings
    #[serde(default)]
    pub postprocess: PostprocessConfig,

    /// Data layout on disk
    #[serde(default)]
    pub io: IoConfig,

    /// Review server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Configuration I/O and validation for [`BadcodeConfig`].
impl BadcodeConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            BadcodeError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            BadcodeError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.extraction.validate()?;
        self.mining.validate()?;
        self.postprocess.validate()?;
        self.io.validate()?;
        self.serve.validate()?;
        Ok(())
    }
}

/// Inclusive depth and size bounds for extracted fragments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Minimum fragment depth (a leaf has depth 1)
    #[serde(default = "ExtractionConfig::default_min_depth")]
    pub min_depth: usize,

    /// Maximum fragment depth
    #[serde(default = "ExtractionConfig::default_max_depth")]
    pub max_depth: usize,

    /// Minimum fragment node count
    #[serde(default = "ExtractionConfig::default_min_size")]
    pub min_size: usize,

    /// Maximum fragment node count
    #[serde(default = "ExtractionConfig::default_max_size")]
    pub max_size: usize,

    /// Node kind the parser uses for position-only nodes
    #[serde(default = "ExtractionConfig::default_position_kind")]
    pub position_kind: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_depth: Self::default_min_depth(),
            max_depth: Self::default_max_depth(),
            min_size: Self::default_min_size(),
            max_size: Self::default_max_size(),
            position_kind: Self::default_position_kind(),
        }
    }
}

/// Default values and validation for [`ExtractionConfig`].
impl ExtractionConfig {
    const fn default_min_depth() -> usize {
        2
    }

    const fn default_max_depth() -> usize {
        4
    }

    const fn default_min_size() -> usize {
        2
    }

    const fn default_max_size() -> usize {
        20
    }

    fn default_position_kind() -> String {
        "Position".to_string()
    }

    /// Validate extraction bounds
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.min_depth, "extraction.min_depth")?;
        validate_positive_usize(self.min_size, "extraction.min_size")?;
        if self.min_depth > self.max_depth {
            return Err(BadcodeError::config_field(
                "min_depth must not exceed max_depth",
                "extraction.min_depth",
            ));
        }
        if self.min_size > self.max_size {
            return Err(BadcodeError::config_field(
                "min_size must not exceed max_size",
                "extraction.min_size",
            ));
        }
        Ok(())
    }
}

/// Repository mining configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Branch reference whose history is mined
    #[serde(default = "MiningConfig::default_branch")]
    pub branch: String,

    /// Language keys to mine (see `lang::registry`)
    #[serde(default = "MiningConfig::default_languages")]
    pub languages: Vec<String>,

    /// Glob patterns for vendored or generated paths
    #[serde(default = "MiningConfig::default_vendor_patterns")]
    pub vendor_patterns: Vec<String>,

    /// Blobs larger than this many bytes are skipped
    #[serde(default = "MiningConfig::default_max_blob_size")]
    pub max_blob_size: usize,

    /// Parsed blobs kept per repository
    #[serde(default = "MiningConfig::default_blob_cache_capacity")]
    pub blob_cache_capacity: usize,

    /// Extraction workers per repository
    #[serde(default = "MiningConfig::default_change_workers")]
    pub change_workers: usize,

    /// Capacity of the change queue feeding the workers
    #[serde(default = "MiningConfig::default_queue_capacity")]
    pub queue_capacity: usize,

    /// Repositories mined concurrently
    #[serde(default = "MiningConfig::default_repository_workers")]
    pub repository_workers: usize,

    /// Clone URL for repositories missing locally; `{}` is the repository name
    #[serde(default = "MiningConfig::default_clone_url_template")]
    pub clone_url_template: String,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            branch: Self::default_branch(),
            languages: Self::default_languages(),
            vendor_patterns: Self::default_vendor_patterns(),
            max_blob_size: Self::default_max_blob_size(),
            blob_cache_capacity: Self::default_blob_cache_capacity(),
            change_workers: Self::default_change_workers(),
            queue_capacity: Self::default_queue_capacity(),
            repository_workers: Self::default_repository_workers(),
            clone_url_template: Self::default_clone_url_template(),
        }
    }
}

/// Default values and validation for [`MiningConfig`].
impl MiningConfig {
    fn default_branch() -> String {
        "refs/heads/master".to_string()
    }

    fn default_languages() -> Vec<String> {
        vec!["go".to_string()]
    }

    fn default_vendor_patterns() -> Vec<String> {
        [
            "vendor/**",
            "**/vendor/**",
            "third_party/**",
            "**/node_modules/**",
            "**/*.pb.go",
            "**/*_generated.go",
            "**/zz_generated*.go",
        ]
        .iter()
        .map(|pattern| pattern.to_string())
        .collect()
    }

    const fn default_max_blob_size() -> usize {
        10 * 1024
    }

    const fn default_blob_cache_capacity() -> usize {
        2000
    }

    const fn default_change_workers() -> usize {
        4
    }

    const fn default_queue_capacity() -> usize {
        64
    }

    fn default_repository_workers() -> usize {
        // One extra worker keeps the parser busy while another repo does git I/O
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1
    }

    fn default_clone_url_template() -> String {
        "https://github.com/{}.git".to_string()
    }

    /// Validate mining settings
    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.branch, "mining.branch")?;
        if self.languages.is_empty() {
            return Err(BadcodeError::config_field(
                "at least one language must be mined",
                "mining.languages",
            ));
        }
        validate_language_keys(&self.languages, "mining.languages")?;
        validate_positive_usize(self.max_blob_size, "mining.max_blob_size")?;
        validate_positive_usize(self.blob_cache_capacity, "mining.blob_cache_capacity")?;
        validate_positive_usize(self.change_workers, "mining.change_workers")?;
        validate_positive_usize(self.queue_capacity, "mining.queue_capacity")?;
        validate_positive_usize(self.repository_workers, "mining.repository_workers")?;
        if !self.clone_url_template.contains("{}") {
            return Err(BadcodeError::config_field(
                "clone_url_template must contain a {} placeholder",
                "mining.clone_url_template",
            ));
        }
        Ok(())
    }

    /// Clone URL for a repository name
    pub fn clone_url(&self, repo_name: &str) -> String {
        self.clone_url_template.replacen("{}", repo_name, 1)
    }
}

/// Postprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessConfig {
    /// Fragments whose blended score is below this are pruned
    #[serde(default = "PostprocessConfig::default_min_score")]
    pub min_score: f64,

    /// Edit-distance budget of the bounded merge (0 disables it)
    #[serde(default = "PostprocessConfig::default_max_edit_distance")]
    pub max_edit_distance: u32,

    /// Largest fragment (in nodes) considered by the bounded merge
    #[serde(default = "PostprocessConfig::default_bounded_merge_max_size")]
    pub bounded_merge_max_size: usize,

    /// Scoring signals blended into the final score
    #[serde(default = "PostprocessConfig::default_signals")]
    pub signals: Vec<SignalKind>,

    /// Number of patterns shown by `inspect`
    #[serde(default = "PostprocessConfig::default_top_k")]
    pub top_k: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            min_score: Self::default_min_score(),
            max_edit_distance: Self::default_max_edit_distance(),
            bounded_merge_max_size: Self::default_bounded_merge_max_size(),
            signals: Self::default_signals(),
            top_k: Self::default_top_k(),
        }
    }
}

/// Default values and validation for [`PostprocessConfig`].
impl PostprocessConfig {
    const fn default_min_score() -> f64 {
        0.8
    }

    const fn default_max_edit_distance() -> u32 {
        2
    }

    const fn default_bounded_merge_max_size() -> usize {
        12
    }

    fn default_signals() -> Vec<SignalKind> {
        vec![
            SignalKind::RepoWeightedDeletion,
            SignalKind::DeletionRatio,
            SignalKind::RepositorySpread,
        ]
    }

    const fn default_top_k() -> usize {
        50
    }

    /// Zhang–Shasha is quartic in the worst case; larger fragments stay on the
    /// single-difference path.
    pub const MAX_BOUNDED_MERGE_SIZE: usize = 64;

    /// Validate postprocessing settings
    pub fn validate(&self) -> Result<()> {
        validate_unit_range(self.min_score, "postprocess.min_score")?;
        if self.signals.is_empty() {
            return Err(BadcodeError::config_field(
                "at least one scoring signal is required",
                "postprocess.signals",
            ));
        }
        validate_bounded_usize(
            self.bounded_merge_max_size,
            1,
            Self::MAX_BOUNDED_MERGE_SIZE,
            "postprocess.bounded_merge_max_size",
        )?;
        validate_positive_usize(self.top_k, "postprocess.top_k")?;
        Ok(())
    }
}

/// Data layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    /// Root directory for repositories and statistics
    #[serde(default = "IoConfig::default_data_dir")]
    pub data_dir: PathBuf,

    /// File name of persisted statistics
    #[serde(default = "IoConfig::default_stats_name")]
    pub stats_name: String,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            stats_name: Self::default_stats_name(),
        }
    }
}

/// Default values and derived paths for [`IoConfig`].
impl IoConfig {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    fn default_stats_name() -> String {
        "stats.db".to_string()
    }

    /// Validate the data layout
    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.stats_name, "io.stats_name")
    }

    /// Directory holding cloned repositories
    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    /// Local path of one repository
    pub fn repo_path(&self, repo_name: &str) -> PathBuf {
        self.repos_dir().join(repo_name)
    }

    /// Per-repository statistics file
    pub fn repo_stats_path(&self, repo_name: &str) -> PathBuf {
        self.data_dir
            .join("stats")
            .join(repo_name)
            .join(&self.stats_name)
    }

    /// Reduced statistics across all repositories
    pub fn global_stats_path(&self) -> PathBuf {
        self.data_dir.join(&self.stats_name)
    }
}

/// Review server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Interface to bind
    #[serde(default = "ServeConfig::default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "ServeConfig::default_port")]
    pub port: u16,

    /// Version string reported with every response
    #[serde(default = "ServeConfig::default_analyzer_version")]
    pub analyzer_version: String,

    /// Language keys reviewed; other files yield no comments
    #[serde(default = "ServeConfig::default_languages")]
    pub languages: Vec<String>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            analyzer_version: Self::default_analyzer_version(),
            languages: Self::default_languages(),
        }
    }
}

/// Default values and validation for [`ServeConfig`].
impl ServeConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    const fn default_port() -> u16 {
        9930
    }

    fn default_analyzer_version() -> String {
        "alpha".to_string()
    }

    fn default_languages() -> Vec<String> {
        vec!["go".to_string()]
    }

    /// Validate server settings
    pub fn validate(&self) -> Result<()> {
        validate_non_empty(&self.host, "serve.host")?;
        validate_non_empty(&self.analyzer_version, "serve.analyzer_version")?;
        validate_language_keys(&self.languages, "serve.languages")
    }

    /// `host:port` string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Path of a file relative to the current directory, for display.
pub fn display_path(path: &Path) -> String {
    path.strip_prefix(std::env::current_dir().unwrap_or_default())
        .unwrap_or(path)
        .display()
        .to_string()
}
