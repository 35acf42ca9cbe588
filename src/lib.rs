//! # Badcode-RS: Mining Deleted Code Patterns
//!
//! Learns which syntax patterns developers tend to delete, and points them out
//! during review:
//!
//! - **Mining**: replays repository histories and extracts bounded syntax
//!   fragments touched by every change, counting additions and deletions
//! - **Generalization**: merges near-duplicate fragments into wildcard
//!   patterns with a single-difference fast path and a bounded tree edit
//!   distance
//! - **Ranking**: blends pluggable scoring signals through percentile ranks and
//!   prunes low-confidence patterns
//! - **Review**: matches changed code against the trained pattern set over
//!   JSON-RPC
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Layer                            │
//! │            Miner / Trainer · Reviewer · JSON-RPC            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core         │  Detectors       │  Language   │  I/O       │
//! │               │                  │             │            │
//! │ • Tree model  │ • Extraction     │ • Parse     │ • Git      │
//! │ • Stats store │ • Generalization │   service   │ • Cache    │
//! │ • Ranking     │                  │ • Registry  │ • Stats    │
//! │ • Pipeline    │                  │             │   files    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use badcode_rs::{BadcodeConfig, Trainer, TreeSitterParseService};
//!
//! fn main() -> badcode_rs::Result<()> {
//!     let config = BadcodeConfig::default();
//!     let trainer = Trainer::new(config, Arc::new(TreeSitterParseService::new()));
//!     let (patterns, report) = trainer.train(&["golang/example".to_string()])?;
//!     println!("{} patterns after pruning {}", patterns.len(), report.pruned);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Data model, statistics and postprocessing
pub mod core {
    //! Core data structures and the postprocessing pipeline.

    pub mod config;
    pub mod errors;
    pub mod pipeline;
    pub mod ranker;
    pub mod scoring;
    pub mod stats;
    pub mod tree;
}

// Fragment extraction and generalization
pub mod detectors {
    //! Fragment extraction and pattern generalization.

    pub mod extraction;
    pub mod generalization;
}

// Parse-service boundary
pub mod lang {
    //! Language registry and parse services.

    pub mod common;
    pub mod registry;
    pub mod tree_sitter_service;
}

// Version control, caching and persistence
pub mod io {
    //! Git access, blob caching and persisted statistics.

    pub mod cache;
    pub mod git;
    pub mod persistence;
}

// Mining, training and review entry points
pub mod api {
    //! High-level mining, training and review interfaces.

    pub mod miner;
    pub mod review;
    pub mod server;
}

// Re-export primary types for convenience
pub use api::miner::{RepositoryMiner, Trainer};
pub use api::review::{ReviewRequest, ReviewResponse, Reviewer};
pub use core::config::BadcodeConfig;
pub use core::errors::{BadcodeError, Result, ResultExt};
pub use core::pipeline::PostprocessPipeline;
pub use core::stats::StatsStore;
pub use core::tree::Tree;
pub use lang::tree_sitter_service::TreeSitterParseService;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
