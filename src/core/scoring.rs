//! Scoring signals and two-level percentile blending.
//!
//! Each signal's raw score is first turned into a percentile and stored as a
//! named sub-score (`score_<signal>`); the mean of the sub-scores is then
//! ranked again to give the final `score` in `[0, 1)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::ranker::Ranker;
use crate::core::stats::{StatRecord, StatsStore};
use crate::core::tree::Tree;

/// Prefix of named sub-scores on a stat record.
pub const SUB_SCORE_PREFIX: &str = "score_";

/// A heuristic scoring one fragment of a store.
pub trait ScoringSignal: Send + Sync {
    /// Name used for the stored sub-score
    fn name(&self) -> &str;

    /// Raw score; higher means "more likely bad code"
    fn score(&self, store: &StatsStore, tree: &Tree) -> f64;
}

/// Built-in signals selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// [`RepoWeightedDeletion`]
    RepoWeightedDeletion,
    /// [`DeletionRatio`]
    DeletionRatio,
    /// [`RepositorySpread`]
    RepositorySpread,
}

impl SignalKind {
    /// Instantiate the signal
    pub fn build(self) -> Box<dyn ScoringSignal> {
        match self {
            SignalKind::RepoWeightedDeletion => Box::new(RepoWeightedDeletion),
            SignalKind::DeletionRatio => Box::new(DeletionRatio),
            SignalKind::RepositorySpread => Box::new(RepositorySpread),
        }
    }
}

/// Instantiate configured signals.
pub fn build_signals(kinds: &[SignalKind]) -> Vec<Box<dyn ScoringSignal>> {
    kinds.iter().map(|kind| kind.build()).collect()
}

/// Mean over all repositories of `ln(1 + total) * (deleted - added) / total`,
/// counting only repositories that contain the fragment in the sum.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepoWeightedDeletion;

impl ScoringSignal for RepoWeightedDeletion {
    fn name(&self) -> &str {
        "repo_weighted_deletion"
    }

    fn score(&self, store: &StatsStore, tree: &Tree) -> f64 {
        let repos = store.repository_count();
        if repos == 0 {
            return 0.0;
        }
        let sum: f64 = store
            .repositories_of(tree)
            .filter(|(_, record)| record.total() > 0)
            .map(|(_, record)| {
                let total = record.total() as f64;
                (1.0 + total).ln() * record.net_deleted() as f64 / total
            })
            .sum();
        sum / repos as f64
    }
}

/// Log-scaled `(deleted + 1) / (added + 1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeletionRatio;

impl ScoringSignal for DeletionRatio {
    fn name(&self) -> &str {
        "deletion_ratio"
    }

    fn score(&self, store: &StatsStore, tree: &Tree) -> f64 {
        store.get(tree).map_or(0.0, |record| {
            ((record.deleted as f64 + 1.0) / (record.added as f64 + 1.0)).ln()
        })
    }
}

/// Number of repositories where the fragment is net deleted.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositorySpread;

impl ScoringSignal for RepositorySpread {
    fn name(&self) -> &str {
        "repository_spread"
    }

    fn score(&self, store: &StatsStore, tree: &Tree) -> f64 {
        store
            .repositories_of(tree)
            .filter(|(_, record)| record.is_net_negative())
            .count() as f64
    }
}

/// Rank every fragment of `store` and set its sub-scores and final score.
pub fn compute_ranking(store: &mut StatsStore, signals: &[Box<dyn ScoringSignal>]) {
    let mut trees: Vec<Tree> = store.totals().keys().cloned().collect();
    trees.sort_unstable();
    info!(
        "Ranking {} fragments with {} signals",
        trees.len(),
        signals.len()
    );

    for signal in signals {
        let percentiles = {
            let view: &StatsStore = store;
            let raw: Vec<f64> = trees
                .par_iter()
                .map(|tree| signal.score(view, tree))
                .collect();
            rank_indices(&raw)
        };
        let key = format!("{SUB_SCORE_PREFIX}{}", signal.name());
        for (tree, percentile) in trees.iter().zip(percentiles) {
            if let Some(record) = store.get_mut(tree) {
                record.scores.insert(key.clone(), percentile);
            }
        }
        debug!("Computed sub-score {}", key);
    }

    let blended = {
        let means: Vec<f64> = trees
            .iter()
            .map(|tree| store.get(tree).map_or(0.0, mean_sub_score))
            .collect();
        rank_indices(&means)
    };
    for (tree, percentile) in trees.iter().zip(blended) {
        if let Some(record) = store.get_mut(tree) {
            record.score = Some(percentile);
        }
    }
}

/// Arithmetic mean of the named sub-scores of a record.
pub fn mean_sub_score(record: &StatRecord) -> f64 {
    let sub_scores: Vec<f64> = record
        .scores
        .iter()
        .filter(|(name, _)| name.starts_with(SUB_SCORE_PREFIX))
        .map(|(_, value)| *value)
        .collect();
    if sub_scores.is_empty() {
        return 0.0;
    }
    sub_scores.iter().sum::<f64>() / sub_scores.len() as f64
}

fn rank_indices(raw: &[f64]) -> Vec<f64> {
    let mut ranker = Ranker::new(|index: &usize| raw[*index]);
    for index in 0..raw.len() {
        ranker.add(index);
    }
    ranker.finalize();
    (0..raw.len())
        .map(|index| ranker.get(&index).unwrap_or(0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::Direction;
    use approx::assert_relative_eq;

    fn leaf(kind: &str) -> Tree {
        Tree::leaf(kind, "")
    }

    fn fixture() -> StatsStore {
        let mut store = StatsStore::new();
        for _ in 0..4 {
            store.record("r1", leaf("bad"), "", Direction::Deleted);
        }
        store.record("r2", leaf("bad"), "", Direction::Deleted);
        store.record("r1", leaf("good"), "", Direction::Added);
        store.record("r2", leaf("good"), "", Direction::Added);
        store.record("r1", leaf("mixed"), "", Direction::Added);
        store.record("r1", leaf("mixed"), "", Direction::Deleted);
        store
    }

    #[test]
    fn test_repo_weighted_deletion() {
        let store = fixture();
        let score = RepoWeightedDeletion.score(&store, &leaf("bad"));
        let expected = ((1.0f64 + 4.0).ln() + (1.0f64 + 1.0).ln()) / 2.0;
        assert_relative_eq!(score, expected);
        assert_relative_eq!(RepoWeightedDeletion.score(&store, &leaf("mixed")), 0.0);
        assert!(RepoWeightedDeletion.score(&store, &leaf("good")) < 0.0);
    }

    #[test]
    fn test_deletion_ratio_and_spread() {
        let store = fixture();
        assert_relative_eq!(DeletionRatio.score(&store, &leaf("bad")), 6.0f64.ln());
        assert_relative_eq!(RepositorySpread.score(&store, &leaf("bad")), 2.0);
        assert_relative_eq!(RepositorySpread.score(&store, &leaf("good")), 0.0);
    }

    #[test]
    fn test_compute_ranking_blends_sub_scores() {
        let mut store = fixture();
        let signals = build_signals(&[
            SignalKind::RepoWeightedDeletion,
            SignalKind::DeletionRatio,
            SignalKind::RepositorySpread,
        ]);
        compute_ranking(&mut store, &signals);

        let bad = store.get(&leaf("bad")).unwrap();
        let good = store.get(&leaf("good")).unwrap();
        assert_eq!(bad.scores.len(), 3);
        assert!(bad.scores.contains_key("score_deletion_ratio"));
        assert_relative_eq!(good.score.unwrap(), 0.0);
        assert!(bad.score.unwrap() > good.score.unwrap());
        assert_relative_eq!(bad.score.unwrap(), 2.0 / 3.0);
    }

    #[test]
    fn test_signal_kind_names_round_trip_yaml() {
        let yaml = serde_yaml::to_string(&SignalKind::RepoWeightedDeletion).unwrap();
        assert_eq!(yaml.trim(), "repo_weighted_deletion");
        let kind: SignalKind = serde_yaml::from_str("repository_spread").unwrap();
        assert_eq!(kind.build().name(), "repository_spread");
    }
}
