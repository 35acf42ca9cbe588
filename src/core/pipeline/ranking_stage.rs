//! Ranking and pruning stages.

use tracing::info;

use crate::core::scoring::{compute_ranking, ScoringSignal};
use crate::core::stats::StatsStore;

/// Set sub-scores and blended scores on every fragment.
pub fn rank(store: &mut StatsStore, signals: &[Box<dyn ScoringSignal>]) {
    compute_ranking(store, signals);
}

/// Drop fragments scoring below `min_score`; returns the number removed.
pub fn prune(store: &mut StatsStore, min_score: f64) -> usize {
    let before = store.len();
    let removed = store.prune(min_score);
    info!(
        "Pruned {} of {} fragments below score {:.2}",
        removed, before, min_score
    );
    debug_assert!(store.is_consistent());
    removed
}
