//! Merge stage: collapse duplicate-text fragments, then generalize
//! near-duplicate net-negative fragments into wildcard patterns.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::pipeline::ProgressCallback;
use crate::core::stats::StatsStore;
use crate::core::tree::Tree;
use crate::detectors::generalization::{encode_all, MergePolicy};

/// Counters of one generalization pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeneralizationSummary {
    /// Net-negative interior fragments considered
    pub candidates: usize,
    /// Pairs that went through a merge attempt
    pub pairs_compared: usize,
    /// Distinct generalized patterns produced
    pub patterns: usize,
    /// Constituent folds applied
    pub folds: usize,
}

/// Keep only the largest fragment among those sharing an exemplar text.
///
/// Ties on node count keep the greater tree in the tree ordering. Fragments
/// with an empty exemplar are left alone. Returns the number removed.
pub fn merge_same_text(store: &mut StatsStore) -> usize {
    let mut keepers: HashMap<&str, &Tree> = HashMap::new();
    for tree in store.totals().keys() {
        let Some(text) = store.text(tree).filter(|text| !text.is_empty()) else {
            continue;
        };
        keepers
            .entry(text)
            .and_modify(|kept| {
                if (tree.size(), tree) > (kept.size(), *kept) {
                    *kept = tree;
                }
            })
            .or_insert(tree);
    }

    let discarded: Vec<Tree> = store
        .totals()
        .keys()
        .filter(|tree| {
            store
                .text(tree)
                .and_then(|text| keepers.get(text))
                .is_some_and(|kept| *kept != *tree)
        })
        .cloned()
        .collect();

    for tree in &discarded {
        store.remove_fragment(tree);
    }
    debug!("Removed {} same-text fragments", discarded.len());
    discarded.len()
}

/// Generalize net-negative fragments pairwise.
///
/// Pair attempts run in parallel and only produce `(pattern, constituents)`
/// groups; the store is mutated afterwards, one group at a time, so the
/// result does not depend on pair order. A fragment that generalizes with
/// several partners into different patterns is folded into each of them.
pub fn merge_similar(
    store: &mut StatsStore,
    policy: MergePolicy,
    progress: Option<&ProgressCallback>,
) -> GeneralizationSummary {
    let mut candidates: Vec<Tree> = store
        .totals()
        .iter()
        .filter(|(tree, record)| !tree.is_leaf() && record.is_net_negative())
        .map(|(tree, _)| tree.clone())
        .collect();
    candidates.sort_unstable();
    let encoded = encode_all(candidates);

    // Only equal-length sequences can merge
    let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, fragment) in encoded.iter().enumerate() {
        buckets.entry(fragment.sequence.len()).or_default().push(index);
    }

    let total = encoded.len();
    let processed = AtomicUsize::new(0);
    let pairs_compared = AtomicUsize::new(0);
    info!("Generalizing {} candidate fragments", total);

    let found: Vec<(Tree, usize, usize)> = buckets
        .values()
        .flat_map(|bucket| (0..bucket.len()).map(move |x| (bucket, x)))
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map_iter(|(bucket, x)| {
            let first = bucket[x];
            let rest = &bucket[x + 1..];
            pairs_compared.fetch_add(rest.len(), Ordering::Relaxed);
            let merges: Vec<(Tree, usize, usize)> = rest
                .iter()
                .filter_map(|&second| {
                    policy
                        .try_merge(&encoded[first], &encoded[second])
                        .map(|merged| (merged, first, second))
                })
                .collect();

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(callback) = progress {
                if done % 256 == 0 || done == total {
                    callback("generalize", done as f64 / total.max(1) as f64);
                }
            }
            merges
        })
        .collect();

    let mut groups: BTreeMap<Tree, BTreeSet<usize>> = BTreeMap::new();
    for (merged, first, second) in found {
        let members = groups.entry(merged).or_default();
        members.insert(first);
        members.insert(second);
    }

    let mut summary = GeneralizationSummary {
        candidates: total,
        pairs_compared: pairs_compared.into_inner(),
        patterns: groups.len(),
        folds: 0,
    };
    for (pattern, members) in &groups {
        for &member in members {
            store.generalize(pattern, &encoded[member].tree);
            summary.folds += 1;
        }
    }

    info!(
        "Generalization produced {} patterns from {} folds",
        summary.patterns, summary.folds
    );
    summary
}
