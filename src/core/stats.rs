//! Content-addressed fragment statistics.
//!
//! A [`StatsStore`] counts how often each fragment was added and deleted,
//! globally and per repository, and keeps one source exemplar per fragment.
//! Stores from independent repositories combine with [`StatsStore::merge`],
//! which is associative and commutative on the counters.

use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::core::tree::Tree;

/// Which side of a change a fragment was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Present in the new revision
    Added,
    /// Present in the old revision
    Deleted,
}

/// Counters and scores of one fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    /// Times the fragment appeared on added lines
    pub added: u64,
    /// Times the fragment appeared on deleted lines
    pub deleted: u64,
    /// Constituents folded into this fragment
    pub merged: u64,
    /// Folded constituents that were net non-negative
    pub merged_positive: u64,
    /// Folded constituents that were net negative
    pub merged_negative: u64,
    /// Named percentile sub-scores (`score_<signal>`)
    pub scores: BTreeMap<String, f64>,
    /// Blended percentile score, set by ranking
    pub score: Option<f64>,
}

impl StatRecord {
    /// Increment the counter for one direction
    pub fn record(&mut self, direction: Direction) {
        match direction {
            Direction::Added => self.added += 1,
            Direction::Deleted => self.deleted += 1,
        }
    }

    /// Total occurrences
    pub fn total(&self) -> u64 {
        self.added + self.deleted
    }

    /// `deleted - added`
    pub fn net_deleted(&self) -> i64 {
        self.deleted as i64 - self.added as i64
    }

    /// Deleted more often than added
    pub fn is_net_negative(&self) -> bool {
        self.deleted > self.added
    }

    /// Blended score, 0 when unranked
    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    fn absorb(&mut self, src_added: u64, src_deleted: u64) {
        self.added += src_added;
        self.deleted += src_deleted;
        self.merged += 1;
        if src_added >= src_deleted {
            self.merged_positive += 1;
        } else {
            self.merged_negative += 1;
        }
    }
}

impl AddAssign<&StatRecord> for StatRecord {
    fn add_assign(&mut self, other: &StatRecord) {
        self.added += other.added;
        self.deleted += other.deleted;
        self.merged += other.merged;
        self.merged_positive += other.merged_positive;
        self.merged_negative += other.merged_negative;
    }
}

/// Fragment statistics: totals, per-repository counters and exemplar text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsStore {
    totals: HashMap<Tree, StatRecord>,
    per_repo: BTreeMap<String, HashMap<Tree, StatRecord>>,
    text: HashMap<Tree, String>,
}

impl StatsStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct fragments
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    /// Whether the store holds no fragment
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Global counters per fragment
    pub fn totals(&self) -> &HashMap<Tree, StatRecord> {
        &self.totals
    }

    /// Per-repository counters
    pub fn per_repo(&self) -> &BTreeMap<String, HashMap<Tree, StatRecord>> {
        &self.per_repo
    }

    /// Number of repositories with at least one recorded fragment
    pub fn repository_count(&self) -> usize {
        self.per_repo.len()
    }

    /// Global record of one fragment
    pub fn get(&self, tree: &Tree) -> Option<&StatRecord> {
        self.totals.get(tree)
    }

    /// Mutable global record of one fragment
    pub fn get_mut(&mut self, tree: &Tree) -> Option<&mut StatRecord> {
        self.totals.get_mut(tree)
    }

    /// Source exemplar of a fragment
    pub fn text(&self, tree: &Tree) -> Option<&str> {
        self.text.get(tree).map(String::as_str)
    }

    /// Per-repository records of one fragment
    pub fn repositories_of<'a>(
        &'a self,
        tree: &'a Tree,
    ) -> impl Iterator<Item = (&'a str, &'a StatRecord)> + 'a {
        self.per_repo
            .iter()
            .filter_map(move |(repo, records)| records.get(tree).map(|r| (repo.as_str(), r)))
    }

    /// Count one occurrence of `tree` in `repo`; the first text seen is kept.
    pub fn record(&mut self, repo: &str, tree: Tree, text: &str, direction: Direction) {
        if !self.text.contains_key(&tree) {
            self.text.insert(tree.clone(), text.to_string());
        }
        self.per_repo
            .entry(repo.to_string())
            .or_default()
            .entry(tree.clone())
            .or_default()
            .record(direction);
        self.totals.entry(tree).or_default().record(direction);
    }

    /// Fold `other` into `self`, summing counters per fragment.
    pub fn merge(&mut self, other: StatsStore) {
        merge_records(&mut self.totals, other.totals);
        for (repo, records) in other.per_repo {
            merge_records(self.per_repo.entry(repo).or_default(), records);
        }
        for (tree, text) in other.text {
            self.text.entry(tree).or_insert(text);
        }
    }

    /// Associative fold of many stores.
    pub fn reduce(stores: impl IntoIterator<Item = StatsStore>) -> StatsStore {
        stores.into_iter().fold(StatsStore::new(), |mut acc, store| {
            acc += store;
            acc
        })
    }

    /// Copy `src`'s counters into `dst` in the totals and every repository
    /// that has `src`, bumping `dst`'s merge bookkeeping.
    pub fn generalize(&mut self, dst: &Tree, src: &Tree) {
        if dst == src {
            return;
        }
        absorb_into(&mut self.totals, dst, src);
        for records in self.per_repo.values_mut() {
            absorb_into(records, dst, src);
        }
        if !self.text.contains_key(dst) {
            if let Some(text) = self.text.get(src).cloned() {
                self.text.insert(dst.clone(), text);
            }
        }
    }

    /// Remove a fragment everywhere.
    pub fn remove_fragment(&mut self, tree: &Tree) -> Option<StatRecord> {
        for records in self.per_repo.values_mut() {
            records.remove(tree);
        }
        self.text.remove(tree);
        self.totals.remove(tree)
    }

    /// Drop every fragment scoring below `min_score` (unranked counts as 0).
    ///
    /// Returns the number of fragments removed.
    pub fn prune(&mut self, min_score: f64) -> usize {
        let before = self.totals.len();
        self.totals
            .retain(|_, record| record.score_or_zero() >= min_score);
        let totals = &self.totals;
        for records in self.per_repo.values_mut() {
            records.retain(|tree, _| totals.contains_key(tree));
        }
        self.per_repo.retain(|_, records| !records.is_empty());
        self.text.retain(|tree, _| totals.contains_key(tree));
        before - self.totals.len()
    }

    /// Every fragment in a repository map is also in the totals.
    pub fn is_consistent(&self) -> bool {
        self.per_repo
            .values()
            .all(|records| records.keys().all(|tree| self.totals.contains_key(tree)))
    }

    /// The `k` highest-scoring fragments, best first.
    pub fn top(&self, k: usize) -> Vec<(&Tree, &StatRecord)> {
        let mut ranked: Vec<(&Tree, &StatRecord)> = self.totals.iter().collect();
        ranked.sort_by(|(ta, a), (tb, b)| {
            b.score_or_zero()
                .total_cmp(&a.score_or_zero())
                .then_with(|| b.net_deleted().cmp(&a.net_deleted()))
                .then_with(|| ta.cmp(tb))
        });
        ranked.truncate(k);
        ranked
    }
}

impl AddAssign<StatsStore> for StatsStore {
    fn add_assign(&mut self, other: StatsStore) {
        self.merge(other);
    }
}

fn merge_records(into: &mut HashMap<Tree, StatRecord>, from: HashMap<Tree, StatRecord>) {
    for (tree, record) in from {
        *into.entry(tree).or_default() += &record;
    }
}

fn absorb_into(records: &mut HashMap<Tree, StatRecord>, dst: &Tree, src: &Tree) {
    let Some(source) = records.get(src) else {
        return;
    };
    let (added, deleted) = (source.added, source.deleted);
    records
        .entry(dst.clone())
        .or_default()
        .absorb(added, deleted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::{Field, Label};

    fn leaf(kind: &str) -> Tree {
        Tree::leaf(kind, "")
    }

    #[test]
    fn test_record_counts_and_first_text_wins() {
        let mut store = StatsStore::new();
        store.record("repo", leaf("a"), "first", Direction::Deleted);
        store.record("repo", leaf("a"), "second", Direction::Added);
        store.record("other", leaf("a"), "third", Direction::Deleted);

        let totals = store.get(&leaf("a")).unwrap();
        assert_eq!((totals.added, totals.deleted), (1, 2));
        assert_eq!(store.text(&leaf("a")), Some("first"));
        assert_eq!(store.per_repo()["repo"][&leaf("a")].added, 1);
        assert_eq!(store.per_repo()["other"][&leaf("a")].deleted, 1);
        assert_eq!(store.repositories_of(&leaf("a")).count(), 2);
    }

    #[test]
    fn test_merge_sums_counters() {
        let mut a = StatsStore::new();
        a.record("r1", leaf("x"), "x1", Direction::Deleted);
        let mut b = StatsStore::new();
        b.record("r2", leaf("x"), "x2", Direction::Deleted);
        b.record("r2", leaf("y"), "y", Direction::Added);

        a += b;
        assert_eq!(a.get(&leaf("x")).unwrap().deleted, 2);
        assert_eq!(a.get(&leaf("y")).unwrap().added, 1);
        assert_eq!(a.text(&leaf("x")), Some("x1"));
        assert_eq!(a.repository_count(), 2);
    }

    #[test]
    fn test_generalize_folds_counts() {
        let wildcard = Tree::new(
            Label {
                kind: Field::Wildcard,
                token: Field::from(""),
            },
            Vec::new(),
        );
        let mut store = StatsStore::new();
        store.record("r1", leaf("a"), "a()", Direction::Deleted);
        store.record("r1", leaf("a"), "a()", Direction::Deleted);
        store.record("r2", leaf("b"), "b()", Direction::Added);

        store.generalize(&wildcard, &leaf("a"));
        store.generalize(&wildcard, &leaf("b"));

        let merged = store.get(&wildcard).unwrap();
        assert_eq!((merged.added, merged.deleted), (1, 2));
        assert_eq!(merged.merged, 2);
        assert_eq!(merged.merged_negative, 1);
        assert_eq!(merged.merged_positive, 1);
        assert_eq!(store.text(&wildcard), Some("a()"));
        assert_eq!(store.per_repo()["r1"][&wildcard].deleted, 2);
        assert_eq!(store.per_repo()["r2"][&wildcard].added, 1);
        // constituents stay
        assert!(store.get(&leaf("a")).is_some());
    }

    #[test]
    fn test_prune_keeps_maps_consistent() {
        let mut store = StatsStore::new();
        store.record("r1", leaf("keep"), "", Direction::Deleted);
        store.record("r1", leaf("drop"), "", Direction::Deleted);
        store.record("r2", leaf("unranked"), "", Direction::Deleted);
        store.get_mut(&leaf("keep")).unwrap().score = Some(0.9);
        store.get_mut(&leaf("drop")).unwrap().score = Some(0.1);

        assert_eq!(store.prune(0.8), 2);
        assert_eq!(store.len(), 1);
        assert!(store.is_consistent());
        assert!(store.text(&leaf("drop")).is_none());
        assert!(!store.per_repo().contains_key("r2"));
    }

    #[test]
    fn test_remove_fragment_everywhere() {
        let mut store = StatsStore::new();
        store.record("r1", leaf("a"), "a", Direction::Deleted);
        store.record("r2", leaf("a"), "a", Direction::Added);
        assert!(store.remove_fragment(&leaf("a")).is_some());
        assert!(store.is_empty());
        assert!(store.repositories_of(&leaf("a")).next().is_none());
        assert!(store.text(&leaf("a")).is_none());
    }

    #[test]
    fn test_top_orders_by_score() {
        let mut store = StatsStore::new();
        for (kind, score) in [("low", 0.1), ("high", 0.9), ("mid", 0.5)] {
            store.record("r", leaf(kind), kind, Direction::Deleted);
            store.get_mut(&leaf(kind)).unwrap().score = Some(score);
        }
        let top: Vec<_> = store.top(2).into_iter().map(|(tree, _)| tree.clone()).collect();
        assert_eq!(top, vec![leaf("high"), leaf("mid")]);
    }
}
