use std::collections::HashMap;

use badcode_rs::core::stats::{Direction, StatRecord, StatsStore};
use badcode_rs::Tree;
use proptest::prelude::*;

const REPOS: [&str; 3] = ["acme/app", "acme/lib", "globex/api"];

fn tree_pool() -> Vec<Tree> {
    vec![
        Tree::leaf("identifier", "err"),
        Tree::node("call_expression", "", vec![Tree::leaf("identifier", "panic")]),
        Tree::node("call_expression", "", vec![Tree::leaf("identifier", "log")]),
        Tree::node(
            "if_statement",
            "",
            vec![
                Tree::leaf("identifier", "err"),
                Tree::node("block", "", Vec::new()),
            ],
        ),
        Tree::node("return_statement", "", vec![Tree::leaf("nil", "nil")]),
    ]
}

type Event = (usize, usize, bool);

fn events() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec((0..REPOS.len(), 0..5usize, any::<bool>()), 0..40)
}

fn build(events: &[Event]) -> StatsStore {
    let pool = tree_pool();
    let mut store = StatsStore::new();
    for &(repo, tree, deleted) in events {
        let direction = if deleted {
            Direction::Deleted
        } else {
            Direction::Added
        };
        let tree = &pool[tree];
        store.record(REPOS[repo], tree.clone(), &tree.to_string(), direction);
    }
    store
}

fn counts(store: &StatsStore) -> HashMap<Tree, (u64, u64)> {
    store
        .totals()
        .iter()
        .map(|(tree, record)| (tree.clone(), (record.added, record.deleted)))
        .collect()
}

fn repo_counts(store: &StatsStore) -> Vec<(String, HashMap<Tree, StatRecord>)> {
    store
        .per_repo()
        .iter()
        .map(|(repo, records)| (repo.clone(), records.clone()))
        .collect()
}

proptest! {
    #[test]
    fn reduce_is_associative(a in events(), b in events(), c in events()) {
        let left = StatsStore::reduce([StatsStore::reduce([build(&a), build(&b)]), build(&c)]);
        let right = StatsStore::reduce([build(&a), StatsStore::reduce([build(&b), build(&c)])]);
        prop_assert_eq!(counts(&left), counts(&right));
        prop_assert_eq!(repo_counts(&left), repo_counts(&right));
    }

    #[test]
    fn reduce_is_commutative(a in events(), b in events()) {
        let ab = StatsStore::reduce([build(&a), build(&b)]);
        let ba = StatsStore::reduce([build(&b), build(&a)]);
        prop_assert_eq!(counts(&ab), counts(&ba));
        prop_assert_eq!(repo_counts(&ab), repo_counts(&ba));
    }

    #[test]
    fn per_repo_counts_sum_to_totals(a in events(), b in events()) {
        let store = StatsStore::reduce([build(&a), build(&b)]);
        for (tree, record) in store.totals() {
            let (added, deleted) = store
                .repositories_of(tree)
                .fold((0, 0), |(added, deleted), (_, r)| (added + r.added, deleted + r.deleted));
            prop_assert_eq!((added, deleted), (record.added, record.deleted));
        }
    }

    #[test]
    fn prune_keeps_repositories_consistent(
        a in events(),
        scores in prop::collection::vec(prop::option::of(0.0f64..1.0), 5),
        min_score in 0.0f64..1.0,
    ) {
        let mut store = build(&a);
        for (tree, score) in tree_pool().iter().zip(scores) {
            if let Some(record) = store.get_mut(tree) {
                record.score = score;
            }
        }

        store.prune(min_score);

        prop_assert!(store.is_consistent());
        for record in store.totals().values() {
            prop_assert!(record.score_or_zero() >= min_score);
        }
        for (tree, _) in store.totals() {
            prop_assert!(store.text(tree).is_some());
        }
        for records in store.per_repo().values() {
            prop_assert!(!records.is_empty());
        }
    }
}
