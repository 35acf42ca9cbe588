//! Percentile ranking of a scored population.
//!
//! A score maps to the fraction of the population strictly below it, so the
//! minimum scores at 0 and ties share a percentile.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Converts raw scores into percentile ranks.
pub struct Ranker<K, F> {
    scoring: F,
    scores: HashMap<K, f64>,
    sorted: Vec<f64>,
}

impl<K, F> Ranker<K, F>
where
    K: Eq + Hash,
    F: Fn(&K) -> f64,
{
    /// Ranker over the given scoring function
    pub fn new(scoring: F) -> Self {
        Self {
            scoring,
            scores: HashMap::new(),
            sorted: Vec::new(),
        }
    }

    /// Evaluate and store the raw score of `element`
    pub fn add(&mut self, element: K) {
        let score = signed_zero_to_positive((self.scoring)(&element));
        self.scores.insert(element, score);
    }

    /// Number of scored elements
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether nothing was scored
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Sort the population; must run before [`Ranker::get`].
    pub fn finalize(&mut self) {
        self.sorted = self.scores.values().copied().collect();
        self.sorted.sort_by(f64::total_cmp);
    }

    /// Raw score of an element
    pub fn raw(&self, element: &K) -> Option<f64> {
        self.scores.get(element).copied()
    }

    /// Percentile of an element's score
    pub fn get(&self, element: &K) -> Option<f64> {
        let score = self.raw(element)?;
        Some(self.percentile(score))
    }

    /// Fraction of the population strictly below `score`
    pub fn percentile(&self, score: f64) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        let score = signed_zero_to_positive(score);
        let below = self
            .sorted
            .partition_point(|s| s.total_cmp(&score) == Ordering::Less);
        below as f64 / self.sorted.len() as f64
    }
}

/// `total_cmp` orders `-0.0` below `0.0`; both must rank as one value.
fn signed_zero_to_positive(score: f64) -> f64 {
    if score == 0.0 {
        0.0
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_percentiles_with_ties() {
        let scores = [3.0, 1.0, 2.0, 2.0];
        let mut ranker = Ranker::new(|i: &usize| scores[*i]);
        for i in 0..scores.len() {
            ranker.add(i);
        }
        ranker.finalize();

        assert_relative_eq!(ranker.get(&1).unwrap(), 0.0);
        assert_relative_eq!(ranker.get(&2).unwrap(), 0.25);
        assert_relative_eq!(ranker.get(&3).unwrap(), 0.25);
        assert_relative_eq!(ranker.get(&0).unwrap(), 0.75);
        assert!(ranker.get(&9).is_none());
    }

    #[test]
    fn test_signed_zeros_tie() {
        let scores = [-0.0, 0.0, 1.0, -1.0];
        let mut ranker = Ranker::new(|i: &usize| scores[*i]);
        for i in 0..scores.len() {
            ranker.add(i);
        }
        ranker.finalize();

        assert_relative_eq!(ranker.get(&0).unwrap(), 0.25);
        assert_relative_eq!(ranker.get(&1).unwrap(), 0.25);
        assert_relative_eq!(ranker.percentile(-0.0), 0.25);
        assert_relative_eq!(ranker.get(&2).unwrap(), 0.75);
    }

    #[test]
    fn test_empty_ranker() {
        let mut ranker = Ranker::new(|_: &u8| 1.0);
        ranker.finalize();
        assert!(ranker.is_empty());
        assert_relative_eq!(ranker.percentile(1.0), 0.0);
    }

    proptest! {
        #[test]
        fn test_percentiles_are_monotonic(scores in prop::collection::vec(-1000.0f64..1000.0, 1..64)) {
            let mut ranker = Ranker::new(|i: &usize| scores[*i]);
            for i in 0..scores.len() {
                ranker.add(i);
            }
            ranker.finalize();

            let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
            for i in 0..scores.len() {
                let p = ranker.get(&i).unwrap();
                prop_assert!((0.0..1.0).contains(&p));
                if scores[i] == min {
                    prop_assert_eq!(p, 0.0);
                }
                for j in 0..scores.len() {
                    let q = ranker.get(&j).unwrap();
                    if scores[i] < scores[j] {
                        prop_assert!(p <= q);
                    }
                    if scores[i] == scores[j] {
                        prop_assert_eq!(p, q);
                    }
                }
            }
        }
    }
}
