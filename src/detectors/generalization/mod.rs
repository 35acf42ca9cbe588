//! Fragment generalization.
//!
//! Two fragments that are near-duplicates merge into one fragment whose
//! differing label fields are wildcards, so the merged fragment matches both.
//! The fast path ([`single_diff`]) handles same-shape fragments that differ in a
//! single node; the bounded path ([`tree_distance`]) handles small fragments
//! with up to `max_edit_distance` relabelings.

pub mod sequence;
pub mod single_diff;
pub mod tree_distance;

use crate::core::config::PostprocessConfig;
use crate::core::tree::Tree;

pub use sequence::SequenceEncoder;
pub use single_diff::{merge_encoded, try_merge_one_diff};
pub use tree_distance::{edit_script, try_merge_bounded, EditOp};

/// A fragment prepared for pairwise merging.
#[derive(Debug, Clone)]
pub struct EncodedFragment {
    /// The fragment
    pub tree: Tree,
    /// Its pre-order label ids
    pub sequence: Vec<u32>,
}

/// Pairwise merge policy.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    /// Budget of the bounded path (0 disables it)
    pub max_edit_distance: u32,
    /// Largest fragment tried on the bounded path
    pub bounded_max_size: usize,
}

impl MergePolicy {
    /// Policy from postprocessing settings
    pub fn from_config(config: &PostprocessConfig) -> Self {
        Self {
            max_edit_distance: config.max_edit_distance,
            bounded_max_size: config.bounded_merge_max_size,
        }
    }

    /// Try the fast path, then the bounded path for small same-size fragments.
    pub fn try_merge(&self, a: &EncodedFragment, b: &EncodedFragment) -> Option<Tree> {
        if a.sequence.len() != b.sequence.len() {
            return None;
        }
        if let Some(merged) = merge_encoded(&a.tree, &a.sequence, &b.tree, &b.sequence) {
            return Some(merged);
        }
        if self.max_edit_distance < 2 || a.tree.size() > self.bounded_max_size {
            // A budget below 2 cannot relabel more than the fast path already did.
            return None;
        }
        try_merge_bounded(&a.tree, &b.tree, self.max_edit_distance)
    }
}

/// Encode fragments with one shared vocabulary.
pub fn encode_all(trees: Vec<Tree>) -> Vec<EncodedFragment> {
    let mut encoder = SequenceEncoder::new();
    trees
        .into_iter()
        .map(|tree| {
            let sequence = encoder.encode(&tree);
            EncodedFragment { tree, sequence }
        })
        .collect()
}
