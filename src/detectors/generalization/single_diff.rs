//! Fast merge of two same-shape fragments differing in exactly one node.

use crate::core::tree::{Label, Tree};
use crate::detectors::generalization::sequence::SequenceEncoder;

/// Merge `a` and `b` when they differ in exactly one pre-order position.
///
/// Returns `None` for identical trees, for trees of different shape and for
/// trees differing in more than one node.
pub fn try_merge_one_diff(encoder: &mut SequenceEncoder, a: &Tree, b: &Tree) -> Option<Tree> {
    let seq_a = encoder.encode(a);
    let seq_b = encoder.encode(b);
    merge_encoded(a, &seq_a, b, &seq_b)
}

/// [`try_merge_one_diff`] over sequences produced by one shared encoder.
pub fn merge_encoded(a: &Tree, seq_a: &[u32], b: &Tree, seq_b: &[u32]) -> Option<Tree> {
    if seq_a.len() != seq_b.len() {
        return None;
    }

    let mut differing = None;
    let nodes = a.preorder().zip(b.preorder());
    for (position, ((node_a, node_b), (id_a, id_b))) in
        nodes.zip(seq_a.iter().zip(seq_b.iter())).enumerate()
    {
        if node_a.children().len() != node_b.children().len() {
            return None;
        }
        if id_a == id_b {
            continue;
        }
        if differing.is_some() {
            return None;
        }
        differing = Some((position, node_a.label().generalize(node_b.label())));
    }

    let (position, generalized) = differing?;
    let mut labels: Vec<Label> = a.preorder().map(|node| node.label().clone()).collect();
    labels[position] = generalized;
    Some(a.with_preorder_labels(&labels))
}
