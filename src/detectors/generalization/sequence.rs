//! Pre-order label sequences with a shared vocabulary.

use std::collections::HashMap;

use crate::core::tree::{Label, Tree};

/// Maps labels to integer ids, assigning ids on first sight starting at 1.
#[derive(Debug, Default, Clone)]
pub struct SequenceEncoder {
    vocabulary: HashMap<Label, u32>,
}

impl SequenceEncoder {
    /// Encoder with an empty vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct labels seen so far
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Id of a label, allocating the next one if unseen
    pub fn id(&mut self, label: &Label) -> u32 {
        if let Some(id) = self.vocabulary.get(label) {
            return *id;
        }
        let id = self.vocabulary.len() as u32 + 1;
        self.vocabulary.insert(label.clone(), id);
        id
    }

    /// Pre-order list of label ids, one per node
    pub fn encode(&mut self, tree: &Tree) -> Vec<u32> {
        tree.preorder().map(|node| self.id(node.label())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ids_start_at_one_and_are_stable() {
        let mut encoder = SequenceEncoder::new();
        let tree = Tree::node(
            "call",
            "",
            vec![Tree::leaf("ident", "foo"), Tree::leaf("ident", "foo")],
        );
        assert_eq!(encoder.encode(&tree), vec![1, 2, 2]);
        assert_eq!(encoder.encode(&Tree::leaf("ident", "bar")), vec![3]);
        assert_eq!(encoder.encode(&tree), vec![1, 2, 2]);
        assert_eq!(encoder.vocabulary_size(), 3);
    }

    fn arb_tree() -> impl Strategy<Value = Tree> {
        let leaf = (0u8..3, 0u8..3).prop_map(|(k, t)| Tree::leaf(format!("k{k}"), format!("t{t}")));
        leaf.prop_recursive(4, 32, 3, |inner| {
            (0u8..3, prop::collection::vec(inner, 1..4))
                .prop_map(|(k, children)| Tree::node(format!("k{k}"), "", children))
        })
    }

    proptest! {
        #[test]
        fn encoded_length_is_tree_size(tree in arb_tree()) {
            let mut encoder = SequenceEncoder::new();
            prop_assert_eq!(encoder.encode(&tree).len(), tree.size());
        }
    }
}
