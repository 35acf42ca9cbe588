//! Zhang–Shasha tree edit distance with an edit script.
//!
//! Nodes are numbered in post-order. Structural edits cost
//! [`STRUCTURAL_EDIT_COST`], far above any distance budget, so within a small
//! budget only relabelings survive.

use crate::core::tree::{Label, Tree};

/// Cost of inserting or removing a node.
pub const STRUCTURAL_EDIT_COST: u32 = 1000;

/// One step of an optimal edit script, by post-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Remove node `a` of the first tree
    Remove(usize),
    /// Insert node `b` of the second tree
    Insert(usize),
    /// Relabel node `a` to node `b`
    Update(usize, usize),
    /// Nodes `a` and `b` carry the same label
    Match(usize, usize),
}

/// Relabel cost: 0 for equal labels, 1 if only the token differs, 2 if the kind differs.
pub fn update_cost(a: &Label, b: &Label) -> u32 {
    if a.kind != b.kind {
        2
    } else if a.token != b.token {
        1
    } else {
        0
    }
}

struct Annotated<'t> {
    labels: Vec<&'t Label>,
    /// Leftmost leaf descendant of each node
    lmd: Vec<usize>,
    keyroots: Vec<usize>,
}

impl<'t> Annotated<'t> {
    fn new(tree: &'t Tree) -> Self {
        let mut labels = Vec::with_capacity(tree.size());
        let mut lmd = Vec::with_capacity(tree.size());
        // (node, expanded, leftmost leaf of first child once known)
        let mut stack: Vec<(&Tree, bool)> = vec![(tree, false)];
        let mut pending_lmd: Vec<Option<usize>> = Vec::new();
        while let Some((node, expanded)) = stack.pop() {
            if !expanded && !node.is_leaf() {
                stack.push((node, true));
                pending_lmd.push(None);
                stack.extend(node.children().iter().rev().map(|child| (child, false)));
                continue;
            }

            let index = labels.len();
            let leftmost = if node.is_leaf() {
                index
            } else {
                pending_lmd.pop().flatten().unwrap_or(index)
            };
            labels.push(node.label());
            lmd.push(leftmost);
            if let Some(slot) = pending_lmd.last_mut() {
                // The first finished child of an open parent fixes its leftmost leaf.
                slot.get_or_insert(leftmost);
            }
        }

        let mut keyroots = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for index in (0..labels.len()).rev() {
            if seen.insert(lmd[index]) {
                keyroots.push(index);
            }
        }
        keyroots.sort_unstable();

        Self {
            labels,
            lmd,
            keyroots,
        }
    }
}

/// Minimum edit cost between `a` and `b` and one optimal edit script.
pub fn edit_script(a: &Tree, b: &Tree) -> (u32, Vec<EditOp>) {
    let ta = Annotated::new(a);
    let tb = Annotated::new(b);
    let (na, nb) = (ta.labels.len(), tb.labels.len());

    let mut treedists = vec![vec![0u32; nb]; na];
    let mut operations: Vec<Vec<Vec<EditOp>>> = vec![vec![Vec::new(); nb]; na];

    for &i in &ta.keyroots {
        for &j in &tb.keyroots {
            forest_distance(&ta, &tb, i, j, &mut treedists, &mut operations);
        }
    }

    let script = std::mem::take(&mut operations[na - 1][nb - 1]);
    (treedists[na - 1][nb - 1], script)
}

fn forest_distance(
    ta: &Annotated<'_>,
    tb: &Annotated<'_>,
    i: usize,
    j: usize,
    treedists: &mut [Vec<u32>],
    operations: &mut [Vec<Vec<EditOp>>],
) {
    let (li, lj) = (ta.lmd[i], tb.lmd[j]);
    let m = i - li + 2;
    let n = j - lj + 2;

    let mut fd = vec![vec![0u32; n]; m];
    let mut ops: Vec<Vec<Vec<EditOp>>> = vec![vec![Vec::new(); n]; m];

    for x in 1..m {
        fd[x][0] = fd[x - 1][0] + STRUCTURAL_EDIT_COST;
        let mut script = ops[x - 1][0].clone();
        script.push(EditOp::Remove(li + x - 1));
        ops[x][0] = script;
    }
    for y in 1..n {
        fd[0][y] = fd[0][y - 1] + STRUCTURAL_EDIT_COST;
        let mut script = ops[0][y - 1].clone();
        script.push(EditOp::Insert(lj + y - 1));
        ops[0][y] = script;
    }

    for x in 1..m {
        let node_a = li + x - 1;
        for y in 1..n {
            let node_b = lj + y - 1;
            let remove = fd[x - 1][y] + STRUCTURAL_EDIT_COST;
            let insert = fd[x][y - 1] + STRUCTURAL_EDIT_COST;

            if ta.lmd[node_a] == li && tb.lmd[node_b] == lj {
                let cost = update_cost(ta.labels[node_a], tb.labels[node_b]);
                let update = fd[x - 1][y - 1] + cost;
                let (best, mut script, op) = if remove <= insert && remove <= update {
                    (remove, ops[x - 1][y].clone(), EditOp::Remove(node_a))
                } else if insert <= update {
                    (insert, ops[x][y - 1].clone(), EditOp::Insert(node_b))
                } else if cost == 0 {
                    (update, ops[x - 1][y - 1].clone(), EditOp::Match(node_a, node_b))
                } else {
                    (update, ops[x - 1][y - 1].clone(), EditOp::Update(node_a, node_b))
                };
                script.push(op);
                fd[x][y] = best;
                treedists[node_a][node_b] = best;
                operations[node_a][node_b] = script.clone();
                ops[x][y] = script;
            } else {
                let p = ta.lmd[node_a] - li;
                let q = tb.lmd[node_b] - lj;
                let subtree = fd[p][q] + treedists[node_a][node_b];
                if remove <= insert && remove <= subtree {
                    let mut script = ops[x - 1][y].clone();
                    script.push(EditOp::Remove(node_a));
                    fd[x][y] = remove;
                    ops[x][y] = script;
                } else if insert <= subtree {
                    let mut script = ops[x][y - 1].clone();
                    script.push(EditOp::Insert(node_b));
                    fd[x][y] = insert;
                    ops[x][y] = script;
                } else {
                    let mut script = ops[p][q].clone();
                    script.extend_from_slice(&operations[node_a][node_b]);
                    fd[x][y] = subtree;
                    ops[x][y] = script;
                }
            }
        }
    }
}

/// Tree edit distance under the asymmetric cost model.
pub fn distance(a: &Tree, b: &Tree) -> u32 {
    edit_script(a, b).0
}

/// Merge `a` and `b` when their edit distance is at most `max_dist` and the
/// optimal script only relabels nodes.
///
/// Every relabeled node of `a` gets wildcards on the fields that differ.
/// Identical trees return `None`.
pub fn try_merge_bounded(a: &Tree, b: &Tree, max_dist: u32) -> Option<Tree> {
    if a.size() != b.size() {
        return None;
    }

    let (cost, script) = edit_script(a, b);
    if cost == 0 || cost > max_dist {
        return None;
    }

    let b_labels = b.postorder_labels();
    let mut labels: Vec<Label> = a.postorder_labels().into_iter().cloned().collect();
    for op in script {
        match op {
            EditOp::Update(ia, ib) => labels[ia] = labels[ia].generalize(b_labels[ib]),
            EditOp::Match(..) => {}
            EditOp::Insert(_) | EditOp::Remove(_) => return None,
        }
    }
    Some(a.with_postorder_labels(&labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::Field;

    fn call(name: &str, arg: &str) -> Tree {
        Tree::node(
            "call",
            "",
            vec![Tree::leaf("ident", name), Tree::leaf("lit", arg)],
        )
    }

    #[test]
    fn test_identical_distance_is_zero() {
        let tree = call("foo", "1");
        assert_eq!(distance(&tree, &tree), 0);
        assert!(try_merge_bounded(&tree, &tree, 2).is_none());
    }

    #[test]
    fn test_update_costs() {
        assert_eq!(distance(&call("foo", "1"), &call("bar", "1")), 1);
        assert_eq!(distance(&call("foo", "1"), &call("bar", "2")), 2);
        assert_eq!(distance(&Tree::leaf("A", "a"), &Tree::leaf("B", "a")), 2);
    }

    #[test]
    fn test_structural_edits_are_expensive() {
        let small = Tree::node("call", "", vec![Tree::leaf("ident", "foo")]);
        assert_eq!(distance(&small, &call("foo", "1")), STRUCTURAL_EDIT_COST);
    }

    #[test]
    fn test_keyroots_and_leftmost_leaves() {
        // post-order: a(0) b(1) c(2) p(3)   with c the parent of b
        let tree = Tree::node(
            "p",
            "",
            vec![Tree::leaf("a", ""), Tree::node("c", "", vec![Tree::leaf("b", "")])],
        );
        let annotated = Annotated::new(&tree);
        assert_eq!(annotated.lmd, vec![0, 1, 1, 0]);
        assert_eq!(annotated.keyroots, vec![2, 3]);
    }

    #[test]
    fn test_bounded_merge_wildcards_two_nodes() {
        let merged = try_merge_bounded(&call("foo", "1"), &call("bar", "2"), 2).expect("merge");
        assert_eq!(merged.children()[0].label().token, Field::Wildcard);
        assert_eq!(merged.children()[1].label().token, Field::Wildcard);
        assert_eq!(merged.children()[0].label().kind, Field::from("ident"));
        assert!(merged.matches(&call("baz", "3")));
    }

    #[test]
    fn test_bounded_merge_respects_budget() {
        assert!(try_merge_bounded(&call("foo", "1"), &call("bar", "2"), 1).is_none());
        let other = Tree::node("call", "", vec![Tree::leaf("lit", "1"), Tree::leaf("ident", "foo")]);
        assert!(try_merge_bounded(&call("foo", "1"), &other, 2).is_none());
    }

    #[test]
    fn test_different_shapes_never_merge() {
        let chain = Tree::node("p", "", vec![Tree::node("q", "", vec![Tree::leaf("r", "")])]);
        let fan = Tree::node("p", "", vec![Tree::leaf("q", ""), Tree::leaf("r", "")]);
        assert!(try_merge_bounded(&chain, &fan, 10).is_none());
    }
}
