//! Canonical syntax fragments.
//!
//! A [`Tree`] is an immutable ordered labeled tree. Its identity (equality,
//! hashing and ordering) depends only on the node labels and on the ordered
//! children, never on source positions, so the same snippet found on different
//! lines of different files maps to the same statistics key.
//!
//! Label fields are a tagged union: a field is either a concrete string or the
//! [`Field::Wildcard`] marker produced by generalization. Wildcards match any
//! concrete value during pattern matching.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Printed representation of a wildcard field.
pub const WILDCARD_DISPLAY: &str = "*";

/// One field of a node label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// Concrete value as reported by the parser
    Concrete(String),
    /// Matches any concrete value
    Wildcard,
}

/// Query and matching methods for [`Field`].
impl Field {
    /// Whether this field is the wildcard marker
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Field::Wildcard)
    }

    /// The concrete value, if any
    pub fn as_concrete(&self) -> Option<&str> {
        match self {
            Field::Concrete(value) => Some(value),
            Field::Wildcard => None,
        }
    }

    /// Wildcard-aware comparison: either side being a wildcard matches.
    pub fn matches(&self, other: &Field) -> bool {
        self.is_wildcard() || other.is_wildcard() || self == other
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Concrete(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Concrete(value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Concrete(value) => write!(f, "{value}"),
            Field::Wildcard => write!(f, "{WILDCARD_DISPLAY}"),
        }
    }
}

/// Node label: the parser's node kind plus its literal token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// Node kind (e.g. `call_expression`)
    pub kind: Field,
    /// Literal token, empty for interior nodes
    pub token: Field,
}

/// Construction and matching methods for [`Label`].
impl Label {
    /// Create a concrete label
    pub fn new(kind: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            kind: Field::Concrete(kind.into()),
            token: Field::Concrete(token.into()),
        }
    }

    /// Whether either field is a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.kind.is_wildcard() || self.token.is_wildcard()
    }

    /// Wildcard-aware label comparison
    pub fn matches(&self, other: &Label) -> bool {
        self.kind.matches(&other.kind) && self.token.matches(&other.token)
    }

    /// Label that matches both `self` and `other`, wildcarding differing fields.
    pub fn generalize(&self, other: &Label) -> Label {
        Label {
            kind: if self.kind == other.kind {
                self.kind.clone()
            } else {
                Field::Wildcard
            },
            token: if self.token == other.token {
                self.token.clone()
            } else {
                Field::Wildcard
            },
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type: {}, token: {}", self.kind, self.token)
    }
}

/// Immutable ordered labeled tree.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "TreeRepr", into = "TreeRepr")]
pub struct Tree {
    label: Label,
    children: Vec<Tree>,
    size: usize,
}

/// Serialized shape of a [`Tree`]; the node count is recomputed on load.
#[derive(Serialize, Deserialize)]
struct TreeRepr {
    label: Label,
    children: Vec<Tree>,
}

impl From<TreeRepr> for Tree {
    fn from(repr: TreeRepr) -> Self {
        Tree::new(repr.label, repr.children)
    }
}

impl From<Tree> for TreeRepr {
    fn from(tree: Tree) -> Self {
        TreeRepr {
            label: tree.label,
            children: tree.children,
        }
    }
}

/// Construction, traversal and matching methods for [`Tree`].
impl Tree {
    /// Create a node with the given label and children
    pub fn new(label: Label, children: Vec<Tree>) -> Self {
        let size = 1 + children.iter().map(Tree::size).sum::<usize>();
        Self {
            label,
            children,
            size,
        }
    }

    /// Create a childless node with concrete fields
    pub fn leaf(kind: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(Label::new(kind, token), Vec::new())
    }

    /// Create an interior node with concrete fields
    pub fn node(kind: impl Into<String>, token: impl Into<String>, children: Vec<Tree>) -> Self {
        Self::new(Label::new(kind, token), children)
    }

    /// The label of this node
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// The ordered children of this node
    pub fn children(&self) -> &[Tree] {
        &self.children
    }

    /// Whether this node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this tree
    pub fn size(&self) -> usize {
        self.size
    }

    /// Longest root-to-leaf path, counted in nodes
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    /// Whether any label in the tree carries a wildcard
    pub fn has_wildcards(&self) -> bool {
        self.preorder().any(|node| node.label.has_wildcard())
    }

    /// Pre-order traversal: parent first, then children left to right.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Labels in post-order: children left to right, then the parent.
    pub fn postorder_labels(&self) -> Vec<&Label> {
        let mut out = Vec::with_capacity(self.size);
        let mut stack: Vec<(&Tree, bool)> = vec![(self, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded || node.is_leaf() {
                out.push(&node.label);
                continue;
            }
            stack.push((node, true));
            stack.extend(node.children.iter().rev().map(|child| (child, false)));
        }
        out
    }

    /// Rebuild this tree with the labels at the given pre-order positions replaced.
    pub fn with_preorder_labels(&self, labels: &[Label]) -> Tree {
        debug_assert_eq!(labels.len(), self.size);
        let mut next = 0;
        self.relabel_preorder(labels, &mut next)
    }

    fn relabel_preorder(&self, labels: &[Label], next: &mut usize) -> Tree {
        let label = labels[*next].clone();
        *next += 1;
        let children = self
            .children
            .iter()
            .map(|child| child.relabel_preorder(labels, next))
            .collect();
        Tree::new(label, children)
    }

    /// Rebuild this tree with labels given in post-order.
    pub fn with_postorder_labels(&self, labels: &[Label]) -> Tree {
        debug_assert_eq!(labels.len(), self.size);
        let mut next = 0;
        self.relabel_postorder(labels, &mut next)
    }

    fn relabel_postorder(&self, labels: &[Label], next: &mut usize) -> Tree {
        let children = self
            .children
            .iter()
            .map(|child| child.relabel_postorder(labels, next))
            .collect();
        let label = labels[*next].clone();
        *next += 1;
        Tree::new(label, children)
    }

    /// Wildcard-aware structural match.
    ///
    /// Both trees must have the same shape; labels are compared field by field
    /// with wildcards on either side matching any value.
    pub fn matches(&self, other: &Tree) -> bool {
        if self.size != other.size {
            return false;
        }
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.children.len() != b.children.len() || !a.label.matches(&b.label) {
                return false;
            }
            stack.extend(a.children.iter().zip(b.children.iter()));
        }
        true
    }

    /// Indented multi-line rendering, one node per line.
    pub fn pretty_format(&self) -> String {
        let mut lines = Vec::with_capacity(self.size);
        let mut stack = vec![(self, 0usize)];
        while let Some((node, indent)) = stack.pop() {
            lines.push(format!("{}{}", ". ".repeat(indent), node.label));
            stack.extend(node.children.iter().rev().map(|child| (child, indent + 1)));
        }
        lines.join("\n")
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.label == other.label && self.children == other.children
    }
}

impl Eq for Tree {}

impl Hash for Tree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label.hash(state);
        self.children.hash(state);
    }
}

impl PartialOrd for Tree {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tree {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label
            .cmp(&other.label)
            .then_with(|| self.children.cmp(&other.children))
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("label", &self.label)
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.label.kind, self.label.token)?;
        for child in &self.children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}

/// Pre-order iterator over the nodes of a [`Tree`].
pub struct Preorder<'a> {
    stack: Vec<&'a Tree>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Tree;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(tree: &Tree) -> u64 {
        let mut hasher = DefaultHasher::new();
        tree.hash(&mut hasher);
        hasher.finish()
    }

    fn sample() -> Tree {
        Tree::node(
            "A",
            "a",
            vec![
                Tree::leaf("A1", "a1"),
                Tree::node("A2", "a2", vec![Tree::leaf("A21", "a21")]),
            ],
        )
    }

    #[test]
    fn test_tree_eq_hash() {
        let a = Tree::leaf("1", "");
        let b = Tree::leaf("1", "");
        let c = Tree::leaf("2", "");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
        assert_ne!(hash_of(&a), hash_of(&c));

        let a = Tree::node("1", "", vec![Tree::leaf("2", "")]);
        let b = Tree::node("1", "", vec![Tree::leaf("2", "")]);
        let c = Tree::node("2", "", vec![Tree::leaf("2", "")]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_children_order_and_arity_matter() {
        let ab = Tree::node("p", "", vec![Tree::leaf("a", ""), Tree::leaf("b", "")]);
        let ba = Tree::node("p", "", vec![Tree::leaf("b", ""), Tree::leaf("a", "")]);
        let a = Tree::node("p", "", vec![Tree::leaf("a", "")]);
        assert_ne!(ab, ba);
        assert_ne!(ab, a);
    }

    #[test]
    fn test_size_and_depth() {
        let tree = sample();
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.depth(), 3);
        assert_eq!(Tree::leaf("x", "y").size(), 1);
        assert_eq!(Tree::leaf("x", "y").depth(), 1);
    }

    #[test]
    fn test_preorder_is_parent_first_left_to_right() {
        let kinds: Vec<String> = sample()
            .preorder()
            .map(|node| node.label().kind.to_string())
            .collect();
        assert_eq!(kinds, vec!["A", "A1", "A2", "A21"]);
    }

    #[test]
    fn test_postorder_labels() {
        let tree = sample();
        let kinds: Vec<String> = tree
            .postorder_labels()
            .iter()
            .map(|label| label.kind.to_string())
            .collect();
        assert_eq!(kinds, vec!["A1", "A21", "A2", "A"]);
    }

    #[test]
    fn test_relabel_round_trips_shape() {
        let tree = sample();
        let labels: Vec<Label> = tree.postorder_labels().into_iter().cloned().collect();
        assert_eq!(tree.with_postorder_labels(&labels), tree);

        let labels: Vec<Label> = tree.preorder().map(|n| n.label().clone()).collect();
        assert_eq!(tree.with_preorder_labels(&labels), tree);
    }

    #[test]
    fn test_wildcard_matching() {
        let pattern = Tree::new(
            Label {
                kind: Field::from("call"),
                token: Field::Wildcard,
            },
            vec![Tree::leaf("ident", "x")],
        );
        let concrete = Tree::node("call", "foo", vec![Tree::leaf("ident", "x")]);
        let other_child = Tree::node("call", "foo", vec![Tree::leaf("ident", "y")]);
        assert!(pattern.matches(&concrete));
        assert!(!pattern.matches(&other_child));
        assert!(!pattern.matches(&Tree::leaf("call", "foo")));
        assert_ne!(pattern, concrete);
        assert!(pattern.has_wildcards());
        assert!(!concrete.has_wildcards());
    }

    #[test]
    fn test_serde_recomputes_size() {
        let tree = sample();
        let bytes = bincode::serialize(&tree).unwrap();
        let decoded: Tree = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(decoded.size(), 4);
    }

    #[test]
    fn test_pretty_format() {
        let rendered = sample().pretty_format();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "type: A, token: a");
        assert_eq!(lines[3], ". . type: A21, token: a21");
    }
}
