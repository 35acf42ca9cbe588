//! Per-run arena of extraction paths.
//!
//! Every node of a parsed tree gets a stable [`NodeId`] handle. Deduplication
//! during extraction is keyed on that handle, so two textually identical
//! subtrees on different lines stay distinct until they are canonicalized.

use std::collections::BTreeSet;

use crate::lang::common::{Span, SyntaxNode};

/// Handle of one node inside an [`ExtractionArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in pre-order
    pub fn index(self) -> usize {
        self.0
    }
}

/// Set of changed line numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSet(BTreeSet<u32>);

impl LineSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the set contains `line`
    pub fn contains(&self, line: u32) -> bool {
        self.0.contains(&line)
    }

    /// Add a line
    pub fn insert(&mut self, line: u32) -> bool {
        self.0.insert(line)
    }

    /// Lines in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Whether a node with this span touches any line in the set.
    ///
    /// True when either end of the span is in the set, or when both ends are
    /// set and some line falls inside `start..=end`.
    pub fn is_relevant(&self, span: Span) -> bool {
        let Span {
            start_line,
            end_line,
        } = span;
        if self.0.contains(&start_line) || self.0.contains(&end_line) {
            return true;
        }
        span.is_set() && start_line <= end_line && self.0.range(start_line..=end_line).next().is_some()
    }
}

impl FromIterator<u32> for LineSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<u32> for LineSet {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Extraction path of one node: its ancestry plus memoized subtree facts.
#[derive(Debug)]
pub struct PathEntry<'a> {
    /// Parsed node
    pub node: &'a SyntaxNode,
    /// Enclosing node, `None` for the root
    pub parent: Option<NodeId>,
    /// Child handles, left to right
    pub children: Vec<NodeId>,
    /// 1 for a leaf, else 1 + deepest child
    pub depth: usize,
    /// Node count of the subtree
    pub size: usize,
    /// Whether the node's own span touches the line set
    pub relevant: bool,
    /// Whether the node or any descendant touches the line set
    pub relevant_tree: bool,
    /// Min/max over the node's and descendants' set positions
    pub covering: Span,
}

impl PathEntry<'_> {
    /// Whether the node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// All extraction paths of one parsed tree, indexed by [`NodeId`].
#[derive(Debug)]
pub struct ExtractionArena<'a> {
    entries: Vec<PathEntry<'a>>,
}

impl<'a> ExtractionArena<'a> {
    /// Build paths for every node below `root`, skipping position-only nodes.
    pub fn build(root: &'a SyntaxNode, lines: &LineSet, position_kind: &str) -> Self {
        let mut entries: Vec<PathEntry<'a>> = Vec::new();
        if root.kind == position_kind {
            return Self { entries };
        }

        let mut stack: Vec<(&'a SyntaxNode, Option<NodeId>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let id = NodeId(entries.len());
            entries.push(PathEntry {
                node,
                parent,
                children: Vec::with_capacity(node.children.len()),
                depth: 1,
                size: 1,
                relevant: lines.is_relevant(node.span),
                relevant_tree: false,
                covering: node.span,
            });
            if let Some(parent) = parent {
                entries[parent.0].children.push(id);
            }
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .filter(|child| child.kind != position_kind)
                    .map(|child| (child, Some(id))),
            );
        }

        // Pre-order puts children after their parent; fold back to front.
        for index in (0..entries.len()).rev() {
            let (head, tail) = entries.split_at_mut(index + 1);
            let entry = &mut head[index];
            let mut depth = 0;
            let mut size = 1;
            let mut relevant_tree = entry.relevant;
            let mut covering = own_covering(entry.node.span);
            for child in &entry.children {
                let child = &tail[child.0 - index - 1];
                depth = depth.max(child.depth);
                size += child.size;
                relevant_tree |= child.relevant_tree;
                covering = widen(covering, child.covering);
            }
            entry.depth = depth + 1;
            entry.size = size;
            entry.relevant_tree = relevant_tree;
            entry.covering = covering.unwrap_or_default();
        }

        Self { entries }
    }

    /// Number of nodes in the arena
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry of one node
    pub fn get(&self, id: NodeId) -> &PathEntry<'a> {
        &self.entries[id.0]
    }

    /// Handle of the root node
    pub fn root(&self) -> Option<NodeId> {
        (!self.entries.is_empty()).then_some(NodeId(0))
    }

    /// Leaf handles in pre-order
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_leaf())
            .map(|(index, _)| NodeId(index))
    }

    /// Ancestor handles, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, 'a> {
        Ancestors {
            arena: self,
            next: self.entries[id.0].parent,
        }
    }
}

/// Iterator over the ancestor chain of a node.
pub struct Ancestors<'r, 'a> {
    arena: &'r ExtractionArena<'a>,
    next: Option<NodeId>,
}

impl<'r, 'a> Iterator for Ancestors<'r, 'a> {
    type Item = (NodeId, &'r PathEntry<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let entry = self.arena.get(id);
        self.next = entry.parent;
        Some((id, entry))
    }
}

fn own_covering(span: Span) -> Option<Span> {
    match (span.start_line, span.end_line) {
        (0, 0) => None,
        (0, end) => Some(Span::new(end, end)),
        (start, 0) => Some(Span::new(start, start)),
        (start, end) => Some(Span::new(start.min(end), start.max(end))),
    }
}

fn widen(current: Option<Span>, child: Span) -> Option<Span> {
    let Some(child) = own_covering(child) else {
        return current;
    };
    Some(match current {
        None => child,
        Some(span) => Span::new(
            span.start_line.min(child.start_line),
            span.end_line.max(child.end_line),
        ),
    })
}
