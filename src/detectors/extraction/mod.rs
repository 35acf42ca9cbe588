//! Relevance and fragment extraction.
//!
//! Given a parsed file and the set of lines touched by a change, the extractor
//! enumerates every subtree within the configured depth and size bounds that
//! overlaps the change. Each physical node is reported at most once, even when
//! several of its descendants' ancestor chains reach it.

pub mod arena;


use std::collections::HashSet;

use tracing::trace;

use crate::core::config::ExtractionConfig;
use crate::core::tree::Tree;
use crate::lang::common::{Span, SyntaxNode};

pub use arena::{ExtractionArena, LineSet, NodeId, PathEntry};

/// A canonical fragment together with its source exemplar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Position-free tree used as the statistics key
    pub tree: Tree,
    /// Source lines covered by the fragment
    pub text: String,
    /// Lines covered by the fragment in the parsed file
    pub span: Span,
}

/// Bounded subtree extractor.
#[derive(Debug, Clone)]
pub struct FragmentExtractor {
    min_depth: usize,
    max_depth: usize,
    min_size: usize,
    max_size: usize,
    position_kind: String,
}

impl FragmentExtractor {
    /// Create an extractor from configured bounds
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_depth: config.min_depth,
            max_depth: config.max_depth,
            min_size: config.min_size,
            max_size: config.max_size,
            position_kind: config.position_kind.clone(),
        }
    }

    /// Handles of every subtree that qualifies for extraction.
    ///
    /// Walks each leaf's ancestor chain upward. The relevance flag starts at
    /// the leaf and accumulates each ancestor's own relevance; climbing stops
    /// at the first ancestor deeper or larger than the bounds.
    pub fn select(&self, arena: &ExtractionArena<'_>) -> Vec<NodeId> {
        let mut emitted: HashSet<NodeId> = HashSet::new();
        let mut selected = Vec::new();

        for leaf in arena.leaves() {
            let entry = arena.get(leaf);
            if entry.size > self.max_size {
                continue;
            }

            let mut relevant = entry.relevant;
            if relevant && self.within_minimums(entry) && emitted.insert(leaf) {
                selected.push(leaf);
            }

            for (level, (id, ancestor)) in (2..=self.max_depth).zip(arena.ancestors(leaf)) {
                debug_assert!(ancestor.depth >= level);
                if ancestor.depth > self.max_depth || ancestor.size > self.max_size {
                    break;
                }
                relevant |= ancestor.relevant;
                if !self.within_minimums(ancestor) {
                    continue;
                }
                if relevant && emitted.insert(id) {
                    selected.push(id);
                }
            }
        }

        selected
    }

    fn within_minimums(&self, entry: &PathEntry<'_>) -> bool {
        entry.size >= self.min_size && entry.depth >= self.min_depth
    }

    /// Canonical trees of every qualifying subtree.
    pub fn extract_fragments(&self, root: &SyntaxNode, lines: &LineSet) -> Vec<Tree> {
        let arena = ExtractionArena::build(root, lines, &self.position_kind);
        self.select(&arena)
            .into_iter()
            .filter_map(|id| arena.get(id).node.to_tree(&self.position_kind))
            .collect()
    }

    /// Qualifying subtrees with their source text.
    pub fn extract(&self, root: &SyntaxNode, lines: &LineSet, source: &str) -> Vec<Fragment> {
        if lines.is_empty() {
            return Vec::new();
        }

        let arena = ExtractionArena::build(root, lines, &self.position_kind);
        let source_lines: Vec<&str> = source.split('\n').collect();
        let fragments: Vec<Fragment> = self
            .select(&arena)
            .into_iter()
            .filter_map(|id| {
                let entry = arena.get(id);
                let tree = entry.node.to_tree(&self.position_kind)?;
                Some(Fragment {
                    tree,
                    text: snippet_text(&source_lines, entry.covering),
                    span: entry.covering,
                })
            })
            .collect();

        trace!(
            "Extracted {} fragments from {} nodes for {} lines",
            fragments.len(),
            arena.len(),
            lines.len()
        );
        fragments
    }
}

/// Source lines `span.start_line..=span.end_line`, joined with newlines.
pub fn snippet_text(source_lines: &[&str], span: Span) -> String {
    if !span.is_set() || span.start_line > span.end_line {
        return String::new();
    }
    let start = span.start_line as usize - 1;
    let end = (span.end_line as usize).min(source_lines.len());
    if start >= end {
        return String::new();
    }
    source_lines[start..end].join("\n")
}
