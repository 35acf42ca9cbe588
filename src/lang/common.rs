//! Parse-service boundary.
//!
//! A parse service turns file contents into a [`SyntaxNode`] tree: typed,
//! ordered, labeled nodes that carry 1-based line spans. Spans are only used
//! while extracting fragments; canonical [`Tree`]s never carry them.

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::tree::{Label, Tree};

/// Inclusive 1-based line range of a node. Zero means "unset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// First line covered by the node
    pub start_line: u32,
    /// Last line covered by the node
    pub end_line: u32,
}

impl Span {
    /// Create a span covering `start_line..=end_line`
    pub const fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// Whether both ends are set
    pub fn is_set(&self) -> bool {
        self.start_line >= 1 && self.end_line >= 1
    }
}

/// One node of a parsed source tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxNode {
    /// Node kind as reported by the grammar
    pub kind: String,
    /// Literal token (empty for interior nodes)
    pub token: String,
    /// Source position of this node alone
    pub span: Span,
    /// Ordered children
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a node
    pub fn new(
        kind: impl Into<String>,
        token: impl Into<String>,
        span: Span,
        children: Vec<SyntaxNode>,
    ) -> Self {
        Self {
            kind: kind.into(),
            token: token.into(),
            span,
            children,
        }
    }

    /// Label of this node in canonical form
    pub fn label(&self) -> Label {
        Label::new(self.kind.as_str(), self.token.as_str())
    }

    /// Number of nodes in this subtree
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Canonical tree for this subtree, dropping position-only nodes.
    ///
    /// Returns `None` when the node itself is a position node.
    pub fn to_tree(&self, position_kind: &str) -> Option<Tree> {
        if self.kind == position_kind {
            return None;
        }

        // Post-order assembly on an explicit stack
        let mut built: Vec<Vec<Tree>> = vec![Vec::new()];
        let mut stack: Vec<(&SyntaxNode, bool)> = vec![(self, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                let children = built.pop().unwrap_or_default();
                let tree = Tree::new(node.label(), children);
                if let Some(parent) = built.last_mut() {
                    parent.push(tree);
                }
                continue;
            }
            stack.push((node, true));
            built.push(Vec::new());
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .filter(|child| child.kind != position_kind)
                    .map(|child| (child, false)),
            );
        }
        built.pop().and_then(|mut roots| roots.pop())
    }
}

/// Outcome reported by a parse service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseStatus {
    /// The file parsed cleanly
    Ok,
    /// The file parsed with syntax errors
    Error,
    /// The parser could not produce a tree
    Fatal,
}

/// Response of a parse request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    /// Overall status
    pub status: ParseStatus,
    /// Parsed tree, if any
    pub tree: Option<SyntaxNode>,
    /// Human-readable diagnostics
    pub errors: Vec<String>,
}

impl ParseResponse {
    /// Successful response
    pub fn ok(tree: SyntaxNode) -> Self {
        Self {
            status: ParseStatus::Ok,
            tree: Some(tree),
            errors: Vec::new(),
        }
    }

    /// Failed response with diagnostics
    pub fn failed(status: ParseStatus, errors: Vec<String>) -> Self {
        Self {
            status,
            tree: None,
            errors,
        }
    }

    /// The tree when the status is [`ParseStatus::Ok`]
    pub fn into_tree(self) -> Option<SyntaxNode> {
        match self.status {
            ParseStatus::Ok => self.tree,
            ParseStatus::Error | ParseStatus::Fatal => None,
        }
    }
}

/// Source of parsed syntax trees.
///
/// A non-`Ok` status or an `Err` means "skip this blob"; callers log and
/// continue without retrying.
pub trait ParseService: Send + Sync {
    /// Parse `content`, choosing the grammar from `filename`
    fn parse(&self, filename: &str, content: &[u8]) -> Result<ParseResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: &str, token: &str, line: u32) -> SyntaxNode {
        SyntaxNode::new(kind, token, Span::new(line, line), Vec::new())
    }

    #[test]
    fn test_to_tree_strips_position_nodes() {
        let node = SyntaxNode::new(
            "call",
            "",
            Span::new(1, 1),
            vec![leaf("Position", "", 1), leaf("ident", "foo", 1)],
        );
        let tree = node.to_tree("Position").expect("canonical tree");
        assert_eq!(tree, Tree::node("call", "", vec![Tree::leaf("ident", "foo")]));
        assert!(leaf("Position", "", 1).to_tree("Position").is_none());
    }

    #[test]
    fn test_to_tree_keeps_order() {
        let node = SyntaxNode::new(
            "block",
            "",
            Span::new(1, 3),
            vec![
                leaf("a", "1", 1),
                SyntaxNode::new("b", "", Span::new(2, 2), vec![leaf("c", "2", 2)]),
                leaf("d", "3", 3),
            ],
        );
        let tree = node.to_tree("Position").expect("canonical tree");
        assert_eq!(tree.size(), node.size());
        assert_eq!(
            tree,
            Tree::node(
                "block",
                "",
                vec![
                    Tree::leaf("a", "1"),
                    Tree::node("b", "", vec![Tree::leaf("c", "2")]),
                    Tree::leaf("d", "3"),
                ]
            )
        );
    }

    #[test]
    fn test_response_into_tree_requires_ok() {
        let response = ParseResponse {
            status: ParseStatus::Error,
            tree: Some(leaf("x", "", 1)),
            errors: vec!["syntax error".into()],
        };
        assert!(response.into_tree().is_none());
        assert!(ParseResponse::ok(leaf("x", "", 1)).into_tree().is_some());
    }
}
