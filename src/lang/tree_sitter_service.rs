//! In-process parse service backed by tree-sitter grammars.

use std::path::Path;

use tracing::debug;

use crate::core::errors::Result;
use crate::lang::common::{ParseResponse, ParseService, ParseStatus, Span, SyntaxNode};
use crate::lang::registry::{create_parser, grammar_for_path};

/// Anonymous tokens that only delimit structure.
const DELIMITERS: &[&str] = &["(", ")", "[", "]", "{", "}", ",", ";", ":", ".", "\n"];

/// Parse service using the grammars from [`crate::lang::registry`].
///
/// Parsers are created per request; `tree_sitter::Parser` is not `Sync` and a
/// parser is cheap next to the parse itself. Comments and other extra nodes
/// are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterParseService;

impl TreeSitterParseService {
    /// New service
    pub fn new() -> Self {
        Self
    }

    fn skip(&self, node: &tree_sitter::Node<'_>) -> bool {
        node.is_extra() || (!node.is_named() && DELIMITERS.contains(&node.kind()))
    }

    /// Convert a tree-sitter tree without recursion.
    fn convert(&self, root: tree_sitter::Node<'_>, source: &[u8]) -> SyntaxNode {
        struct Pending {
            kind: &'static str,
            token: String,
            span: Span,
            children: Vec<usize>,
        }

        let mut pending: Vec<Pending> = Vec::new();
        let mut stack = vec![(root, None::<usize>)];
        while let Some((node, parent)) = stack.pop() {
            if parent.is_some() && self.skip(&node) {
                continue;
            }

            let index = pending.len();
            let token = if node.child_count() == 0 {
                node.utf8_text(source).unwrap_or_default().to_string()
            } else {
                String::new()
            };
            pending.push(Pending {
                kind: node.kind(),
                token,
                span: line_span(&node),
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                pending[parent].children.push(index);
            }

            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(|child| (child, Some(index))));
        }

        // Children always sit after their parent, so building back to front
        // sees every child before its parent.
        let mut built: Vec<Option<SyntaxNode>> = (0..pending.len()).map(|_| None).collect();
        for (index, item) in pending.into_iter().enumerate().rev() {
            let children = item
                .children
                .iter()
                .filter_map(|child| built[*child].take())
                .collect();
            built[index] = Some(SyntaxNode::new(item.kind, item.token, item.span, children));
        }

        built
            .into_iter()
            .next()
            .flatten()
            .unwrap_or_else(|| SyntaxNode::new(root.kind(), "", Span::default(), Vec::new()))
    }
}

/// One-based inclusive line range of a node.
///
/// A node ending right after a newline ends at column 0 of the next row; that
/// row holds none of its text.
fn line_span(node: &tree_sitter::Node<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    let end_line = if end.column == 0 && end.row > start.row {
        end.row
    } else {
        end.row + 1
    };
    Span::new(start.row as u32 + 1, end_line as u32)
}

impl ParseService for TreeSitterParseService {
    fn parse(&self, filename: &str, content: &[u8]) -> Result<ParseResponse> {
        let (key, language) = grammar_for_path(Path::new(filename))?;
        let mut parser = create_parser(key, &language)?;

        let Some(tree) = parser.parse(content, None) else {
            return Ok(ParseResponse::failed(
                ParseStatus::Fatal,
                vec![format!("{key} parser produced no tree for {filename}")],
            ));
        };

        let root = tree.root_node();
        if root.has_error() {
            debug!("Syntax errors in {}", filename);
            return Ok(ParseResponse {
                status: ParseStatus::Error,
                tree: Some(self.convert(root, content)),
                errors: vec![format!("syntax errors in {filename}")],
            });
        }

        Ok(ParseResponse::ok(self.convert(root, content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_SOURCE: &str = "package main\n\nfunc main() {\n\tx := foo(1)\n\t_ = x\n}\n";

    fn find<'a>(node: &'a SyntaxNode, kind: &str) -> Option<&'a SyntaxNode> {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind == kind {
                return Some(current);
            }
            stack.extend(current.children.iter());
        }
        None
    }

    #[test]
    fn test_parse_go_source() {
        let service = TreeSitterParseService::new();
        let response = service.parse("main.go", GO_SOURCE.as_bytes()).unwrap();
        assert_eq!(response.status, ParseStatus::Ok);
        let tree = response.into_tree().unwrap();
        assert_eq!(tree.kind, "source_file");
        assert_eq!(tree.span, Span::new(1, 6));

        let call = find(&tree, "call_expression").expect("call expression");
        assert_eq!(call.span, Span::new(4, 4));
        let ident = find(call, "identifier").expect("callee");
        assert_eq!(ident.token, "foo");
    }

    #[test]
    fn test_span_ends_on_last_text_line() {
        let service = TreeSitterParseService::new();
        let source = "package main\n\nvar s = `a\nb\n`\n";
        let tree = service
            .parse("main.go", source.as_bytes())
            .unwrap()
            .into_tree()
            .unwrap();
        assert_eq!(tree.span, Span::new(1, 5));
        let literal = find(&tree, "raw_string_literal").expect("raw string");
        assert_eq!(literal.span, Span::new(3, 5));
    }

    #[test]
    fn test_comments_are_dropped() {
        let service = TreeSitterParseService::new();
        let source = "package main\n\n// note\nfunc main() {}\n";
        let tree = service
            .parse("main.go", source.as_bytes())
            .unwrap()
            .into_tree()
            .unwrap();
        assert!(find(&tree, "comment").is_none());
        assert!(find(&tree, "function_declaration").is_some());
    }

    #[test]
    fn test_delimiters_are_dropped() {
        let service = TreeSitterParseService::new();
        let tree = service
            .parse("main.go", GO_SOURCE.as_bytes())
            .unwrap()
            .into_tree()
            .unwrap();
        let mut stack = vec![&tree];
        while let Some(node) = stack.pop() {
            assert!(!DELIMITERS.contains(&node.kind.as_str()), "{}", node.kind);
            stack.extend(node.children.iter());
        }
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let service = TreeSitterParseService::new();
        let response = service
            .parse("broken.go", b"package main\nfunc ( {\n")
            .unwrap();
        assert_eq!(response.status, ParseStatus::Error);
        assert!(!response.errors.is_empty());
        assert!(response.into_tree().is_none());
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let service = TreeSitterParseService::new();
        assert!(service.parse("README.md", b"# title").is_err());
    }
}
