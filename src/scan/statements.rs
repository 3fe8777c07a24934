//! Top-level statement segmentation for prelude assembly.

use super::scope::statement_bindings;
use serde::Serialize;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Import,
    Definition,
    Assignment,
    Other,
}

/// One root-level statement of a snippet, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopLevelStatement {
    pub kind: StatementKind,
    pub text: String,
    /// Module-level names the statement binds.
    pub binds: Vec<String>,
}

impl TopLevelStatement {
    /// Whitespace-insensitive key used to deduplicate imports.
    pub fn normalized(&self) -> String {
        self.text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

pub(crate) fn split_statements(root: Node<'_>, src: &[u8]) -> Vec<TopLevelStatement> {
    let mut cursor = root.walk();
    root.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .filter_map(|child| {
            let text = child.utf8_text(src).ok()?.trim_end();
            if text.is_empty() {
                return None;
            }
            Some(TopLevelStatement {
                kind: classify(child),
                text: text.to_string(),
                binds: statement_bindings(child, src),
            })
        })
        .collect()
}

fn classify(node: Node<'_>) -> StatementKind {
    match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            StatementKind::Import
        }
        "function_definition" | "class_definition" | "decorated_definition" => {
            StatementKind::Definition
        }
        "expression_statement" => {
            let first = node.named_child(0);
            match first.map(|n| n.kind()) {
                Some("assignment") | Some("augmented_assignment") => StatementKind::Assignment,
                _ => StatementKind::Other,
            }
        }
        _ => StatementKind::Other,
    }
}
