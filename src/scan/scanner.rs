//! Static dependency scanner built on tree-sitter

use super::scope::{ScopeWalk, UsageHints};
use super::statements::{split_statements, TopLevelStatement};
use crate::domain::{Snippet, SnippetSequence, SymbolKind, SymbolReference};
use crate::error::ParseError;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Result of scanning one snippet.
#[derive(Debug, Clone, Default)]
pub struct SnippetScan {
    pub index: usize,
    /// Names read but never bound, in order of first use.
    pub free: Vec<SymbolReference>,
    /// Names bound at module level, with the kind of their binding.
    pub defines: BTreeMap<String, SymbolKind>,
    pub hints: BTreeMap<String, UsageHints>,
    pub statements: Vec<TopLevelStatement>,
    pub syntax_error: Option<ParseError>,
}

impl SnippetScan {
    /// Unparseable snippets never serve as definition sources.
    pub fn is_candidate_source(&self) -> bool {
        self.syntax_error.is_none()
    }

    pub fn defines_symbol(&self, name: &str) -> bool {
        self.is_candidate_source() && self.defines.contains_key(name)
    }

    pub fn free_names(&self) -> impl Iterator<Item = &str> {
        self.free.iter().map(|r| r.name.as_str())
    }
}

/// Deterministic scanner; holds no state between snippets.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticScanner;

impl StaticScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, snippet: &Snippet) -> SnippetScan {
        let mut parser = Parser::new();
        if parser.set_language(&tree_sitter_python::LANGUAGE.into()).is_err() {
            return SnippetScan {
                index: snippet.index,
                syntax_error: Some(ParseError::new("python grammar unavailable", 0, 0)),
                ..Default::default()
            };
        }
        let Some(tree) = parser.parse(&snippet.content, None) else {
            return SnippetScan {
                index: snippet.index,
                syntax_error: Some(ParseError::new("parser produced no tree", 0, 0)),
                ..Default::default()
            };
        };

        let root = tree.root_node();
        let src = snippet.content.as_bytes();
        let syntax_error = first_error(root).map(|node| {
            let pos = node.start_position();
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "invalid syntax".to_string()
            };
            ParseError::new(message, pos.row + 1, pos.column + 1)
        });
        if let Some(err) = &syntax_error {
            tracing::debug!(snippet = snippet.index, error = %err, "snippet has syntax errors");
        }

        // A partial tree still yields useful free names for the target itself.
        let walk = ScopeWalk::run(root, src);
        let free = walk
            .free
            .iter()
            .map(|name| {
                let kind = walk
                    .hints
                    .get(name)
                    .map(|h| h.symbol_kind(name))
                    .unwrap_or(SymbolKind::Variable);
                SymbolReference::new(name.clone(), kind)
            })
            .collect();

        SnippetScan {
            index: snippet.index,
            free,
            defines: walk.defines,
            hints: walk.hints,
            statements: split_statements(root, src),
            syntax_error,
        }
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Every snippet of a sequence pre-scanned, plus an inverted definition index.
#[derive(Debug, Default)]
pub struct ScanIndex {
    scans: BTreeMap<usize, Arc<SnippetScan>>,
    definers: HashMap<String, Vec<usize>>,
}

impl ScanIndex {
    pub fn build(sequence: &SnippetSequence) -> Self {
        let scanner = StaticScanner::new();
        let snippets: Vec<&Snippet> = sequence.iter().collect();
        let scans: Vec<SnippetScan> = snippets.par_iter().map(|s| scanner.scan(s)).collect();

        let mut definers: HashMap<String, Vec<usize>> = HashMap::new();
        for scan in scans.iter().filter(|s| s.is_candidate_source()) {
            for name in scan.defines.keys() {
                definers.entry(name.clone()).or_default().push(scan.index);
            }
        }
        for indices in definers.values_mut() {
            indices.sort_unstable();
        }

        let unparseable = scans.iter().filter(|s| !s.is_candidate_source()).count();
        tracing::debug!(
            snippets = scans.len(),
            symbols = definers.len(),
            unparseable,
            "built scan index"
        );

        Self { scans: scans.into_iter().map(|s| (s.index, Arc::new(s))).collect(), definers }
    }

    pub fn get(&self, index: usize) -> Option<&Arc<SnippetScan>> {
        self.scans.get(&index)
    }

    /// Ascending indices of parseable snippets defining `symbol`.
    pub fn definers(&self, symbol: &str) -> &[usize] {
        self.definers.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}
