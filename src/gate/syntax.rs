//! Whole-program syntax check of prelude plus target.

use crate::error::ParseError;
use rustpython_parser::{ast, Parse};
use tree_sitter::Parser;

/// Parse `source` as a Python module.
///
/// The parser's own message is kept verbatim; the line and column come from
/// the first error node tree-sitter finds, when it finds one.
pub fn check_syntax(source: &str) -> Result<(), ParseError> {
    match ast::Suite::parse(source, "<snippet>") {
        Ok(_) => Ok(()),
        Err(err) => {
            let (line, column) = error_position(source).unwrap_or((0, 0));
            Err(ParseError::new(err.to_string(), line, column))
        }
    }
}

fn error_position(source: &str) -> Option<(usize, usize)> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into()).ok()?;
    let tree = parser.parse(source, None)?;
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return Some((pos.row + 1, pos.column + 1));
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}
