//! Syntax checks run before any file write.

use std::path::Path;

use tree_sitter::{Node, Parser};

/// Check `content` as the type implied by `path`'s extension.
///
/// Returns the parser diagnostic on failure. Unrecognized extensions are
/// always accepted.
pub fn check(path: &Path, content: &str) -> Result<(), String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => syn::parse_file(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Some("json") => serde_json::from_str::<serde_json::Value>(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Some("toml") => toml::from_str::<toml::Table>(content)
            .map(|_| ())
            .map_err(|e| e.message().to_string()),
        Some("py") => check_python(content),
        _ => Ok(()),
    }
}

fn check_python(content: &str) -> Result<(), String> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| e.to_string())?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| "python parser returned no tree".to_string())?;

    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }
    let line = first_error(root).map_or(1, |node| node.start_position().row + 1);
    Err(format!("invalid Python syntax at line {}", line))
}

/// Depth-first search for the first error or missing node.
fn first_error<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| child.has_error())
        .find_map(first_error)
}
