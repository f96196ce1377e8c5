//! Source normalization: neutralizing unresolvable imports.
//!
//! The fallback extraction strategy tolerates scripts whose dependencies
//! are unavailable in the extraction environment by rewriting the source:
//! every import statement naming an unresolvable module is replaced with
//! `pass`, and the regenerated text is loaded again. The pass is
//! backend-agnostic; it only needs a resolvability predicate, nothing
//! about argument parsing.

use tree_sitter::Node;

use crate::error::LoadError;
use crate::interp::ModuleResolver;
use crate::interp::ast::parse_tree;

/// Rewrites `source`, replacing import statements whose modules the
/// resolver cannot satisfy. Returns the regenerated source text, which is
/// identical to the input when every import resolves.
///
/// Stripped statements are replaced with `pass` rather than removed so the
/// surrounding block structure stays syntactically valid.
pub fn strip_unresolvable_imports(
    source: &str,
    resolver: &ModuleResolver,
) -> Result<String, LoadError> {
    let tree = parse_tree(source)?;
    let mut spans: Vec<(usize, usize)> = Vec::new();
    collect_unresolvable(tree.root_node(), source, resolver, &mut spans);

    if spans.is_empty() {
        return Ok(source.to_string());
    }

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&source[cursor..start]);
        out.push_str("pass");
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

fn collect_unresolvable(
    node: Node,
    source: &str,
    resolver: &ModuleResolver,
    spans: &mut Vec<(usize, usize)>,
) {
    match node.kind() {
        "import_statement" => {
            if import_targets(node, source)
                .iter()
                .any(|module| !resolver.is_resolvable(module))
            {
                spans.push((node.start_byte(), node.end_byte()));
            }
            return;
        }
        "import_from_statement" => {
            let module = node
                .child_by_field_name("module_name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .unwrap_or("");
            if !module.is_empty() && !resolver.is_resolvable(module) {
                spans.push((node.start_byte(), node.end_byte()));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_unresolvable(child, source, resolver, spans);
    }
}

/// Dotted module paths named by a plain import statement.
fn import_targets(node: Node, source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    targets.push(text.to_string());
                }
            }
            "aliased_import" => {
                if let Some(text) = child
                    .child_by_field_name("name")
                    .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                {
                    targets.push(text.to_string());
                }
            }
            _ => {}
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ModuleResolver {
        ModuleResolver::new(None)
    }

    #[test]
    fn test_resolvable_imports_untouched() {
        let source = "import argparse\nimport sys\n";
        let stripped = strip_unresolvable_imports(source, &resolver()).unwrap();
        assert_eq!(stripped, source);
    }

    #[test]
    fn test_unresolvable_import_replaced_with_pass() {
        let source = "import argparse\nimport numpy\nx = 1\n";
        let stripped = strip_unresolvable_imports(source, &resolver()).unwrap();
        assert_eq!(stripped, "import argparse\npass\nx = 1\n");
    }

    #[test]
    fn test_from_import_stripped() {
        let source = "from requests.sessions import Session\nimport argparse\n";
        let stripped = strip_unresolvable_imports(source, &resolver()).unwrap();
        assert_eq!(stripped, "pass\nimport argparse\n");
    }

    #[test]
    fn test_nested_import_keeps_block_valid() {
        let source = "\
def main():
    import requests
    return 1
";
        let stripped = strip_unresolvable_imports(source, &resolver()).unwrap();
        assert!(stripped.contains("    pass"));
        // The regenerated source must still parse.
        assert!(parse_tree(&stripped).is_ok());
        assert!(!parse_tree(&stripped).unwrap().root_node().has_error());
    }

    #[test]
    fn test_multi_target_import_stripped_whole() {
        let source = "import os, numpy\n";
        let stripped = strip_unresolvable_imports(source, &resolver()).unwrap();
        assert_eq!(stripped, "pass\n");
    }
}
