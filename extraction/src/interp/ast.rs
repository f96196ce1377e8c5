//! Script AST lowering.
//!
//! Lowers a tree-sitter parse of the script into the small statement and
//! expression language the sandbox evaluator understands. Constructs with no
//! bearing on declarative parser building (loops, classes, context
//! managers) lower to [`Stmt::Unsupported`] and are skipped at evaluation
//! time; expression shapes the evaluator does not model lower to
//! [`Expr::Opaque`].

use std::rc::Rc;

use tree_sitter::Node;

use crate::error::LoadError;

/// A lowered script module.
#[derive(Debug, Clone)]
pub struct Module {
    pub body: Vec<Stmt>,
    pub docstring: Option<String>,
}

/// One name bound by an import statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    /// Fully dotted module path being imported.
    pub module: String,
    /// For `from m import a`, the attribute being imported; `None` for
    /// plain imports.
    pub attr: Option<String>,
    /// The name the statement binds in the namespace.
    pub binding: String,
}

/// A user-defined function: parameters plus un-evaluated body.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `import a, b as c`
    Import(Vec<ImportName>),
    /// `from m import a, b as c`
    ImportFrom {
        module: String,
        names: Vec<ImportName>,
    },
    /// `name = expr`
    Assign { target: String, value: Expr },
    /// A bare expression (calls, docstrings).
    Expr(Expr),
    FunctionDef(FunctionDef),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Return(Option<Expr>),
    /// A `try` body; handlers are not modeled, load failures inside the
    /// body are swallowed.
    Try(Vec<Stmt>),
    Pass,
    /// A construct the evaluator does not model; skipped with a warning.
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    In,
    NotIn,
    Is,
    IsNot,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    None,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Attribute {
        object: Box<Expr>,
        attr: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },
    BinOp {
        left: Box<Expr>,
        op: BinOpKind,
        right: Box<Expr>,
    },
    BoolOp {
        left: Box<Expr>,
        op: BoolOpKind,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    /// An expression shape the evaluator does not model.
    Opaque,
}

/// Parses script source into a lowered [`Module`].
pub fn parse_module(source: &str) -> std::result::Result<Module, LoadError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();

    if root.has_error() {
        return Err(LoadError::Syntax(
            "source contains syntax errors".to_string(),
        ));
    }

    let body = lower_block(root, source);
    let docstring = match body.first() {
        Some(Stmt::Expr(Expr::Str(s))) => Some(s.clone()),
        _ => None,
    };

    Ok(Module { body, docstring })
}

pub(crate) fn parse_tree(source: &str) -> std::result::Result<tree_sitter::Tree, LoadError> {
    let mut parser = tree_sitter::Parser::new();
    let language = tree_sitter_python::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| LoadError::Syntax(e.to_string()))?;
    parser
        .parse(source, None)
        .ok_or_else(|| LoadError::Syntax("parser produced no tree".to_string()))
}

fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

pub(crate) fn lower_block(node: Node, source: &str) -> Vec<Stmt> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| lower_stmt(child, source))
        .collect()
}

fn lower_stmt(node: Node, source: &str) -> Stmt {
    match node.kind() {
        "import_statement" => Stmt::Import(lower_import_names(node, source)),
        "import_from_statement" => lower_import_from(node, source),
        "expression_statement" => lower_expression_statement(node, source),
        "function_definition" => lower_function_def(node, source),
        "decorated_definition" => match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "function_definition" => lower_function_def(def, source),
            _ => Stmt::Unsupported("decorated_definition"),
        },
        "if_statement" => lower_if(node, source),
        "return_statement" => Stmt::Return(node.named_child(0).map(|e| lower_expr(e, source))),
        "try_statement" => match node.child_by_field_name("body") {
            Some(body) => Stmt::Try(lower_block(body, source)),
            None => Stmt::Unsupported("try_statement"),
        },
        "raise_statement" => match node.named_child(0) {
            // `raise SystemExit(main())` still evaluates its argument, which
            // matters when the parse call sits inside `main`.
            Some(inner) if inner.kind() == "call" => Stmt::Expr(lower_expr(inner, source)),
            _ => Stmt::Unsupported("raise_statement"),
        },
        "pass_statement" => Stmt::Pass,
        "future_import_statement" => Stmt::Pass,
        "for_statement" => Stmt::Unsupported("for_statement"),
        "while_statement" => Stmt::Unsupported("while_statement"),
        "with_statement" => Stmt::Unsupported("with_statement"),
        "class_definition" => Stmt::Unsupported("class_definition"),
        "global_statement" | "nonlocal_statement" => Stmt::Pass,
        "assert_statement" | "delete_statement" | "print_statement" => {
            Stmt::Unsupported("statement")
        }
        _ => Stmt::Unsupported("statement"),
    }
}

fn lower_import_names(node: Node, source: &str) -> Vec<ImportName> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = node_text(child, source);
                // `import os.path` binds the top-level package name.
                let binding = module
                    .split('.')
                    .next()
                    .unwrap_or(module.as_str())
                    .to_string();
                names.push(ImportName {
                    module,
                    attr: None,
                    binding,
                });
            }
            "aliased_import" => {
                let module = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let binding = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source))
                    .unwrap_or_else(|| module.clone());
                names.push(ImportName {
                    module,
                    attr: None,
                    binding,
                });
            }
            _ => {}
        }
    }
    names
}

fn lower_import_from(node: Node, source: &str) -> Stmt {
    let module = node
        .child_by_field_name("module_name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if Some(child) == node.child_by_field_name("module_name") {
            continue;
        }
        match child.kind() {
            "dotted_name" => {
                let name = node_text(child, source);
                names.push(ImportName {
                    module: module.clone(),
                    attr: Some(name.clone()),
                    binding: name,
                });
            }
            "aliased_import" => {
                let attr = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source))
                    .unwrap_or_default();
                let binding = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source))
                    .unwrap_or_else(|| attr.clone());
                names.push(ImportName {
                    module: module.clone(),
                    attr: Some(attr),
                    binding,
                });
            }
            "wildcard_import" => {}
            _ => {}
        }
    }

    Stmt::ImportFrom { module, names }
}

fn lower_expression_statement(node: Node, source: &str) -> Stmt {
    let Some(inner) = node.named_child(0) else {
        return Stmt::Pass;
    };
    match inner.kind() {
        "assignment" => {
            let target = inner.child_by_field_name("left");
            let value = inner.child_by_field_name("right");
            match (target, value) {
                (Some(t), Some(v)) if t.kind() == "identifier" => Stmt::Assign {
                    target: node_text(t, source),
                    value: lower_expr(v, source),
                },
                // Attribute/tuple targets do not feed parser discovery.
                _ => Stmt::Unsupported("assignment"),
            }
        }
        "augmented_assignment" => Stmt::Unsupported("augmented_assignment"),
        _ => Stmt::Expr(lower_expr(inner, source)),
    }
}

fn lower_function_def(node: Node, source: &str) -> Stmt {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or_default();

    let mut params = Vec::new();
    if let Some(parameters) = node.child_by_field_name("parameters") {
        let mut cursor = parameters.walk();
        for param in parameters.named_children(&mut cursor) {
            match param.kind() {
                "identifier" => params.push(node_text(param, source)),
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(n) = param.child_by_field_name("name") {
                        params.push(node_text(n, source));
                    }
                }
                // Annotated parameters carry no name field; the identifier
                // is the first named child.
                "typed_parameter" => {
                    let mut inner = param.walk();
                    if let Some(n) = param
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "identifier")
                    {
                        params.push(node_text(n, source));
                    }
                }
                _ => {}
            }
        }
    }

    let body = node
        .child_by_field_name("body")
        .map(|b| lower_block(b, source))
        .unwrap_or_default();

    Stmt::FunctionDef(FunctionDef {
        name,
        params,
        body: Rc::new(body),
    })
}

fn lower_if(node: Node, source: &str) -> Stmt {
    let test = node
        .child_by_field_name("condition")
        .map(|c| lower_expr(c, source))
        .unwrap_or(Expr::Opaque);
    let body = node
        .child_by_field_name("consequence")
        .map(|b| lower_block(b, source))
        .unwrap_or_default();

    // elif/else clauses arrive as repeated `alternative` children; fold the
    // elif chain into nested ifs.
    let mut orelse = Vec::new();
    let mut cursor = node.walk();
    let alternatives: Vec<Node> = node
        .children_by_field_name("alternative", &mut cursor)
        .collect();
    for alternative in alternatives.into_iter().rev() {
        match alternative.kind() {
            "else_clause" => {
                orelse = alternative
                    .child_by_field_name("body")
                    .map(|b| lower_block(b, source))
                    .unwrap_or_default();
            }
            "elif_clause" => {
                let elif_test = alternative
                    .child_by_field_name("condition")
                    .map(|c| lower_expr(c, source))
                    .unwrap_or(Expr::Opaque);
                let elif_body = alternative
                    .child_by_field_name("consequence")
                    .map(|b| lower_block(b, source))
                    .unwrap_or_default();
                orelse = vec![Stmt::If {
                    test: elif_test,
                    body: elif_body,
                    orelse: std::mem::take(&mut orelse),
                }];
            }
            _ => {}
        }
    }

    Stmt::If { test, body, orelse }
}

fn lower_expr(node: Node, source: &str) -> Expr {
    match node.kind() {
        "identifier" => Expr::Name(node_text(node, source)),
        "none" => Expr::None,
        "true" => Expr::True,
        "false" => Expr::False,
        "integer" => lower_integer(&node_text(node, source)),
        "float" => node_text(node, source)
            .replace('_', "")
            .parse::<f64>()
            .map(Expr::Float)
            .unwrap_or(Expr::Opaque),
        "string" => Expr::Str(lower_string(node, source)),
        "concatenated_string" => {
            let mut cursor = node.walk();
            let joined: String = node
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "string")
                .map(|c| lower_string(c, source))
                .collect();
            Expr::Str(joined)
        }
        "attribute" => {
            let object = node
                .child_by_field_name("object")
                .map(|o| lower_expr(o, source))
                .unwrap_or(Expr::Opaque);
            let attr = node
                .child_by_field_name("attribute")
                .map(|a| node_text(a, source))
                .unwrap_or_default();
            Expr::Attribute {
                object: Box::new(object),
                attr,
            }
        }
        "call" => lower_call(node, source),
        "list" | "set" => Expr::List(lower_elements(node, source)),
        "tuple" => Expr::Tuple(lower_elements(node, source)),
        "parenthesized_expression" => node
            .named_child(0)
            .map(|inner| lower_expr(inner, source))
            .unwrap_or(Expr::Opaque),
        "comparison_operator" => lower_comparison(node, source),
        "binary_operator" => {
            let left = node
                .child_by_field_name("left")
                .map(|l| lower_expr(l, source))
                .unwrap_or(Expr::Opaque);
            let right = node
                .child_by_field_name("right")
                .map(|r| lower_expr(r, source))
                .unwrap_or(Expr::Opaque);
            let op = match node
                .child_by_field_name("operator")
                .map(|o| o.kind())
                .unwrap_or("")
            {
                "+" => BinOpKind::Add,
                "-" => BinOpKind::Sub,
                "*" => BinOpKind::Mul,
                "/" | "//" => BinOpKind::Div,
                "%" => BinOpKind::Mod,
                _ => BinOpKind::Other,
            };
            Expr::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }
        }
        "boolean_operator" => {
            let left = node
                .child_by_field_name("left")
                .map(|l| lower_expr(l, source))
                .unwrap_or(Expr::Opaque);
            let right = node
                .child_by_field_name("right")
                .map(|r| lower_expr(r, source))
                .unwrap_or(Expr::Opaque);
            let op = match node
                .child_by_field_name("operator")
                .map(|o| o.kind())
                .unwrap_or("")
            {
                "or" => BoolOpKind::Or,
                _ => BoolOpKind::And,
            };
            Expr::BoolOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }
        }
        "not_operator" => {
            let operand = node
                .child_by_field_name("argument")
                .or_else(|| node.named_child(0))
                .map(|a| lower_expr(a, source))
                .unwrap_or(Expr::Opaque);
            Expr::Not(Box::new(operand))
        }
        "unary_operator" => {
            let operand = node
                .child_by_field_name("argument")
                .or_else(|| node.named_child(0))
                .map(|a| lower_expr(a, source))
                .unwrap_or(Expr::Opaque);
            let is_neg = node.child(0).map(|c| c.kind() == "-").unwrap_or(false);
            if is_neg {
                Expr::Neg(Box::new(operand))
            } else {
                Expr::Opaque
            }
        }
        _ => Expr::Opaque,
    }
}

fn lower_integer(text: &str) -> Expr {
    let cleaned = text.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        cleaned.parse::<i64>()
    };
    parsed.map(Expr::Int).unwrap_or(Expr::Opaque)
}

fn lower_elements(node: Node, source: &str) -> Vec<Expr> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .map(|c| lower_expr(c, source))
        .collect()
}

fn lower_call(node: Node, source: &str) -> Expr {
    let func = node
        .child_by_field_name("function")
        .map(|f| lower_expr(f, source))
        .unwrap_or(Expr::Opaque);

    let mut args = Vec::new();
    let mut kwargs = Vec::new();
    if let Some(arguments) = node.child_by_field_name("arguments") {
        let mut cursor = arguments.walk();
        for argument in arguments.named_children(&mut cursor) {
            match argument.kind() {
                "keyword_argument" => {
                    let name = argument
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or_default();
                    let value = argument
                        .child_by_field_name("value")
                        .map(|v| lower_expr(v, source))
                        .unwrap_or(Expr::Opaque);
                    kwargs.push((name, value));
                }
                "list_splat" | "dictionary_splat" | "comment" => {}
                _ => args.push(lower_expr(argument, source)),
            }
        }
    }

    Expr::Call {
        func: Box::new(func),
        args,
        kwargs,
    }
}

fn lower_comparison(node: Node, source: &str) -> Expr {
    // Chained comparisons (a < b < c) are rare in declaration code; only
    // the two-operand form is modeled.
    if node.named_child_count() != 2 {
        return Expr::Opaque;
    }
    let left = node
        .named_child(0)
        .map(|l| lower_expr(l, source))
        .unwrap_or(Expr::Opaque);
    let right = node
        .named_child(1)
        .map(|r| lower_expr(r, source))
        .unwrap_or(Expr::Opaque);

    // `not in` and `is not` arrive as two operator tokens; join before
    // classifying.
    let mut tokens = Vec::new();
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i)
            && !child.is_named()
        {
            tokens.push(child.kind());
        }
    }
    let op = match tokens.join(" ").as_str() {
        "==" => CompareOp::Eq,
        "!=" => CompareOp::NotEq,
        "in" => CompareOp::In,
        "not in" => CompareOp::NotIn,
        "is" => CompareOp::Is,
        "is not" => CompareOp::IsNot,
        _ => CompareOp::Other,
    };

    Expr::Compare {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Extracts the literal value of a string node, resolving escapes and
/// rendering any interpolation as its raw `{...}` text.
fn lower_string(node: Node, source: &str) -> String {
    let mut out = String::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string_content" => out.push_str(&unescape(&node_text(child, source))),
            "escape_sequence" => out.push_str(&unescape(&node_text(child, source))),
            "interpolation" => out.push_str(&node_text(child, source)),
            _ => {}
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(source: &str) -> Module {
        parse_module(source).expect("source should parse")
    }

    #[test]
    fn test_imports_lower_with_bindings() {
        let m = module("import argparse\nimport os.path\nimport numpy as np\n");
        match &m.body[0] {
            Stmt::Import(names) => {
                assert_eq!(names[0].module, "argparse");
                assert_eq!(names[0].binding, "argparse");
            }
            other => panic!("expected import, got {other:?}"),
        }
        match &m.body[1] {
            Stmt::Import(names) => assert_eq!(names[0].binding, "os"),
            other => panic!("expected import, got {other:?}"),
        }
        match &m.body[2] {
            Stmt::Import(names) => {
                assert_eq!(names[0].module, "numpy");
                assert_eq!(names[0].binding, "np");
            }
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn test_from_import_binds_each_name() {
        let m = module("from argparse import ArgumentParser, SUPPRESS\n");
        match &m.body[0] {
            Stmt::ImportFrom { module, names } => {
                assert_eq!(module, "argparse");
                let bindings: Vec<&str> = names.iter().map(|n| n.binding.as_str()).collect();
                assert_eq!(bindings, vec!["ArgumentParser", "SUPPRESS"]);
            }
            other => panic!("expected from-import, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_and_call_lower() {
        let m = module("parser = argparse.ArgumentParser(description='x')\n");
        match &m.body[0] {
            Stmt::Assign { target, value } => {
                assert_eq!(target, "parser");
                match value {
                    Expr::Call { kwargs, .. } => {
                        assert_eq!(kwargs[0].0, "description");
                    }
                    other => panic!("expected call, got {other:?}"),
                }
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn test_docstring_detected() {
        let m = module("\"\"\"Usage: tool [options]\"\"\"\nx = 1\n");
        assert_eq!(m.docstring.as_deref(), Some("Usage: tool [options]"));
    }

    #[test]
    fn test_main_guard_lowering() {
        let m = module("if __name__ == '__main__':\n    main()\n");
        match &m.body[0] {
            Stmt::If { test, body, .. } => {
                assert!(matches!(test, Expr::Compare { op: CompareOp::Eq, .. }));
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_constructs_are_tagged() {
        let m = module("for i in range(3):\n    print(i)\n");
        assert!(matches!(m.body[0], Stmt::Unsupported("for_statement")));
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        assert!(matches!(
            parse_module("def broken(:\n"),
            Err(LoadError::Syntax(_))
        ));
    }

    #[test]
    fn test_string_escapes() {
        let m = module("x = 'a\\tb'\n");
        match &m.body[0] {
            Stmt::Assign { value: Expr::Str(s), .. } => assert_eq!(s, "a\tb"),
            other => panic!("expected string assign, got {other:?}"),
        }
    }
}
