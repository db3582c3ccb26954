//! Lowers a tree-sitter-python concrete syntax tree into a [`SyntaxTree`].

use std::path::{Path, PathBuf};

use thiserror::Error;
use tree_sitter::Node as TsNode;

use super::{
    Assign, Attribute, Call, Constant, ImportAlias, ImportFrom, Keyword, Node, NodeKind, Rebind,
    SyntaxTree,
};

/// Deepest syntax nesting lowered. The lowering recurses once per level,
/// so anything deeper is rejected before it can exhaust a worker's stack.
pub const MAX_NESTING_DEPTH: usize = 400;

/// Why a source file produced no tree. Callers treat all of these as a
/// per-file soft failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid UTF-8", path.display())]
    Encoding { path: PathBuf },

    #[error("syntax error in {} at line {line}", path.display())]
    Syntax { path: PathBuf, line: usize },

    #[error("{} nests deeper than {limit} levels", path.display())]
    TooDeep { path: PathBuf, limit: usize },

    #[error("failed to load the Python grammar: {0}")]
    Language(String),
}

/// Read and parse a Python file.
pub fn parse_file(path: &Path) -> Result<SyntaxTree, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source = String::from_utf8(bytes).map_err(|_| ParseError::Encoding {
        path: path.to_path_buf(),
    })?;
    parse_source(&source, path)
}

/// Parse Python source text. `path` is only used in error messages.
pub fn parse_source(source: &str, path: &Path) -> Result<SyntaxTree, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseError::Language(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError::Syntax {
        path: path.to_path_buf(),
        line: 1,
    })?;

    let root = tree.root_node();
    if exceeds_depth(root, MAX_NESTING_DEPTH) {
        return Err(ParseError::TooDeep {
            path: path.to_path_buf(),
            limit: MAX_NESTING_DEPTH,
        });
    }
    if root.has_error() {
        return Err(ParseError::Syntax {
            path: path.to_path_buf(),
            line: first_error_line(root).unwrap_or(1),
        });
    }

    let lowering = Lowering {
        source: source.as_bytes(),
    };
    Ok(SyntaxTree::new(lowering.children(root)))
}

/// Iterative depth probe over the concrete tree.
fn exceeds_depth(root: TsNode, limit: usize) -> bool {
    let mut cursor = root.walk();
    let mut depth = 0;
    loop {
        if depth > limit {
            return true;
        }
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return false;
            }
            depth -= 1;
        }
    }
}

fn first_error_line(node: TsNode) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    let mut cursor = node.walk();
    let children: Vec<TsNode> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_line)
}

fn line_of(node: TsNode) -> usize {
    node.start_position().row + 1
}

struct Lowering<'s> {
    source: &'s [u8],
}

impl<'s> Lowering<'s> {
    fn text(&self, node: TsNode) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn named_children<'t>(&self, node: TsNode<'t>) -> Vec<TsNode<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|child| !child.is_extra())
            .collect()
    }

    fn children(&self, node: TsNode) -> Vec<Node> {
        self.named_children(node)
            .into_iter()
            .map(|child| self.lower(child))
            .collect()
    }

    fn other(&self, node: TsNode) -> Node {
        Node::new(line_of(node), NodeKind::Other(self.children(node)))
    }

    fn lower(&self, node: TsNode) -> Node {
        let line = line_of(node);
        match node.kind() {
            "import_statement" => Node::new(line, NodeKind::Import(self.import_names(node))),
            "import_from_statement" => self.import_from(node),
            "expression_statement" => {
                let mut children = self.named_children(node);
                if children.len() == 1 {
                    self.lower(children.remove(0))
                } else {
                    self.other(node)
                }
            }
            "assignment" => self.assignment(node),
            "augmented_assignment" | "for_statement" => self.rebind(node, "left"),
            "named_expression" => self.rebind(node, "name"),
            "as_pattern" => self.rebind(node, "alias"),
            "call" => self.call(node),
            "attribute" => self.attribute(node),
            "identifier" => Node::new(line, NodeKind::Name(self.text(node).to_string())),
            "parenthesized_expression" => {
                let mut children = self.named_children(node);
                if children.len() == 1 {
                    self.lower(children.remove(0))
                } else {
                    self.other(node)
                }
            }
            "string" => self.string(node),
            "concatenated_string" => self.concatenated_string(node),
            "true" => Node::new(line, NodeKind::Constant(Constant::Bool(true))),
            "false" => Node::new(line, NodeKind::Constant(Constant::Bool(false))),
            "none" => Node::new(line, NodeKind::Constant(Constant::None)),
            "integer" => Node::new(
                line,
                NodeKind::Constant(Constant::Int(self.text(node).to_string())),
            ),
            "float" => Node::new(
                line,
                NodeKind::Constant(Constant::Float(self.text(node).to_string())),
            ),
            "ellipsis" => Node::new(line, NodeKind::Constant(Constant::Ellipsis)),
            _ => self.other(node),
        }
    }

    fn import_alias(&self, node: TsNode) -> Option<ImportAlias> {
        match node.kind() {
            "dotted_name" => Some(ImportAlias::new(self.text(node), None)),
            "aliased_import" => {
                let name = node.child_by_field_name("name")?;
                let alias = node
                    .child_by_field_name("alias")
                    .map(|a| self.text(a).to_string());
                Some(ImportAlias::new(self.text(name), alias))
            }
            _ => None,
        }
    }

    fn import_names(&self, node: TsNode) -> Vec<ImportAlias> {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .filter_map(|child| self.import_alias(child))
            .collect()
    }

    fn import_from(&self, node: TsNode) -> Node {
        let (module, level) = match node.child_by_field_name("module_name") {
            Some(m) if m.kind() == "relative_import" => {
                let mut level = 0;
                let mut module = None;
                for child in self.named_children(m) {
                    match child.kind() {
                        "import_prefix" => level = self.text(child).len(),
                        "dotted_name" => module = Some(self.text(child).to_string()),
                        _ => {}
                    }
                }
                (module, level)
            }
            Some(m) => (Some(self.text(m).to_string()), 0),
            None => (None, 0),
        };

        Node::new(
            line_of(node),
            NodeKind::ImportFrom(ImportFrom {
                module,
                level,
                names: self.import_names(node),
            }),
        )
    }

    fn assignment(&self, node: TsNode) -> Node {
        let mut targets = Vec::new();
        let mut names = Vec::new();
        let mut current = node;
        loop {
            let (Some(left), Some(right)) = (
                current.child_by_field_name("left"),
                current.child_by_field_name("right"),
            ) else {
                // `x: int` declares without binding a value.
                return self.other(node);
            };
            self.bound_names(left, &mut names);
            targets.push(self.lower(left));
            if right.kind() == "assignment" {
                current = right;
                continue;
            }
            return Node::new(
                line_of(node),
                NodeKind::Assign(Assign {
                    targets,
                    value: Box::new(self.lower(right)),
                    names,
                }),
            );
        }
    }

    fn rebind(&self, node: TsNode, field: &str) -> Node {
        let mut names = Vec::new();
        if let Some(target) = node.child_by_field_name(field) {
            self.bound_names(target, &mut names);
        }
        Node::new(
            line_of(node),
            NodeKind::Rebind(Rebind {
                names,
                body: self.children(node),
            }),
        )
    }

    /// Plain names bound by a target, looking through unpacking patterns.
    /// Attribute and subscript targets bind no local name.
    fn bound_names(&self, node: TsNode, out: &mut Vec<String>) {
        match node.kind() {
            "identifier" => out.push(self.text(node).to_string()),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "expression_list" | "parenthesized_expression" | "list_splat_pattern"
            | "list_splat" => {
                for child in self.named_children(node) {
                    self.bound_names(child, out);
                }
            }
            "as_pattern_target" => {
                let children = self.named_children(node);
                if children.is_empty() {
                    let text = self.text(node);
                    if is_identifier(text) {
                        out.push(text.to_string());
                    }
                }
                for child in children {
                    self.bound_names(child, out);
                }
            }
            _ => {}
        }
    }

    fn call(&self, node: TsNode) -> Node {
        let Some(function) = node.child_by_field_name("function") else {
            return self.other(node);
        };

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "argument_list" {
                for arg in self.named_children(arguments) {
                    match arg.kind() {
                        "keyword_argument" => {
                            let name = arg.child_by_field_name("name");
                            let value = arg.child_by_field_name("value");
                            if let (Some(name), Some(value)) = (name, value) {
                                keywords.push(Keyword {
                                    arg: Some(self.text(name).to_string()),
                                    value: self.lower(value),
                                });
                            }
                        }
                        "dictionary_splat" => keywords.push(Keyword {
                            arg: None,
                            value: self.other(arg),
                        }),
                        _ => args.push(self.lower(arg)),
                    }
                }
            } else {
                // `f(x for x in xs)`
                args.push(self.lower(arguments));
            }
        }

        Node::new(
            line_of(node),
            NodeKind::Call(Call {
                func: Box::new(self.lower(function)),
                args,
                keywords,
            }),
        )
    }

    fn attribute(&self, node: TsNode) -> Node {
        let object = node.child_by_field_name("object");
        let attr = node.child_by_field_name("attribute");
        match (object, attr) {
            (Some(object), Some(attr)) => Node::new(
                line_of(node),
                NodeKind::Attribute(Attribute {
                    value: Box::new(self.lower(object)),
                    attr: self.text(attr).to_string(),
                }),
            ),
            _ => self.other(node),
        }
    }

    fn string(&self, node: TsNode) -> Node {
        match self.string_literal(node) {
            Some(literal) => Node::new(line_of(node), NodeKind::Constant(literal.into_constant())),
            None => self.other(node),
        }
    }

    fn concatenated_string(&self, node: TsNode) -> Node {
        let parts: Option<Vec<StringLiteral>> = self
            .named_children(node)
            .into_iter()
            .map(|part| self.string_literal(part))
            .collect();
        let Some(parts) = parts else {
            return self.other(node);
        };

        let is_bytes = parts.iter().any(|p| p.is_bytes);
        let value: String = parts.into_iter().map(|p| p.value).collect();
        Node::new(
            line_of(node),
            NodeKind::Constant(StringLiteral { value, is_bytes }.into_constant()),
        )
    }

    /// `None` for f-strings, which are not constants.
    fn string_literal(&self, node: TsNode) -> Option<StringLiteral> {
        if node.kind() != "string" {
            return None;
        }
        let text = self.text(node);
        let mut start = "";
        let mut end = "";
        for child in self.named_children(node) {
            match child.kind() {
                "string_start" => start = self.text(child),
                "string_end" => end = self.text(child),
                _ => {}
            }
        }

        let prefix: String = start
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if prefix.contains('f') || prefix.contains('t') {
            return None;
        }

        let body = text
            .get(start.len()..text.len().saturating_sub(end.len()))
            .unwrap_or("");
        let value = if prefix.contains('r') {
            body.to_string()
        } else {
            unescape(body)
        };
        Some(StringLiteral {
            value,
            is_bytes: prefix.contains('b'),
        })
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

struct StringLiteral {
    value: String,
    is_bytes: bool,
}

impl StringLiteral {
    fn into_constant(self) -> Constant {
        if self.is_bytes {
            Constant::Bytes(self.value)
        } else {
            Constant::Str(self.value)
        }
    }
}

/// Decodes the common single-character escapes. Numeric and named escapes
/// are kept verbatim; no detector compares against them.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
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
    use crate::syntax::NodeTag;

    fn parse(source: &str) -> SyntaxTree {
        parse_source(source, Path::new("sample.py")).unwrap()
    }

    fn first_call(tree: &SyntaxTree) -> &Call {
        tree.nodes()
            .find_map(|n| match &n.kind {
                NodeKind::Call(call) => Some(call),
                _ => None,
            })
            .expect("no call in tree")
    }

    #[test]
    fn test_import_with_alias() {
        let tree = parse("import numpy as np, os.path\n");
        assert_eq!(
            tree.body[0].kind,
            NodeKind::Import(vec![
                ImportAlias::new("numpy", Some("np".into())),
                ImportAlias::new("os.path", None),
            ])
        );
    }

    #[test]
    fn test_relative_import_from() {
        let tree = parse("from ..yaml import load as l\n");
        let NodeKind::ImportFrom(from) = &tree.body[0].kind else {
            panic!("expected import-from");
        };
        assert_eq!(from.module.as_deref(), Some("yaml"));
        assert_eq!(from.level, 2);
        assert_eq!(from.names, vec![ImportAlias::new("load", Some("l".into()))]);
    }

    #[test]
    fn test_wildcard_import_binds_nothing() {
        let tree = parse("from os import *\n");
        let NodeKind::ImportFrom(from) = &tree.body[0].kind else {
            panic!("expected import-from");
        };
        assert!(from.names.is_empty());
    }

    #[test]
    fn test_call_arguments_and_keywords() {
        let tree = parse("subprocess.run(cmd, *rest, shell=(True), **opts)\n");
        let call = first_call(&tree);
        assert_eq!(call.func.tag(), NodeTag::Attribute);
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.keywords.len(), 2);
        assert_eq!(
            call.keyword("shell").and_then(Node::as_constant),
            Some(&Constant::Bool(true))
        );
        assert!(call.keywords[1].arg.is_none());
    }

    #[test]
    fn test_string_literals() {
        let tree = parse("hashlib.new('MD' \"5\", data)\n");
        let call = first_call(&tree);
        assert_eq!(
            call.args[0].as_constant(),
            Some(&Constant::Str("MD5".into()))
        );

        let tree = parse("hashlib.new(f\"{algo}\")\n");
        let call = first_call(&tree);
        assert_eq!(call.args[0].tag(), NodeTag::Other);
    }

    #[test]
    fn test_chained_assignment_has_two_targets() {
        let tree = parse("a = b = yaml.SafeLoader\n");
        let NodeKind::Assign(assign) = &tree.body[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(assign.targets.len(), 2);
        assert_eq!(assign.value.tag(), NodeTag::Attribute);
    }

    #[test]
    fn test_calls_inside_definitions_are_reachable() {
        let source = "def f(x):\n    if x:\n        return eval(x)\n";
        let tree = parse(source);
        let call = tree
            .nodes()
            .find(|n| n.tag() == NodeTag::Call)
            .expect("call");
        assert_eq!(call.line, 3);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = parse_source("def broken(:\n    pass\n", Path::new("bad.py")).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    fn additions(terms: usize) -> String {
        format!("x = {}\n", vec!["1"; terms].join(" + "))
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let err = parse_source(&additions(10_000), Path::new("deep.py")).unwrap_err();
        assert!(matches!(
            err,
            ParseError::TooDeep {
                limit: MAX_NESTING_DEPTH,
                ..
            }
        ));
    }

    #[test]
    fn test_moderate_nesting_is_lowered() {
        let tree = parse(&additions(200));
        assert_eq!(tree.body[0].tag(), NodeTag::Assign);
    }

    #[test]
    fn test_unpacking_assignment_names() {
        let tree = parse("a, (b, *c) = d\nobj.x, e[0] = f\n");
        let names: Vec<&[String]> = tree
            .body
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Assign(assign) => Some(assign.names.as_slice()),
                _ => None,
            })
            .collect();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0], ["a", "b", "c"]);
        assert!(names[1].is_empty());
    }

    #[test]
    fn test_rebinding_forms() {
        let source = "for k, v in items:\n    pass\nwith open(p) as fh:\n    pass\nn += 1\nif (m := g()):\n    pass\n";
        let tree = parse(source);
        let rebound: Vec<Vec<String>> = tree
            .nodes()
            .filter_map(|n| match &n.kind {
                NodeKind::Rebind(rebind) => Some(rebind.names.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            rebound,
            vec![
                vec!["k".to_string(), "v".to_string()],
                vec!["fh".to_string()],
                vec!["n".to_string()],
                vec!["m".to_string()],
            ]
        );
    }

    #[test]
    fn test_loop_body_is_reachable_through_rebind() {
        let tree = parse("for x in xs:\n    eval(x)\n");
        assert_eq!(tree.body[0].tag(), NodeTag::Rebind);
        assert!(tree.nodes().any(|n| n.tag() == NodeTag::Call));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb\\c\'"), "a\nb\\c'");
        assert_eq!(unescape(r"\x41"), r"\x41");
    }
}
