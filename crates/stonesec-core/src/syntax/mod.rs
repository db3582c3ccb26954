//! Syntax tree consumed by the rule engine.
//!
//! The tree is a closed set of node kinds. Only the constructs detectors
//! react to (imports, assignments, rebinding statements, calls) and the expressions needed to
//! resolve a callee (names, attribute chains, literals) get their own
//! variant; everything else is an [`NodeKind::Other`] that keeps its
//! children in document order so nested calls are still visited.

pub mod python;

pub use python::{parse_file, parse_source, ParseError};

/// A parsed source unit. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub body: Vec<Node>,
}

impl SyntaxTree {
    pub fn new(body: Vec<Node>) -> Self {
        Self { body }
    }

    /// Depth-first, pre-order iteration over every node in the tree.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            stack: self.body.iter().rev().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// 1-based source line where the node starts.
    pub line: usize,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(line: usize, kind: NodeKind) -> Self {
        Self { line, kind }
    }

    pub fn tag(&self) -> NodeTag {
        match &self.kind {
            NodeKind::Import(_) => NodeTag::Import,
            NodeKind::ImportFrom(_) => NodeTag::ImportFrom,
            NodeKind::Assign(_) => NodeTag::Assign,
            NodeKind::Rebind(_) => NodeTag::Rebind,
            NodeKind::Call(_) => NodeTag::Call,
            NodeKind::Name(_) => NodeTag::Name,
            NodeKind::Attribute(_) => NodeTag::Attribute,
            NodeKind::Constant(_) => NodeTag::Constant,
            NodeKind::Other(_) => NodeTag::Other,
        }
    }

    /// Direct children in traversal order.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::Import(_) | NodeKind::ImportFrom(_) => Vec::new(),
            NodeKind::Name(_) | NodeKind::Constant(_) => Vec::new(),
            NodeKind::Assign(assign) => assign
                .targets
                .iter()
                .chain(std::iter::once(assign.value.as_ref()))
                .collect(),
            NodeKind::Call(call) => std::iter::once(call.func.as_ref())
                .chain(call.args.iter())
                .chain(call.keywords.iter().map(|kw| &kw.value))
                .collect(),
            NodeKind::Attribute(attr) => vec![attr.value.as_ref()],
            NodeKind::Rebind(rebind) => rebind.body.iter().collect(),
            NodeKind::Other(children) => children.iter().collect(),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Name(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            NodeKind::Constant(value) => Some(value),
            _ => None,
        }
    }
}

/// Payload-free discriminant of [`NodeKind`], used by detectors to declare
/// which kinds they react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Import,
    ImportFrom,
    Assign,
    Rebind,
    Call,
    Name,
    Attribute,
    Constant,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `import a.b as c, d`
    Import(Vec<ImportAlias>),
    /// `from m import a as b`
    ImportFrom(ImportFrom),
    Assign(Assign),
    Rebind(Rebind),
    Call(Call),
    Name(String),
    Attribute(Attribute),
    Constant(Constant),
    /// Any construct the engine has no dedicated kind for.
    Other(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlias {
    /// Dotted name as written, e.g. `xml.etree.ElementTree`.
    pub name: String,
    pub asname: Option<String>,
}

impl ImportAlias {
    pub fn new(name: impl Into<String>, asname: Option<String>) -> Self {
        Self {
            name: name.into(),
            asname,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFrom {
    /// Module path without leading dots; `None` for `from . import x`.
    pub module: Option<String>,
    /// Number of leading dots (0 for absolute imports).
    pub level: usize,
    /// Empty for `from m import *`.
    pub names: Vec<ImportAlias>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    /// More than one target for chained `a = b = value`.
    pub targets: Vec<Node>,
    pub value: Box<Node>,
    /// Every plain name the targets rebind, including names inside
    /// unpacking patterns such as `a, (b, *c) = ...`.
    pub names: Vec<String>,
}

/// A statement or expression that rebinds names to values the engine does
/// not track: `for` targets, `as` targets, `:=` and augmented assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Rebind {
    pub names: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Node>,
    pub args: Vec<Node>,
    pub keywords: Vec<Keyword>,
}

impl Call {
    /// Value of the keyword argument named `name`, if passed explicitly.
    pub fn keyword(&self, name: &str) -> Option<&Node> {
        self.keywords
            .iter()
            .find(|kw| kw.arg.as_deref() == Some(name))
            .map(|kw| &kw.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// `None` for `**kwargs`.
    pub arg: Option<String>,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub value: Box<Node>,
    pub attr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Str(String),
    Bytes(String),
    Int(String),
    Float(String),
    Ellipsis,
}

pub struct Nodes<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(line: usize, id: &str) -> Node {
        Node::new(line, NodeKind::Name(id.to_string()))
    }

    #[test]
    fn test_preorder_visits_call_before_arguments() {
        let inner = Node::new(
            1,
            NodeKind::Call(Call {
                func: Box::new(name(1, "g")),
                args: vec![],
                keywords: vec![],
            }),
        );
        let outer = Node::new(
            1,
            NodeKind::Call(Call {
                func: Box::new(name(1, "f")),
                args: vec![inner],
                keywords: vec![],
            }),
        );
        let tree = SyntaxTree::new(vec![outer]);

        let tags: Vec<NodeTag> = tree.nodes().map(Node::tag).collect();
        assert_eq!(
            tags,
            vec![NodeTag::Call, NodeTag::Name, NodeTag::Call, NodeTag::Name]
        );
    }

    #[test]
    fn test_keyword_lookup_ignores_double_star() {
        let call = Call {
            func: Box::new(name(1, "f")),
            args: vec![],
            keywords: vec![
                Keyword {
                    arg: None,
                    value: name(1, "opts"),
                },
                Keyword {
                    arg: Some("shell".into()),
                    value: Node::new(1, NodeKind::Constant(Constant::Bool(true))),
                },
            ],
        };
        assert_eq!(
            call.keyword("shell").and_then(Node::as_constant),
            Some(&Constant::Bool(true))
        );
        assert!(call.keyword("opts").is_none());
    }
}
