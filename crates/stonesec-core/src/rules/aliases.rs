//! Per-file, per-detector alias tracking.
//!
//! Maps local names to what they were bound to by imports (and, for
//! detectors that opt in, by direct assignment) so a call can be matched by
//! canonical identity no matter how the callee was imported or renamed.

use std::collections::HashMap;
use std::fmt;

use crate::syntax::{Assign, ImportAlias, ImportFrom, Node, NodeKind};

/// Canonical dotted reference such as `pickle.loads` or `builtins.eval`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(dotted: impl Into<String>) -> Self {
        Self(dotted.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, attr: &str) -> Self {
        Self(format!("{}.{}", self.0, attr))
    }

    pub fn is_any(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|c| *c == self.0)
    }

    /// Name as a user would write it: builtins lose their namespace.
    pub fn display_name(&self) -> &str {
        self.0.strip_prefix("builtins.").unwrap_or(&self.0)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a local name currently denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// `import m` / `import m as x`
    Module(String),
    /// `from m import s` / `from m import s as x`
    Symbol { module: String, name: String },
    /// Assigned a recognized sentinel, e.g. `L = yaml.SafeLoader`.
    Marker(QualifiedName),
}

impl Binding {
    pub fn target(&self) -> QualifiedName {
        match self {
            Binding::Module(module) => QualifiedName::new(module.clone()),
            Binding::Symbol { module, name } if module.ends_with('.') => {
                QualifiedName::new(format!("{module}{name}"))
            }
            Binding::Symbol { module, name } => QualifiedName::new(format!("{module}.{name}")),
            Binding::Marker(target) => target.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AliasContext {
    bindings: HashMap<String, Binding>,
}

impl AliasContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self, local: &str) -> Option<&Binding> {
        self.bindings.get(local)
    }

    pub fn bind_import(&mut self, aliases: &[ImportAlias]) {
        for alias in aliases {
            match &alias.asname {
                Some(local) => {
                    self.bindings
                        .insert(local.clone(), Binding::Module(alias.name.clone()));
                }
                None => {
                    // `import a.b` binds `a`, and `a.b.f` resolves through it.
                    let root = alias.name.split('.').next().unwrap_or(&alias.name);
                    self.bindings
                        .insert(root.to_string(), Binding::Module(root.to_string()));
                }
            }
        }
    }

    pub fn bind_import_from(&mut self, from: &ImportFrom) {
        // Relative imports keep their leading dots so they never collide
        // with the absolute module they shadow.
        let module = format!(
            "{}{}",
            ".".repeat(from.level),
            from.module.as_deref().unwrap_or_default()
        );
        for alias in &from.names {
            let local = alias.asname.clone().unwrap_or_else(|| alias.name.clone());
            self.bindings.insert(
                local,
                Binding::Symbol {
                    module: module.clone(),
                    name: alias.name.clone(),
                },
            );
        }
    }

    /// Resolve a name or attribute chain to its canonical reference using
    /// the bindings seen so far. Unbound bare names fall through to
    /// `builtins`. Any other expression form is unresolvable.
    pub fn resolve(&self, node: &Node) -> Option<QualifiedName> {
        match &node.kind {
            NodeKind::Name(id) => Some(match self.bindings.get(id) {
                Some(binding) => binding.target(),
                None => QualifiedName::new(format!("builtins.{id}")),
            }),
            NodeKind::Attribute(attr) => self.resolve(&attr.value).map(|q| q.child(&attr.attr)),
            _ => None,
        }
    }

    /// Propagate a sentinel through `name = <expr>`.
    ///
    /// Only a single plain-name target is tracked, and only when the value
    /// resolves to something `is_tracked` accepts. Any other assignment
    /// drops whatever binding each rebound name had, including names
    /// nested in unpacking patterns.
    pub fn track_assignment<F>(&mut self, assign: &Assign, is_tracked: F)
    where
        F: Fn(&QualifiedName) -> bool,
    {
        if let [target] = assign.targets.as_slice() {
            if let Some(local) = target.as_name() {
                match self.resolve(&assign.value) {
                    Some(resolved) if is_tracked(&resolved) => {
                        self.bindings
                            .insert(local.to_string(), Binding::Marker(resolved));
                    }
                    _ => {
                        self.bindings.remove(local);
                    }
                }
                return;
            }
        }

        self.unbind(&assign.names);
    }

    /// Forget the given names; they now hold values nothing tracks.
    pub fn unbind(&mut self, names: &[String]) {
        for name in names {
            self.bindings.remove(name);
        }
    }
}
