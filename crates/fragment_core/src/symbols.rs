//! Code symbols as reported by the code-intelligence service.

use crate::files::ProjectFile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of declaration a [`CodeUnit`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeUnitKind {
    Class,
    Function,
    Field,
    Module,
}

/// A declared symbol: where it lives and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeUnit {
    pub source: ProjectFile,
    pub kind: CodeUnitKind,
    /// Enclosing namespace (package, module path); empty for the root namespace.
    pub namespace: String,
    /// Name within the namespace, e.g. `Outer.Inner` or `Foo.bar`.
    pub short_name: String,
}

impl CodeUnit {
    pub fn new(source: ProjectFile, kind: CodeUnitKind, namespace: &str, short_name: &str) -> Self {
        Self {
            source,
            kind,
            namespace: namespace.to_string(),
            short_name: short_name.to_string(),
        }
    }

    /// Fully qualified name.
    pub fn fq_name(&self) -> String {
        if self.namespace.is_empty() {
            self.short_name.clone()
        } else {
            format!("{}.{}", self.namespace, self.short_name)
        }
    }
}

impl fmt::Display for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fq_name())
    }
}

/// One place where a symbol is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageHit {
    /// The enclosing declaration containing the use.
    pub enclosing: CodeUnit,
    /// Source excerpt around the use.
    pub snippet: String,
}

/// Direction of a call-graph query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    /// Who calls the method.
    Callers,
    /// What the method calls.
    Callees,
}

impl CallDirection {
    pub fn from_callee_flag(is_callee_graph: bool) -> Self {
        if is_callee_graph {
            CallDirection::Callees
        } else {
            CallDirection::Callers
        }
    }

    pub fn is_callee_graph(&self) -> bool {
        matches!(self, CallDirection::Callees)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CallDirection::Callers => "Callers",
            CallDirection::Callees => "Callees",
        }
    }
}

/// One edge of a call graph, attributed to the method it leads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Method the edge starts at (the queried method or a deeper node).
    pub from: String,
    /// The method on the other side of the edge.
    pub target: CodeUnit,
    /// The line containing the call.
    pub source_line: String,
}
