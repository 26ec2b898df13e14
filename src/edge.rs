//! Edge types
//!
//! Containment edges point from a contained node to the scope that owns it:
//! - `ScopeToScope`: child scope → parent scope
//! - `ScopeToDefinition`: definition → declaring scope
//! - `ScopeToReference`: reference → enclosing scope
//! - `ScopeToImport`: import statement → enclosing scope
//!
//! The repository graph adds one more:
//! - `ImportToExport`: referencing scope in one file → exporting scope in another

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of directed edges in scope and repository graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    ScopeToScope,
    ScopeToDefinition,
    ScopeToReference,
    ScopeToImport,
    ImportToExport,
}

impl EdgeKind {
    /// Get the string representation of the edge kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::ScopeToScope => "ScopeToScope",
            EdgeKind::ScopeToDefinition => "ScopeToDefinition",
            EdgeKind::ScopeToReference => "ScopeToReference",
            EdgeKind::ScopeToImport => "ScopeToImport",
            EdgeKind::ImportToExport => "ImportToExport",
        }
    }

    /// Get all edge kinds
    pub fn all() -> &'static [EdgeKind] {
        &[
            EdgeKind::ScopeToScope,
            EdgeKind::ScopeToDefinition,
            EdgeKind::ScopeToReference,
            EdgeKind::ScopeToImport,
            EdgeKind::ImportToExport,
        ]
    }

    /// Containment edges live inside a single file's scope graph
    pub fn is_containment(&self) -> bool {
        !matches!(self, EdgeKind::ImportToExport)
    }
}

impl FromStr for EdgeKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Parse(format!("Unknown edge kind: {}", s)))
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
