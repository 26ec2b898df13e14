//! Local reference resolver
//!
//! Resolution algorithm for a reference `r` owned by scope `s`:
//! 1. Walk outward from `s` to the root
//! 2. In each scope, look for a definition with the same name that is
//!    visible from `r` under its hoisting kind
//! 3. First (innermost) match wins, which gives normal shadowing
//! 4. Otherwise fall back to `Global` definitions anywhere in the file
//! 5. Still nothing: the reference is unresolved and left for cross-file
//!    resolution
//!
//! A `Hoisted` definition is also visible one level up. Function and class
//! names sit inside the span of the scope they introduce, so the builder
//! places them in that scope; lifting makes them visible to their siblings.
//! The lift applies inside classes too, so a bare method name resolves from
//! a sibling method even though Python would not bind it there.

use super::graph::{Hoisting, NodeId, ScopeGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether `Local` definitions must precede a reference to be visible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalVisibility {
    /// Every local definition in an enclosing scope is visible
    #[default]
    Unordered,
    /// A local definition is visible only after the point it is declared
    Ordered,
}

/// Outcome of resolving every reference in a file
#[derive(Debug, Clone, Default)]
pub struct LocalResolution {
    bindings: BTreeMap<NodeId, NodeId>,
    unresolved: Vec<NodeId>,
}

impl LocalResolution {
    /// The definition a reference resolved to
    pub fn definition_of(&self, reference: NodeId) -> Option<NodeId> {
        self.bindings.get(&reference).copied()
    }

    /// Every reference bound to `definition`, in source order
    pub fn references_of(&self, definition: NodeId) -> Vec<NodeId> {
        self.bindings
            .iter()
            .filter(|(_, def)| **def == definition)
            .map(|(reference, _)| *reference)
            .collect()
    }

    /// References with no visible definition in the file
    pub fn unresolved(&self) -> &[NodeId] {
        &self.unresolved
    }

    pub fn bindings(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.bindings.iter().map(|(r, d)| (*r, *d))
    }

    pub fn resolved_count(&self) -> usize {
        self.bindings.len()
    }
}

/// Name resolver over a single scope graph
pub struct LocalResolver<'a> {
    graph: &'a ScopeGraph,
    visibility: LocalVisibility,
}

impl<'a> LocalResolver<'a> {
    pub fn new(graph: &'a ScopeGraph, visibility: LocalVisibility) -> Self {
        Self { graph, visibility }
    }

    /// Resolve every reference in the graph
    pub fn resolve_all(&self) -> LocalResolution {
        let mut resolution = LocalResolution::default();
        for reference in self.graph.all_references() {
            match self.resolve_reference(reference) {
                Some(def) => {
                    resolution.bindings.insert(reference, def);
                }
                None => resolution.unresolved.push(reference),
            }
        }
        resolution
    }

    /// Resolve a single reference node to its definition node
    pub fn resolve_reference(&self, reference: NodeId) -> Option<NodeId> {
        let node = self.graph.get_node(reference)?;
        let name = self.graph.reference(reference)?.symbol_name.as_deref()?;
        let ref_start = node.range.start_byte;

        for scope in self.graph.scope_stack(reference) {
            if let Some(def) = self.lookup_in_scope(scope, name, ref_start) {
                return Some(def);
            }
        }

        self.graph.all_definitions().find(|id| {
            self.graph
                .definition(*id)
                .is_some_and(|def| def.hoisting == Hoisting::Global && def.symbol_name.as_deref() == Some(name))
        })
    }

    /// Visible definition of `name` declared in `scope` or lifted from its children
    fn lookup_in_scope(&self, scope: NodeId, name: &str, ref_start: usize) -> Option<NodeId> {
        let mut hoisted = None;
        let mut local = None;

        for id in self.graph.definitions(scope) {
            let Some(def) = self.graph.definition(id) else { continue };
            if def.symbol_name.as_deref() != Some(name) {
                continue;
            }
            match def.hoisting {
                Hoisting::Global | Hoisting::Hoisted => {
                    hoisted.get_or_insert(id);
                }
                Hoisting::Local => match self.visibility {
                    LocalVisibility::Unordered => {
                        local.get_or_insert(id);
                    }
                    LocalVisibility::Ordered => {
                        let declared_at = self.graph.get_node(id)?.range.start_byte;
                        // the latest binding before the reference shadows earlier ones
                        if declared_at <= ref_start {
                            local = Some(id);
                        }
                    }
                },
            }
        }

        if let Some(found) = local.or(hoisted) {
            return Some(found);
        }

        self.graph
            .child_scopes(scope)
            .into_iter()
            .flat_map(|child| self.graph.definitions(child))
            .find(|id| {
                self.graph
                    .definition(*id)
                    .is_some_and(|def| def.hoisting == Hoisting::Hoisted && def.symbol_name.as_deref() == Some(name))
            })
    }
}
