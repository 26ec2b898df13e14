//! Scope Graph data structure for name binding
//!
//! One graph per file. Every node is one of:
//! - a lexical scope (the root scope spans the whole file)
//! - a definition bound in some scope
//! - a reference that needs resolution
//! - an import statement
//!
//! Nodes live in a single arena and are never removed, so node ids are
//! assigned monotonically and stay valid for the lifetime of the graph.
//! Every non-root node has exactly one outgoing containment edge pointing
//! at the scope that owns it.

use crate::edge::EdgeKind;
use crate::range::TextRange;
use crate::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a node within a single file's scope graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root scope of every graph
    pub fn root() -> Self {
        Self(0)
    }
}

impl From<NodeIndex> for NodeId {
    fn from(index: NodeIndex) -> Self {
        Self(index.index())
    }
}

impl From<NodeId> for NodeIndex {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visibility policy of a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hoisting {
    /// Visible from every scope in the file
    Global,
    /// Visible in the whole enclosing scope regardless of textual order
    Hoisted,
    /// Visible in the declaring scope and its descendants
    Local,
}

impl Hoisting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hoisting::Global => "global",
            Hoisting::Hoisted => "hoisted",
            Hoisting::Local => "local",
        }
    }
}

impl FromStr for Hoisting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Hoisting::Global),
            "hoisted" | "hoist" => Ok(Hoisting::Hoisted),
            "local" => Ok(Hoisting::Local),
            _ => Err(Error::Parse(format!("Unknown hoisting kind: {}", s))),
        }
    }
}

/// A name bound in some scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDef {
    /// The bound identifier
    pub symbol_name: Option<String>,
    /// Kind of binding (`class`, `function`, `variable`, ...)
    pub def_type: Option<String>,
    pub hoisting: Hoisting,
}

impl LocalDef {
    pub fn new(symbol_name: Option<String>, def_type: Option<String>, hoisting: Hoisting) -> Self {
        Self { symbol_name, def_type, hoisting }
    }

    /// `true` for `class` and `function` definitions
    pub fn is_exportable(&self) -> bool {
        matches!(self.def_type.as_deref(), Some("class") | Some("function"))
    }
}

/// A use of a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub symbol_name: Option<String>,
    /// Optional hint from the capture tag (e.g. `call`)
    pub kind: Option<String>,
}

impl Reference {
    pub fn new(symbol_name: Option<String>, kind: Option<String>) -> Self {
        Self { symbol_name, kind }
    }
}

/// An import statement of the form `from <from_name> import <names> as <aliases>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStmt {
    pub from_name: Vec<String>,
    pub names: Vec<String>,
    /// Aligned with `names`
    pub aliases: Vec<Option<String>>,
}

impl ImportStmt {
    /// Alias bound for the name at `index`, if any
    pub fn alias(&self, index: usize) -> Option<&str> {
        self.aliases.get(index).and_then(|a| a.as_deref())
    }
}

impl fmt::Display for ImportStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.from_name.is_empty() {
            write!(f, "from {} ", self.from_name.join(", "))?;
        }
        let names: Vec<String> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| match self.alias(i) {
                Some(alias) => format!("{} as {}", name, alias),
                None => name.clone(),
            })
            .collect();
        write!(f, "import {}", names.join(", "))
    }
}

/// Per-kind payload of a scope graph node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Scope,
    Definition(LocalDef),
    Reference(Reference),
    Import(ImportStmt),
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scope => "scope",
            NodeKind::Definition(_) => "definition",
            NodeKind::Reference(_) => "reference",
            NodeKind::Import(_) => "import",
        }
    }

    /// Edge connecting a node of this kind to its owning scope
    fn containment_edge(&self) -> EdgeKind {
        match self {
            NodeKind::Scope => EdgeKind::ScopeToScope,
            NodeKind::Definition(_) => EdgeKind::ScopeToDefinition,
            NodeKind::Reference(_) => EdgeKind::ScopeToReference,
            NodeKind::Import(_) => EdgeKind::ScopeToImport,
        }
    }
}

/// A node in the scope graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeNode {
    pub range: TextRange,
    pub kind: NodeKind,
}

impl ScopeNode {
    pub fn new(range: TextRange, kind: NodeKind) -> Self {
        Self { range, kind }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self.kind, NodeKind::Scope)
    }

    /// The symbol name carried by definitions and references
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Definition(def) => def.symbol_name.as_deref(),
            NodeKind::Reference(reference) => reference.symbol_name.as_deref(),
            _ => None,
        }
    }
}

/// Scope graph for a single file
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    graph: DiGraph<ScopeNode, EdgeKind>,
    root: NodeId,
}

impl ScopeGraph {
    /// Create a graph with a single root scope spanning `range`
    pub fn new(range: TextRange) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(ScopeNode::new(range, NodeKind::Scope)).into();
        Self { graph, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get_node(&self, id: NodeId) -> Option<&ScopeNode> {
        self.graph.node_weight(id.into())
    }

    /// Insert a scope under the smallest existing scope that contains it
    pub fn insert_local_scope(&mut self, range: TextRange) -> Result<NodeId> {
        self.insert_contained(ScopeNode::new(range, NodeKind::Scope))
    }

    pub fn insert_definition(&mut self, range: TextRange, def: LocalDef) -> Result<NodeId> {
        self.insert_contained(ScopeNode::new(range, NodeKind::Definition(def)))
    }

    pub fn insert_reference(&mut self, range: TextRange, reference: Reference) -> Result<NodeId> {
        self.insert_contained(ScopeNode::new(range, NodeKind::Reference(reference)))
    }

    pub fn insert_import(&mut self, range: TextRange, import: ImportStmt) -> Result<NodeId> {
        self.insert_contained(ScopeNode::new(range, NodeKind::Import(import)))
    }

    fn insert_contained(&mut self, node: ScopeNode) -> Result<NodeId> {
        let parent = self
            .scope_by_range(&node.range, self.root)
            .ok_or(Error::OutOfBounds(node.range))?;
        let edge = node.kind.containment_edge();
        let id = self.graph.add_node(node);
        self.graph.add_edge(id, parent.into(), edge);
        Ok(id.into())
    }

    /// Smallest scope at or below `start` whose range contains `range`.
    ///
    /// Children are searched depth-first in insertion order; the first child
    /// subtree containing the range wins.
    pub fn scope_by_range(&self, range: &TextRange, start: NodeId) -> Option<NodeId> {
        let node = self.get_node(start)?;
        if !node.range.contains(range) {
            return None;
        }
        for child in self.child_scopes(start) {
            if let Some(found) = self.scope_by_range(range, child) {
                return Some(found);
            }
        }
        Some(start)
    }

    /// Walk from `start` up to the root scope.
    ///
    /// Non-scope nodes start the walk at their owning scope.
    pub fn scope_stack(&self, start: NodeId) -> ScopeStack<'_> {
        let next = match self.get_node(start) {
            Some(node) if node.is_scope() => Some(start),
            Some(_) => self.owning_scope(start),
            None => None,
        };
        ScopeStack { graph: self, next }
    }

    /// Parent scope of a scope, `None` for the root
    pub fn parent(&self, scope: NodeId) -> Option<NodeId> {
        self.graph
            .edges_directed(scope.into(), Direction::Outgoing)
            .find(|edge| *edge.weight() == EdgeKind::ScopeToScope)
            .map(|edge| edge.target().into())
    }

    /// Scope that directly contains `node`
    pub fn owning_scope(&self, node: NodeId) -> Option<NodeId> {
        self.graph
            .edges_directed(node.into(), Direction::Outgoing)
            .find(|edge| edge.weight().is_containment())
            .map(|edge| edge.target().into())
    }

    fn contained(&self, scope: NodeId, kind: EdgeKind) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .graph
            .edges_directed(scope.into(), Direction::Incoming)
            .filter(|edge| *edge.weight() == kind)
            .map(|edge| edge.source().into())
            .collect();
        // petgraph yields the most recent edge first
        ids.sort_unstable();
        ids
    }

    pub fn child_scopes(&self, scope: NodeId) -> Vec<NodeId> {
        self.contained(scope, EdgeKind::ScopeToScope)
    }

    pub fn definitions(&self, scope: NodeId) -> Vec<NodeId> {
        self.contained(scope, EdgeKind::ScopeToDefinition)
    }

    pub fn references(&self, scope: NodeId) -> Vec<NodeId> {
        self.contained(scope, EdgeKind::ScopeToReference)
    }

    pub fn imports(&self, scope: NodeId) -> Vec<NodeId> {
        self.contained(scope, EdgeKind::ScopeToImport)
    }

    pub fn definition(&self, id: NodeId) -> Option<&LocalDef> {
        match &self.get_node(id)?.kind {
            NodeKind::Definition(def) => Some(def),
            _ => None,
        }
    }

    pub fn reference(&self, id: NodeId) -> Option<&Reference> {
        match &self.get_node(id)?.kind {
            NodeKind::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn import(&self, id: NodeId) -> Option<&ImportStmt> {
        match &self.get_node(id)?.kind {
            NodeKind::Import(import) => Some(import),
            _ => None,
        }
    }

    fn nodes_where<'a>(&'a self, pred: impl Fn(&NodeKind) -> bool + 'a) -> impl Iterator<Item = NodeId> + 'a {
        self.graph
            .node_indices()
            .filter(move |idx| pred(&self.graph[*idx].kind))
            .map(NodeId::from)
    }

    pub fn all_scopes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_where(|kind| matches!(kind, NodeKind::Scope))
    }

    pub fn all_definitions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_where(|kind| matches!(kind, NodeKind::Definition(_)))
    }

    pub fn all_references(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_where(|kind| matches!(kind, NodeKind::Reference(_)))
    }

    /// Import statements with their node ids, in insertion order
    pub fn all_imports(&self) -> impl Iterator<Item = (NodeId, &ImportStmt)> + '_ {
        self.graph.node_indices().filter_map(move |idx| match &self.graph[idx].kind {
            NodeKind::Import(import) => Some((idx.into(), import)),
            _ => None,
        })
    }

    /// All edges as `(from, to, kind)`, in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, EdgeKind)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().into(), edge.target().into(), *edge.weight()))
    }

    /// Debug dump with one line per edge
    pub fn to_str(&self) -> String {
        self.edges()
            .map(|(from, to, kind)| format!("{} --{}-> {}\n", from, kind, to))
            .collect()
    }
}

/// Iterator over the scopes enclosing a starting scope, innermost first
#[derive(Debug, Clone)]
pub struct ScopeStack<'a> {
    graph: &'a ScopeGraph,
    next: Option<NodeId>,
}

impl Iterator for ScopeStack<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.graph.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(start: usize, end: usize) -> TextRange {
        TextRange::new(start, end, (start, 0), (end, 0))
    }

    #[test]
    fn test_parent_scope() {
        let mut graph = ScopeGraph::new(lines(1, 6));

        graph.insert_local_scope(lines(1, 5)).unwrap();
        graph.insert_local_scope(lines(2, 4)).unwrap();
        graph.insert_local_scope(lines(3, 4)).unwrap();
        graph.insert_local_scope(lines(1, 4)).unwrap();

        let expected = "\
1 --ScopeToScope-> 0
2 --ScopeToScope-> 1
3 --ScopeToScope-> 2
4 --ScopeToScope-> 1
";
        assert_eq!(graph.to_str(), expected);
    }

    #[test]
    fn test_containment_never_points_inward() {
        let mut graph = ScopeGraph::new(lines(0, 100));
        let outer = graph.insert_local_scope(lines(10, 50)).unwrap();
        let inner = graph.insert_local_scope(lines(20, 30)).unwrap();

        assert_eq!(graph.parent(inner), Some(outer));
        assert_eq!(graph.parent(outer), Some(NodeId::root()));
        assert_eq!(graph.parent(NodeId::root()), None);
        for (from, to, _) in graph.edges() {
            let child = graph.get_node(from).unwrap();
            let parent = graph.get_node(to).unwrap();
            assert!(parent.range.contains(&child.range));
        }
    }

    #[test]
    fn test_out_of_bounds_scope_is_rejected() {
        let mut graph = ScopeGraph::new(lines(0, 10));
        let err = graph.insert_local_scope(lines(5, 20)).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds(_)));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_scope_stack_walks_to_root() {
        let mut graph = ScopeGraph::new(lines(0, 100));
        let s1 = graph.insert_local_scope(lines(10, 90)).unwrap();
        let s2 = graph.insert_local_scope(lines(20, 80)).unwrap();
        let s3 = graph.insert_local_scope(lines(30, 40)).unwrap();

        let stack = graph.scope_stack(s3);
        assert_eq!(stack.clone().collect::<Vec<_>>(), vec![s3, s2, s1, NodeId::root()]);
        // restartable
        assert_eq!(stack.count(), 4);
    }

    #[test]
    fn test_nodes_attach_to_smallest_scope() {
        let mut graph = ScopeGraph::new(lines(0, 100));
        let func = graph.insert_local_scope(lines(10, 50)).unwrap();
        let def = graph
            .insert_definition(lines(12, 13), LocalDef::new(Some("x".into()), Some("variable".into()), Hoisting::Local))
            .unwrap();
        let reference = graph
            .insert_reference(lines(60, 61), Reference::new(Some("x".into()), None))
            .unwrap();

        assert_eq!(graph.definitions(func), vec![def]);
        assert_eq!(graph.references(NodeId::root()), vec![reference]);
        assert_eq!(graph.owning_scope(def), Some(func));
        assert_eq!(graph.scope_stack(def).collect::<Vec<_>>(), vec![func, NodeId::root()]);
        assert_eq!(graph.get_node(def).unwrap().name(), Some("x"));
    }

    #[test]
    fn test_child_scopes_in_insertion_order() {
        let mut graph = ScopeGraph::new(lines(0, 100));
        let a = graph.insert_local_scope(lines(10, 20)).unwrap();
        let b = graph.insert_local_scope(lines(30, 40)).unwrap();
        let c = graph.insert_local_scope(lines(50, 60)).unwrap();
        assert_eq!(graph.child_scopes(NodeId::root()), vec![a, b, c]);
    }

    #[test]
    fn test_import_display() {
        let import = ImportStmt {
            from_name: vec!["pkg.util".into()],
            names: vec!["load".into(), "dump".into()],
            aliases: vec![None, Some("save".into())],
        };
        assert_eq!(import.to_string(), "from pkg.util import load, dump as save");
    }
}
