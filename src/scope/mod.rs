//! Scope Graph - per-file name binding model
//!
//! The capture engine emits tagged spans, the builder turns them into a
//! scope graph, and the resolver binds references to definitions within
//! the file.

pub mod builder;
pub mod graph;
pub mod resolver;

pub use builder::{build_scope_graph, Capture, FileCaptures};
pub use graph::{Hoisting, ImportStmt, LocalDef, NodeId, NodeKind, Reference, ScopeGraph, ScopeNode};
pub use resolver::{LocalResolution, LocalResolver, LocalVisibility};
