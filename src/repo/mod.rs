//! Repository level: file access and the cross-file graph

pub mod fs;
pub mod graph;

pub use fs::{RepoFiles, RepoFs};
pub use graph::{MissingImportsReport, RepoGraph, RepoGraphOptions, RepoGraphStats, RepoNode, RepoNodeId};
