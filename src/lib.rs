//! # Reposcope - Repository scope graphs
//!
//! Name binding for a whole repository without type checking.
//!
//! Reposcope provides:
//! - Per-file scope graphs built from tree-sitter capture queries
//! - Local reference resolution with hoisting rules
//! - Import classification (local / system / third-party)
//! - A repository graph linking referencing scopes to the exports of other files
//! - Diagnostics for imports that could not be matched

pub mod range;
pub mod edge;
pub mod scope;
pub mod imports;
pub mod language;
pub mod repo;
pub mod config;
pub mod ignore;

// Re-exports for convenient access
pub use edge::EdgeKind;
pub use range::{Point, TextRange};
pub use repo::{RepoGraph, RepoGraphOptions, RepoNode, RepoNodeId};
pub use scope::{NodeId, ScopeGraph};

/// Result type alias for Reposcope operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Reposcope operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Repository not found: {0}")]
    RepoNotFound(std::path::PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Range {0} lies outside the root scope")]
    OutOfBounds(TextRange),
}
