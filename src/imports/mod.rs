//! Import statements as structured, classified data
//!
//! - [`NameSpace`]: module path plus imported symbol
//! - [`ModuleTables`]: standard-library / third-party lookup
//! - [`ImportContext`]: per-file conversion into [`LocalImport`]s

pub mod classify;
pub mod namespace;

pub use classify::{ImportContext, LocalImport, ModuleTables, ModuleType};
pub use namespace::NameSpace;
