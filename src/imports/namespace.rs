//! Structured import namespaces

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Module path plus imported symbol, e.g. `from pkg.util import load`
/// becomes `parent = [pkg, util]`, `child = [load]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameSpace {
    pub parent: Vec<String>,
    pub child: Vec<String>,
    /// Leading dots of a relative import, 0 for absolute imports
    pub level: usize,
    pub delimiter: char,
}

impl NameSpace {
    /// Build from dotted strings; leading delimiters of `parent` set `level`
    pub fn new(parent: &str, child: &str, delimiter: char) -> Self {
        let trimmed = parent.trim_start_matches(delimiter);
        Self {
            level: parent.len() - trimmed.len(),
            parent: split(trimmed, delimiter),
            child: split(child, delimiter),
            delimiter,
        }
    }

    /// `parent` as a path relative to the import base
    pub fn to_path(&self) -> PathBuf {
        self.parent.iter().collect()
    }

    /// First segment of the module path
    pub fn root(&self) -> Option<&str> {
        self.parent.first().map(String::as_str)
    }

    pub fn child_name(&self) -> Option<&str> {
        self.child.last().map(String::as_str)
    }

    pub fn is_relative(&self) -> bool {
        self.level > 0
    }
}

fn split(s: &str, delimiter: char) -> Vec<String> {
    s.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

impl fmt::Display for NameSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.level {
            write!(f, "{}", self.delimiter)?;
        }
        let joined: Vec<&str> = self.parent.iter().chain(&self.child).map(String::as_str).collect();
        write!(f, "{}", joined.join(&self.delimiter.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_absolute_namespace() {
        let ns = NameSpace::new("pkg.util", "load", '.');
        assert_eq!(ns.parent, vec!["pkg", "util"]);
        assert_eq!(ns.child, vec!["load"]);
        assert_eq!(ns.level, 0);
        assert_eq!(ns.root(), Some("pkg"));
        assert_eq!(ns.to_path(), Path::new("pkg").join("util"));
        assert_eq!(ns.to_string(), "pkg.util.load");
    }

    #[test]
    fn test_relative_namespace() {
        let ns = NameSpace::new("..models", "User", '.');
        assert_eq!(ns.level, 2);
        assert_eq!(ns.parent, vec!["models"]);
        assert!(ns.is_relative());
        assert_eq!(ns.to_string(), "..models.User");

        let bare = NameSpace::new(".", "sibling", '.');
        assert_eq!(bare.level, 1);
        assert!(bare.parent.is_empty());
        assert_eq!(bare.root(), None);
        assert_eq!(bare.to_string(), ".sibling");
    }

    #[test]
    fn test_plain_import_has_no_child() {
        let ns = NameSpace::new("os.path", "", '.');
        assert!(ns.child.is_empty());
        assert_eq!(ns.child_name(), None);
        assert_eq!(ns.to_string(), "os.path");
    }
}
