//! Language support
//!
//! A [`Language`] is a static descriptor: which files it handles, how its
//! import paths are delimited, which file stem marks a package aggregator,
//! and the capture query that feeds the scope graph builder.

pub mod query_engine;

pub use query_engine::{CaptureEngine, QueryEngine};

use std::path::Path;

/// Static description of a supported language
#[derive(Debug)]
pub struct Language {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    /// Separator of dotted import paths
    pub namespace_delimiter: char,
    /// File stem that re-exports a package (`__init__` for Python)
    pub aggregator_stem: &'static str,
    /// Capture query emitting the scope graph tag grammar
    pub query_source: &'static str,
    /// JSON table of standard library modules
    pub system_modules: &'static str,
    /// JSON table of well-known third-party modules
    pub third_party_modules: &'static str,
    grammar: fn() -> tree_sitter::Language,
}

fn python_grammar() -> tree_sitter::Language {
    tree_sitter_python::LANGUAGE.into()
}

pub static PYTHON: Language = Language {
    name: "python",
    extensions: &["py", "pyi"],
    namespace_delimiter: '.',
    aggregator_stem: "__init__",
    query_source: include_str!("../../queries/python.scm"),
    system_modules: include_str!("../../data/python/sys_modules.json"),
    third_party_modules: include_str!("../../data/python/third_party_modules.json"),
    grammar: python_grammar,
};

static ALL: [&Language; 1] = [&PYTHON];

impl Language {
    pub fn all() -> &'static [&'static Language] {
        &ALL
    }

    /// Look up a language by name, case-insensitively
    pub fn from_name(name: &str) -> Option<&'static Language> {
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.name.eq_ignore_ascii_case(name))
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        (self.grammar)()
    }

    pub fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// `true` for package aggregator files such as `pkg/__init__.py`
    pub fn is_aggregator(&self, path: &Path) -> bool {
        self.can_handle(path) && path.file_stem().and_then(|s| s.to_str()) == Some(self.aggregator_stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert!(std::ptr::eq(Language::from_name("Python").unwrap(), &PYTHON));
        assert!(Language::from_name("cobol").is_none());
    }

    #[test]
    fn test_python_file_detection() {
        assert!(PYTHON.can_handle(Path::new("pkg/util.py")));
        assert!(PYTHON.can_handle(Path::new("stubs/util.pyi")));
        assert!(!PYTHON.can_handle(Path::new("README.md")));
        assert!(PYTHON.is_aggregator(Path::new("pkg/__init__.py")));
        assert!(!PYTHON.is_aggregator(Path::new("pkg/init.py")));
    }
}
