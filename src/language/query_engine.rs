//! Tree-sitter capture engine
//!
//! Runs a language's capture query over a parsed file and flattens the
//! result into the ordered `(range, tag)` stream the scope graph builder
//! consumes. Capture names in the `.scm` file are the tags.

use super::Language;
use crate::range::TextRange;
use crate::scope::builder::{Capture, FileCaptures};
use crate::{Error, Result};
use tree_sitter::{Parser, Query, QueryCursor};

/// Source of ordered captures for a single file
pub trait CaptureEngine: Send + Sync {
    fn language(&self) -> &'static Language;

    fn captures(&self, source: &[u8]) -> Result<FileCaptures>;
}

/// A capture engine backed by a compiled tree-sitter query
pub struct QueryEngine {
    language: &'static Language,
    grammar: tree_sitter::Language,
    query: Query,
}

impl QueryEngine {
    pub fn new(language: &'static Language) -> Result<Self> {
        let grammar = language.grammar();
        let query = Query::new(&grammar, language.query_source)
            .map_err(|e| Error::Query(format!("{} query: {}", language.name, e)))?;

        Ok(Self { language, grammar, query })
    }

    /// Create a Python engine with the embedded query
    pub fn python() -> Result<Self> {
        Self::new(&super::PYTHON)
    }
}

impl CaptureEngine for QueryEngine {
    fn language(&self) -> &'static Language {
        self.language
    }

    fn captures(&self, source: &[u8]) -> Result<FileCaptures> {
        // parsers are cheap and not Sync, so each call gets its own
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| Error::Parse(format!("Failed to set language: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::Parse("Failed to parse file".to_string()))?;
        let root = tree.root_node();

        let end = root.end_position();
        let file_range = TextRange::new(0, source.len(), (0, 0), (end.row, end.column));

        let names = self.query.capture_names();
        let mut cursor = QueryCursor::new();
        let captures = cursor
            .captures(&self.query, root, source)
            .map(|(query_match, index)| {
                let capture = query_match.captures[index];
                Capture::new(capture.node.range().into(), names[capture.index as usize])
            })
            .collect();

        Ok(FileCaptures { root: file_range, captures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(source: &str) -> Vec<(String, String)> {
        let engine = QueryEngine::python().unwrap();
        let captures = engine.captures(source.as_bytes()).unwrap();
        captures
            .captures
            .iter()
            .map(|c| (c.tag.clone(), c.range.text(source.as_bytes())))
            .collect()
    }

    #[test]
    fn test_query_compiles() {
        assert!(QueryEngine::python().is_ok());
    }

    #[test]
    fn test_function_captures() {
        let tags = tags("def greet(name):\n    return name\n");
        assert!(tags.contains(&("hoisted.definition.function".into(), "greet".into())));
        assert!(tags.contains(&("local.definition.parameter".into(), "name".into())));
        assert!(tags.contains(&("local.reference".into(), "name".into())));
        assert!(tags.iter().any(|(tag, _)| tag == "local.scope"));
    }

    #[test]
    fn test_import_captures() {
        let tags = tags("from pkg.util import load as ld\nimport os\n");
        assert!(tags.contains(&("local.import.from_name".into(), "pkg.util".into())));
        assert!(tags.contains(&("local.import.name".into(), "load".into())));
        assert!(tags.contains(&("local.import.alias".into(), "ld".into())));
        assert!(tags.contains(&("local.import.name".into(), "os".into())));
    }

    #[test]
    fn test_root_range_covers_file() {
        let source = "x = 1\ny = x\n";
        let engine = QueryEngine::python().unwrap();
        let captures = engine.captures(source.as_bytes()).unwrap();
        assert_eq!(captures.root.start_byte, 0);
        assert_eq!(captures.root.end_byte, source.len());
    }
}
