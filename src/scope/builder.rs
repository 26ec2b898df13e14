//! Capture-to-graph builder
//!
//! Turns the flat capture stream of a syntax query engine into a
//! [`ScopeGraph`]. Capture tags follow a dotted naming convention:
//! - `local.scope` → lexical scope
//! - `{global|hoisted|local}.definition[.<def_type>]` → definition
//! - `local.reference[.<kind>]` → reference
//! - `local.import` → import statement
//! - `local.import.{from_name|name|alias}` → parts of the enclosing import
//!
//! Anything else is ignored, so query files can grow new captures without
//! breaking older builders.
//!
//! Placement depends on the scopes that already exist, so insertion happens
//! in four stages: scopes, imports, definitions, references. The stages are
//! encoded in the builder's type: only a builder that went through all of
//! them can [`finish`](ScopeGraphBuilder::finish).

use super::graph::{Hoisting, ImportStmt, LocalDef, Reference, ScopeGraph};
use crate::range::TextRange;
use crate::Result;
use std::collections::HashSet;
use std::marker::PhantomData;

/// A single `(range, tag)` pair emitted by the syntax engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub range: TextRange,
    pub tag: String,
}

impl Capture {
    pub fn new(range: TextRange, tag: impl Into<String>) -> Self {
        Self { range, tag: tag.into() }
    }
}

/// Ordered captures for one file, plus the range of the whole file
#[derive(Debug, Clone, Default)]
pub struct FileCaptures {
    pub root: TextRange,
    pub captures: Vec<Capture>,
}

/// Part of an import statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportPart {
    FromName,
    Name,
    Alias,
}

/// Classified capture tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTag {
    Scope,
    Definition { hoisting: Hoisting, def_type: Option<String> },
    Reference { kind: Option<String> },
    Import,
    ImportPart(ImportPart),
}

impl CaptureTag {
    /// Classify a tag; `None` for tags this builder does not know about
    pub fn parse(tag: &str) -> Option<Self> {
        let parts: Vec<&str> = tag.split('.').collect();
        match parts.as_slice() {
            [scoping, "definition"] => Some(CaptureTag::Definition {
                hoisting: scoping.parse().ok()?,
                def_type: None,
            }),
            [scoping, "definition", def_type] => Some(CaptureTag::Definition {
                hoisting: scoping.parse().ok()?,
                def_type: Some(def_type.to_string()),
            }),
            ["local", "reference"] => Some(CaptureTag::Reference { kind: None }),
            ["local", "reference", kind] => Some(CaptureTag::Reference {
                kind: Some(kind.to_string()),
            }),
            ["local", "scope"] => Some(CaptureTag::Scope),
            ["local", "import"] => Some(CaptureTag::Import),
            ["local", "import", "from_name"] => Some(CaptureTag::ImportPart(ImportPart::FromName)),
            ["local", "import", "name"] => Some(CaptureTag::ImportPart(ImportPart::Name)),
            ["local", "import", "alias"] => Some(CaptureTag::ImportPart(ImportPart::Alias)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct StagedDef {
    range: TextRange,
    hoisting: Hoisting,
    def_type: Option<String>,
}

#[derive(Debug)]
struct StagedRef {
    range: TextRange,
    kind: Option<String>,
}

#[derive(Debug)]
struct StagedImport {
    range: TextRange,
    parts: Vec<(ImportPart, TextRange)>,
}

/// Captures sorted into the lists each stage consumes
#[derive(Debug, Default)]
struct StagedCaptures {
    scopes: Vec<TextRange>,
    imports: Vec<StagedImport>,
    definitions: Vec<StagedDef>,
    references: Vec<StagedRef>,
}

impl StagedCaptures {
    fn classify(captures: &[Capture]) -> Self {
        let mut staged = StagedCaptures::default();
        let mut parts: Vec<(ImportPart, TextRange)> = Vec::new();
        let mut seen_scopes = HashSet::new();
        let mut seen_imports = HashSet::new();
        let mut seen_parts = HashSet::new();
        let mut seen_defs = HashSet::new();

        for capture in captures {
            let range = capture.range;
            let span = (range.start_byte, range.end_byte);
            match CaptureTag::parse(&capture.tag) {
                Some(CaptureTag::Scope) => {
                    if seen_scopes.insert(span) {
                        staged.scopes.push(range);
                    }
                }
                Some(CaptureTag::Import) => {
                    if seen_imports.insert(span) {
                        staged.imports.push(StagedImport { range, parts: Vec::new() });
                    }
                }
                Some(CaptureTag::ImportPart(part)) => {
                    if seen_parts.insert((part, span)) {
                        parts.push((part, range));
                    }
                }
                Some(CaptureTag::Definition { hoisting, def_type }) => {
                    if seen_defs.insert(span) {
                        staged.definitions.push(StagedDef { range, hoisting, def_type });
                    }
                }
                Some(CaptureTag::Reference { kind }) => {
                    staged.references.push(StagedRef { range, kind });
                }
                None => tracing::trace!("ignoring capture tag {}", capture.tag),
            }
        }

        parts.sort_by_key(|(_, range)| (range.start_byte, range.end_byte));
        for (part, range) in parts {
            let owner = staged
                .imports
                .iter_mut()
                .filter(|import| import.range.contains(&range))
                .min_by_key(|import| import.range.len());
            match owner {
                Some(import) => import.parts.push((part, range)),
                None => tracing::trace!("import part at {} has no enclosing import", range),
            }
        }

        staged
    }
}

/// Stage markers
#[derive(Debug)]
pub struct Scopes;
#[derive(Debug)]
pub struct Imports;
#[derive(Debug)]
pub struct Definitions;
#[derive(Debug)]
pub struct References;
#[derive(Debug)]
pub struct Complete;

/// Staged scope graph construction over one file's captures
#[derive(Debug)]
pub struct ScopeGraphBuilder<'a, Stage> {
    graph: ScopeGraph,
    staged: StagedCaptures,
    source: &'a [u8],
    _stage: PhantomData<Stage>,
}

impl<'a, Stage> ScopeGraphBuilder<'a, Stage> {
    fn advance<Next>(self) -> ScopeGraphBuilder<'a, Next> {
        ScopeGraphBuilder {
            graph: self.graph,
            staged: self.staged,
            source: self.source,
            _stage: PhantomData,
        }
    }

    fn text(&self, range: &TextRange) -> Option<String> {
        let text = range.text(self.source);
        if text.is_empty() { None } else { Some(text) }
    }
}

impl<'a> ScopeGraphBuilder<'a, Scopes> {
    pub fn new(captures: &FileCaptures, source: &'a [u8]) -> Self {
        Self {
            graph: ScopeGraph::new(captures.root),
            staged: StagedCaptures::classify(&captures.captures),
            source,
            _stage: PhantomData,
        }
    }

    /// Insert scopes in capture order, building the containment tree
    pub fn insert_scopes(mut self) -> Result<ScopeGraphBuilder<'a, Imports>> {
        for range in std::mem::take(&mut self.staged.scopes) {
            self.graph.insert_local_scope(range)?;
        }
        Ok(self.advance())
    }
}

impl<'a> ScopeGraphBuilder<'a, Imports> {
    pub fn insert_imports(mut self) -> Result<ScopeGraphBuilder<'a, Definitions>> {
        for staged in std::mem::take(&mut self.staged.imports) {
            let mut import = ImportStmt::default();
            for (part, range) in &staged.parts {
                let Some(text) = self.text(range) else { continue };
                match part {
                    ImportPart::FromName => import.from_name.push(text),
                    ImportPart::Name => {
                        import.names.push(text);
                        import.aliases.push(None);
                    }
                    // an alias renames the name right before it
                    ImportPart::Alias => {
                        if let Some(last) = import.aliases.last_mut() {
                            *last = Some(text);
                        }
                    }
                }
            }
            self.graph.insert_import(staged.range, import)?;
            // keep the range so references inside the statement are skipped
            self.staged.imports.push(StagedImport { range: staged.range, parts: Vec::new() });
        }
        Ok(self.advance())
    }
}

impl<'a> ScopeGraphBuilder<'a, Definitions> {
    pub fn insert_definitions(mut self) -> Result<ScopeGraphBuilder<'a, References>> {
        for staged in std::mem::take(&mut self.staged.definitions) {
            let def = LocalDef::new(self.text(&staged.range), staged.def_type.clone(), staged.hoisting);
            self.graph.insert_definition(staged.range, def)?;
            self.staged.definitions.push(staged);
        }
        Ok(self.advance())
    }
}

impl<'a> ScopeGraphBuilder<'a, References> {
    /// Insert references, skipping identifiers already bound as definitions
    /// or belonging to an import statement
    pub fn insert_references(mut self) -> Result<ScopeGraphBuilder<'a, Complete>> {
        let def_spans: HashSet<(usize, usize)> = self
            .staged
            .definitions
            .iter()
            .map(|def| (def.range.start_byte, def.range.end_byte))
            .collect();
        let mut seen = HashSet::new();

        for staged in std::mem::take(&mut self.staged.references) {
            let span = (staged.range.start_byte, staged.range.end_byte);
            if def_spans.contains(&span) || !seen.insert(span) {
                continue;
            }
            if self.staged.imports.iter().any(|import| import.range.contains(&staged.range)) {
                continue;
            }
            let reference = Reference::new(self.text(&staged.range), staged.kind);
            self.graph.insert_reference(staged.range, reference)?;
        }
        Ok(self.advance())
    }
}

impl ScopeGraphBuilder<'_, Complete> {
    pub fn finish(self) -> ScopeGraph {
        self.graph
    }
}

/// Build a file's scope graph from its captures and source text
pub fn build_scope_graph(captures: &FileCaptures, source: &[u8]) -> Result<ScopeGraph> {
    Ok(ScopeGraphBuilder::new(captures, source)
        .insert_scopes()?
        .insert_imports()?
        .insert_definitions()?
        .insert_references()?
        .finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::graph::NodeId;

    /// Capture covering the first occurrence of `needle` at or after `from`
    fn cap(source: &str, needle: &str, from: usize, tag: &str) -> Capture {
        let start = source[from..].find(needle).unwrap() + from;
        Capture::new(TextRange::from_bytes(start, start + needle.len()), tag)
    }

    fn file(source: &str, captures: Vec<Capture>) -> FileCaptures {
        FileCaptures {
            root: TextRange::from_bytes(0, source.len()),
            captures,
        }
    }

    #[test]
    fn test_tag_classification() {
        assert_eq!(CaptureTag::parse("local.scope"), Some(CaptureTag::Scope));
        assert_eq!(
            CaptureTag::parse("hoisted.definition.function"),
            Some(CaptureTag::Definition {
                hoisting: Hoisting::Hoisted,
                def_type: Some("function".into())
            })
        );
        assert_eq!(
            CaptureTag::parse("global.definition"),
            Some(CaptureTag::Definition { hoisting: Hoisting::Global, def_type: None })
        );
        assert_eq!(
            CaptureTag::parse("local.reference.call"),
            Some(CaptureTag::Reference { kind: Some("call".into()) })
        );
        assert_eq!(
            CaptureTag::parse("local.import.alias"),
            Some(CaptureTag::ImportPart(ImportPart::Alias))
        );
        assert_eq!(CaptureTag::parse("local.definition.a.b"), None);
        assert_eq!(CaptureTag::parse("block.scope"), None);
        assert_eq!(CaptureTag::parse("weird.definition"), None);
    }

    #[test]
    fn test_reference_before_scope_capture_is_still_nested() {
        //            0         1         2
        //            012345678901234567890123456
        let source = "def f(a):\n    return a\n";
        // reference appears first in the stream, scope last
        let captures = vec![
            cap(source, "a", 19, "local.reference"),
            cap(source, "a", 6, "local.definition.parameter"),
            Capture::new(TextRange::from_bytes(0, 22), "local.scope"),
        ];
        let graph = build_scope_graph(&file(source, captures), source.as_bytes()).unwrap();

        let func = graph.child_scopes(NodeId::root())[0];
        assert_eq!(graph.references(func).len(), 1);
        assert_eq!(graph.definitions(func).len(), 1);
        assert!(graph.references(NodeId::root()).is_empty());
    }

    #[test]
    fn test_unknown_tags_are_ignored() {
        let source = "x = 1\n";
        let captures = vec![
            cap(source, "x", 0, "local.definition.variable"),
            cap(source, "1", 0, "number.literal"),
        ];
        let graph = build_scope_graph(&file(source, captures), source.as_bytes()).unwrap();
        assert_eq!(graph.node_count(), 2);
        let def = graph.definitions(NodeId::root())[0];
        assert_eq!(graph.definition(def).unwrap().symbol_name.as_deref(), Some("x"));
    }

    #[test]
    fn test_import_parts_are_grouped() {
        let source = "from pkg.util import load, dump as save\nload()\n";
        let stmt = TextRange::from_bytes(0, 39);
        let captures = vec![
            Capture::new(stmt, "local.import"),
            cap(source, "pkg.util", 0, "local.import.from_name"),
            cap(source, "load", 0, "local.import.name"),
            // duplicated statement capture from a second query match
            Capture::new(stmt, "local.import"),
            cap(source, "pkg.util", 0, "local.import.from_name"),
            cap(source, "dump", 0, "local.import.name"),
            cap(source, "save", 0, "local.import.alias"),
            cap(source, "load", 0, "local.reference"),
            cap(source, "load", 39, "local.reference.call"),
        ];
        let graph = build_scope_graph(&file(source, captures), source.as_bytes()).unwrap();

        let imports: Vec<_> = graph.all_imports().collect();
        assert_eq!(imports.len(), 1);
        let (_, import) = imports[0];
        assert_eq!(import.from_name, vec!["pkg.util".to_string()]);
        assert_eq!(import.names, vec!["load".to_string(), "dump".to_string()]);
        assert_eq!(import.aliases, vec![None, Some("save".to_string())]);

        // the identifier inside the import statement is not a reference
        let refs: Vec<_> = graph.all_references().collect();
        assert_eq!(refs.len(), 1);
        let reference = graph.reference(refs[0]).unwrap();
        assert_eq!(reference.kind.as_deref(), Some("call"));
    }

    #[test]
    fn test_definition_ranges_are_not_references() {
        let source = "value = other\n";
        let captures = vec![
            cap(source, "value", 0, "local.definition.variable"),
            cap(source, "value", 0, "local.reference"),
            cap(source, "other", 0, "local.reference"),
            cap(source, "other", 0, "local.reference"),
        ];
        let graph = build_scope_graph(&file(source, captures), source.as_bytes()).unwrap();
        let names: Vec<_> = graph
            .all_references()
            .filter_map(|id| graph.get_node(id).and_then(|n| n.name()).map(str::to_string))
            .collect();
        assert_eq!(names, vec!["other".to_string()]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let source = "def f():\n    def g():\n        pass\n";
        let captures = vec![
            Capture::new(TextRange::from_bytes(0, source.len() - 1), "local.scope"),
            cap(source, "f", 0, "local.definition.function"),
            Capture::new(TextRange::from_bytes(13, source.len() - 1), "local.scope"),
            cap(source, "g", 13, "local.definition.function"),
        ];
        let first = build_scope_graph(&file(source, captures.clone()), source.as_bytes()).unwrap();
        let second = build_scope_graph(&file(source, captures), source.as_bytes()).unwrap();
        assert_eq!(first.node_count(), second.node_count());
        assert_eq!(first.to_str(), second.to_str());
    }
}
