//! Repo Graph - per-file scope graphs stitched together by imports
//!
//! Construction runs in three passes:
//! 1. Build one scope graph per file (in parallel with rayon)
//! 2. Resolve references locally and classify each file's imports
//! 3. Match local imports against the exports of their target files and
//!    add `ImportToExport` edges between repo nodes
//!
//! Imports that cannot be matched stay in the file's missing list; they
//! never abort construction.

use crate::config::ReposcopeConfig;
use crate::edge::EdgeKind;
use crate::imports::{ImportContext, LocalImport, ModuleTables};
use crate::language::{CaptureEngine, Language, QueryEngine, PYTHON};
use crate::repo::fs::{RepoFiles, RepoFs};
use crate::scope::builder::build_scope_graph;
use crate::scope::graph::{NodeId, ScopeGraph};
use crate::scope::resolver::{LocalResolution, LocalResolver, LocalVisibility};
use crate::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// A scope addressed across the repository: `(file, scope id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoNodeId {
    pub file: PathBuf,
    pub scope: NodeId,
}

impl RepoNodeId {
    pub fn new(file: impl Into<PathBuf>, scope: NodeId) -> Self {
        Self { file: file.into(), scope }
    }
}

impl fmt::Display for RepoNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.file.display(), self.scope)
    }
}

/// Node of the repository graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoNode {
    pub id: RepoNodeId,
}

/// Knobs for [`RepoGraph::build`]
#[derive(Debug, Clone, Copy)]
pub struct RepoGraphOptions {
    pub local_visibility: LocalVisibility,
    /// Build per-file scope graphs on the rayon pool
    pub parallel: bool,
}

impl Default for RepoGraphOptions {
    fn default() -> Self {
        Self {
            local_visibility: LocalVisibility::default(),
            parallel: true,
        }
    }
}

/// Cross-file graph over every source file of a repository
#[derive(Debug)]
pub struct RepoGraph {
    root: PathBuf,
    graph: DiGraph<RepoNode, EdgeKind>,
    index: HashMap<RepoNodeId, NodeIndex>,
    scopes_map: BTreeMap<PathBuf, ScopeGraph>,
    resolutions: BTreeMap<PathBuf, LocalResolution>,
    imports: BTreeMap<PathBuf, Vec<LocalImport>>,
    missing_import_refs: BTreeMap<PathBuf, Vec<String>>,
    resolved_import_refs: BTreeMap<PathBuf, Vec<String>>,
    skipped: Vec<PathBuf>,
}

impl RepoGraph {
    /// Build the graph of a Python repository with default settings
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let fs = RepoFs::new(path, &PYTHON, &[])?;
        let engine = QueryEngine::python()?;
        let tables = ModuleTables::for_language(&PYTHON)?;
        Self::build(&fs, &engine, &tables, RepoGraphOptions::default())
    }

    /// Build the graph with the language, excludes, tables and options of `config`
    pub fn from_config(path: impl AsRef<Path>, config: &ReposcopeConfig) -> Result<Self> {
        let language = config.language()?;
        let fs = RepoFs::new(path, language, &config.exclude)?;
        let engine = QueryEngine::new(language)?;
        let tables = config.module_tables(language)?;
        Self::build(&fs, &engine, &tables, config.graph_options())
    }

    pub fn build(
        fs: &dyn RepoFiles,
        engine: &dyn CaptureEngine,
        tables: &ModuleTables,
        options: RepoGraphOptions,
    ) -> Result<Self> {
        let files = fs.get_files_content()?;
        let language = engine.language();
        tracing::info!("Building scope graphs for {} {} files", files.len(), language.name);

        let build_one = |(path, source): &(PathBuf, Vec<u8>)| {
            let result = engine.captures(source).and_then(|captures| build_scope_graph(&captures, source));
            (path.clone(), result)
        };
        let built: Vec<(PathBuf, Result<ScopeGraph>)> = if options.parallel {
            files.par_iter().map(build_one).collect()
        } else {
            files.iter().map(build_one).collect()
        };

        let mut repo = RepoGraph {
            root: fs.root().to_path_buf(),
            graph: DiGraph::new(),
            index: HashMap::new(),
            scopes_map: BTreeMap::new(),
            resolutions: BTreeMap::new(),
            imports: BTreeMap::new(),
            missing_import_refs: BTreeMap::new(),
            resolved_import_refs: BTreeMap::new(),
            skipped: Vec::new(),
        };

        for (path, result) in built {
            match result {
                Ok(graph) => {
                    tracing::debug!("{}: {} scope graph nodes", path.display(), graph.node_count());
                    repo.scopes_map.insert(path, graph);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    repo.skipped.push(path);
                }
            }
        }

        for (path, graph) in &repo.scopes_map {
            let resolution = LocalResolver::new(graph, options.local_visibility).resolve_all();
            let imports = ImportContext::new(path, graph, &resolution, fs, tables, language).imports();

            repo.missing_import_refs
                .insert(path.clone(), imports.iter().map(|i| i.namespace.to_string()).collect());
            repo.resolved_import_refs.insert(path.clone(), Vec::new());
            repo.imports.insert(path.clone(), imports);
            repo.resolutions.insert(path.clone(), resolution);
        }

        repo.link_imports(fs, language);

        tracing::info!(
            "Linked {} import edges across {} files ({} imports missing)",
            repo.graph.edge_count(),
            repo.scopes_map.len(),
            repo.missing_import_refs.values().map(Vec::len).sum::<usize>()
        );
        Ok(repo)
    }

    /// Match every local import to exports of its target file
    fn link_imports(&mut self, fs: &dyn RepoFiles, language: &Language) {
        let mut links: Vec<(RepoNodeId, RepoNodeId)> = Vec::new();
        let mut matched: Vec<(PathBuf, String, String)> = Vec::new();

        let exports = ExportIndex {
            scopes_map: &self.scopes_map,
            imports: &self.imports,
            fs,
            language,
        };

        for (file, imports) in &self.imports {
            for import in imports.iter().filter(|i| i.is_local()) {
                let Some(target) = &import.target else { continue };
                let mut visited = HashSet::new();
                let found = exports.resolve(target, import.imported_name(), &mut visited);
                if found.is_empty() {
                    tracing::debug!("{}: no export matches {}", file.display(), import.namespace);
                    continue;
                }

                // an import nobody references stays missing
                let symbol = import.imported_name().unwrap_or(import.bound_name.as_str());
                for scope in &import.ref_scopes {
                    for export in &found {
                        links.push((RepoNodeId::new(file.clone(), *scope), export.clone()));
                    }
                    matched.push((file.clone(), import.namespace.to_string(), symbol.to_string()));
                }
            }
        }

        for (from, to) in links {
            let from = self.node_index(from);
            let to = self.node_index(to);
            self.graph.update_edge(from, to, EdgeKind::ImportToExport);
        }

        for (file, namespace, symbol) in matched {
            if let Some(missing) = self.missing_import_refs.get_mut(&file) {
                missing.retain(|ns| *ns != namespace);
            }
            self.resolved_import_refs.entry(file).or_default().push(symbol);
        }
    }

    fn node_index(&mut self, id: RepoNodeId) -> NodeIndex {
        if let Some(&index) = self.index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(RepoNode { id: id.clone() });
        self.index.insert(id, index);
        index
    }

    /// Key under which `file` is stored; absolute paths inside the root are relativised
    fn key(&self, file: &Path) -> PathBuf {
        file.strip_prefix(&self.root).unwrap_or(file).to_path_buf()
    }

    fn normalize(&self, id: &RepoNodeId) -> RepoNodeId {
        RepoNodeId::new(self.key(&id.file), id.scope)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.scopes_map.keys().map(PathBuf::as_path)
    }

    /// Files whose scope graph could not be built
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn scope_graph(&self, file: &Path) -> Option<&ScopeGraph> {
        self.scopes_map.get(&self.key(file))
    }

    pub fn local_resolution(&self, file: &Path) -> Option<&LocalResolution> {
        self.resolutions.get(&self.key(file))
    }

    pub fn imports(&self, file: &Path) -> &[LocalImport] {
        self.imports.get(&self.key(file)).map(Vec::as_slice).unwrap_or_default()
    }

    /// Namespaces of `file` that did not resolve to any export
    pub fn missing_import_refs(&self, file: &Path) -> &[String] {
        self.missing_import_refs.get(&self.key(file)).map(Vec::as_slice).unwrap_or_default()
    }

    /// Symbols of `file` that resolved to an export in another file
    pub fn resolved_import_refs(&self, file: &Path) -> &[String] {
        self.resolved_import_refs.get(&self.key(file)).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get_node(&self, id: &RepoNodeId) -> Option<&RepoNode> {
        let index = self.index.get(&self.normalize(id))?;
        self.graph.node_weight(*index)
    }

    /// Look up a node, creating it if absent. Never duplicates.
    pub fn get_or_create_node(&mut self, id: RepoNodeId) -> &RepoNode {
        let id = self.normalize(&id);
        let index = self.node_index(id);
        &self.graph[index]
    }

    fn neighbors(&self, id: &RepoNodeId, direction: Direction) -> Vec<&RepoNode> {
        let Some(&index) = self.index.get(&self.normalize(id)) else {
            return Vec::new();
        };
        let mut nodes: Vec<&RepoNode> = self
            .graph
            .edges_directed(index, direction)
            .filter(|edge| *edge.weight() == EdgeKind::ImportToExport)
            .map(|edge| match direction {
                Direction::Outgoing => &self.graph[edge.target()],
                Direction::Incoming => &self.graph[edge.source()],
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Exporting scopes reachable from a referencing scope
    pub fn import_to_export_scope(&self, id: &RepoNodeId) -> Vec<&RepoNode> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Scopes in other files that reference an exporting scope
    pub fn export_to_import_scopes(&self, id: &RepoNodeId) -> Vec<&RepoNode> {
        self.neighbors(id, Direction::Incoming)
    }

    /// One line per edge: `<u> -> <v>`
    pub fn to_str(&self) -> String {
        self.graph
            .edge_references()
            .map(|edge| format!("{} -> {}\n", self.graph[edge.source()].id, self.graph[edge.target()].id))
            .collect()
    }

    pub fn missing_imports_report(&self) -> MissingImportsReport {
        let files: Vec<FileMissingImports> = self
            .missing_import_refs
            .iter()
            .filter(|(_, missing)| !missing.is_empty())
            .map(|(file, missing)| FileMissingImports {
                file: file.clone(),
                missing: missing.clone(),
            })
            .collect();

        MissingImportsReport {
            total_missing: files.iter().map(|f| f.missing.len()).sum(),
            total_resolved: self.resolved_import_refs.values().map(Vec::len).sum(),
            files,
        }
    }

    pub fn stats(&self) -> RepoGraphStats {
        let mut stats = RepoGraphStats {
            files: self.scopes_map.len(),
            skipped_files: self.skipped.len(),
            repo_nodes: self.graph.node_count(),
            import_edges: self.graph.edge_count(),
            ..Default::default()
        };
        for graph in self.scopes_map.values() {
            stats.scopes += graph.all_scopes().count();
            stats.definitions += graph.all_definitions().count();
            stats.references += graph.all_references().count();
        }
        for resolution in self.resolutions.values() {
            stats.locally_resolved += resolution.resolved_count();
        }
        for imports in self.imports.values() {
            stats.imports += imports.len();
            stats.local_imports += imports.iter().filter(|i| i.is_local()).count();
        }
        stats.missing_imports = self.missing_import_refs.values().map(Vec::len).sum();
        stats.resolved_imports = self.resolved_import_refs.values().map(Vec::len).sum();
        stats
    }
}

/// Export lookup across the repository's scope graphs
struct ExportIndex<'a> {
    scopes_map: &'a BTreeMap<PathBuf, ScopeGraph>,
    imports: &'a BTreeMap<PathBuf, Vec<LocalImport>>,
    fs: &'a dyn RepoFiles,
    language: &'a Language,
}

impl ExportIndex<'_> {
    /// Scopes of `target` that provide `name`; the file's root scope when the
    /// whole module is bound.
    ///
    /// Aggregator files that do not define `name` themselves are searched
    /// through their own imports, then for a submodule called `name`.
    fn resolve(
        &self,
        target: &Path,
        name: Option<&str>,
        visited: &mut HashSet<(PathBuf, Option<String>)>,
    ) -> Vec<RepoNodeId> {
        if !visited.insert((target.to_path_buf(), name.map(String::from))) {
            return Vec::new();
        }
        let Some(graph) = self.scopes_map.get(target) else {
            return Vec::new();
        };
        let Some(name) = name else {
            return vec![RepoNodeId::new(target, graph.root())];
        };

        let direct: Vec<RepoNodeId> = exports(graph)
            .into_iter()
            .filter(|(export, _)| export == name)
            .map(|(_, scope)| RepoNodeId::new(target, scope))
            .collect();
        if !direct.is_empty() || !self.language.is_aggregator(target) {
            return direct;
        }

        let mut found = Vec::new();
        for import in self.imports.get(target).into_iter().flatten() {
            if import.bound_name != name {
                continue;
            }
            if let Some(next) = &import.target {
                found.extend(self.resolve(next, import.imported_name(), visited));
            }
        }
        if found.is_empty() {
            let package = target.parent().unwrap_or(Path::new(""));
            if let Some(module) = self.fs.match_file(&package.join(name)) {
                found.extend(self.resolve(&module, None, visited));
            }
        }
        found.sort();
        found.dedup();
        found
    }
}

/// Exported `(name, scope)` pairs: class and function definitions declared
/// in the root scope or a direct child of it
pub fn exports(graph: &ScopeGraph) -> Vec<(String, NodeId)> {
    let root = graph.root();
    std::iter::once(root)
        .chain(graph.child_scopes(root))
        .flat_map(|scope| graph.definitions(scope).into_iter().map(move |def| (scope, def)))
        .filter_map(|(scope, def)| {
            let def = graph.definition(def)?;
            if !def.is_exportable() {
                return None;
            }
            Some((def.symbol_name.clone()?, scope))
        })
        .collect()
}

/// Per-file listing of unmatched imports
#[derive(Debug, Clone, Serialize)]
pub struct FileMissingImports {
    pub file: PathBuf,
    pub missing: Vec<String>,
}

/// Unmatched imports across the repository
#[derive(Debug, Clone, Serialize)]
pub struct MissingImportsReport {
    pub files: Vec<FileMissingImports>,
    pub total_missing: usize,
    pub total_resolved: usize,
}

impl MissingImportsReport {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl fmt::Display for MissingImportsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            writeln!(f, "{}:", file.file.display())?;
            for namespace in &file.missing {
                writeln!(f, "  {}", namespace)?;
            }
        }
        writeln!(f, "Missing imports: {}", self.total_missing)?;
        writeln!(f, "Resolved imports: {}", self.total_resolved)
    }
}

/// Statistics about a repo graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoGraphStats {
    pub files: usize,
    pub skipped_files: usize,
    pub scopes: usize,
    pub definitions: usize,
    pub references: usize,
    pub locally_resolved: usize,
    pub imports: usize,
    pub local_imports: usize,
    pub resolved_imports: usize,
    pub missing_imports: usize,
    pub repo_nodes: usize,
    pub import_edges: usize,
}

impl fmt::Display for RepoGraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repo Graph Statistics:")?;
        writeln!(f, "  Files: {} (skipped: {})", self.files, self.skipped_files)?;
        writeln!(f, "  Scopes: {}", self.scopes)?;
        writeln!(f, "  Definitions: {}", self.definitions)?;
        writeln!(f, "  References: {} (resolved locally: {})", self.references, self.locally_resolved)?;
        writeln!(f, "  Imports: {} (local: {})", self.imports, self.local_imports)?;
        writeln!(f, "  Resolved imports: {}", self.resolved_imports)?;
        writeln!(f, "  Missing imports: {}", self.missing_imports)?;
        writeln!(f, "  Repo nodes: {} (import edges: {})", self.repo_nodes, self.import_edges)
    }
}
