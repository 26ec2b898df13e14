//! Import classification
//!
//! Every imported name becomes a [`LocalImport`]: its namespace, where the
//! module lives (`Local` when it resolves to a repository file), the name
//! it binds in the importing file, and the scopes whose unresolved
//! references use that name.

use super::namespace::NameSpace;
use crate::language::Language;
use crate::repo::fs::RepoFiles;
use crate::scope::graph::{ImportStmt, NodeId, ScopeGraph};
use crate::scope::resolver::LocalResolution;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an imported module comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Local,
    System,
    ThirdParty,
    Unknown,
}

impl ModuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleType::Local => "local",
            ModuleType::System => "system",
            ModuleType::ThirdParty => "third_party",
            ModuleType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Deserialize)]
struct ModuleList {
    modules: Vec<String>,
}

/// Known standard-library and third-party root modules
#[derive(Debug, Clone, Default)]
pub struct ModuleTables {
    system: HashSet<String>,
    third_party: HashSet<String>,
}

impl ModuleTables {
    pub fn new<S: Into<String>>(
        system: impl IntoIterator<Item = S>,
        third_party: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            system: system.into_iter().map(Into::into).collect(),
            third_party: third_party.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse two `{"modules": [...]}` documents
    pub fn from_json(system: &str, third_party: &str) -> Result<Self> {
        let system: ModuleList = serde_json::from_str(system)?;
        let third_party: ModuleList = serde_json::from_str(third_party)?;
        Ok(Self::new(system.modules, third_party.modules))
    }

    /// The tables embedded for `language`
    pub fn for_language(language: &Language) -> Result<Self> {
        Self::from_json(language.system_modules, language.third_party_modules)
    }

    /// Embedded tables, with either side replaced by a JSON file on disk
    pub fn load(language: &Language, system: Option<&Path>, third_party: Option<&Path>) -> Result<Self> {
        let system = match system {
            Some(path) => std::fs::read_to_string(path)?,
            None => language.system_modules.to_string(),
        };
        let third_party = match third_party {
            Some(path) => std::fs::read_to_string(path)?,
            None => language.third_party_modules.to_string(),
        };
        Self::from_json(&system, &third_party)
    }

    /// Classify a non-local module by its root segment
    pub fn classify_root(&self, root: &str) -> ModuleType {
        if self.system.contains(root) {
            ModuleType::System
        } else if self.third_party.contains(root) {
            ModuleType::ThirdParty
        } else {
            ModuleType::Unknown
        }
    }
}

/// One imported name of an import statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalImport {
    pub namespace: NameSpace,
    pub module_type: ModuleType,
    /// Import statement node in the importing file's scope graph
    pub import_node: NodeId,
    /// Name introduced into the importing file
    pub bound_name: String,
    /// Scopes holding unresolved references to `bound_name`
    pub ref_scopes: Vec<NodeId>,
    /// Repository file the module resolved to, for `Local` imports
    pub target: Option<PathBuf>,
}

impl LocalImport {
    pub fn is_local(&self) -> bool {
        self.module_type == ModuleType::Local
    }

    /// Name looked up among the target's exports; `None` when the whole
    /// module is bound (`import a.b`)
    pub fn imported_name(&self) -> Option<&str> {
        self.namespace.child_name()
    }
}

/// Everything needed to turn one file's import statements into [`LocalImport`]s
pub struct ImportContext<'a> {
    file: &'a Path,
    graph: &'a ScopeGraph,
    fs: &'a dyn RepoFiles,
    tables: &'a ModuleTables,
    language: &'a Language,
    /// Unresolved reference name → owning scopes
    unresolved: BTreeMap<&'a str, BTreeSet<NodeId>>,
}

impl<'a> ImportContext<'a> {
    pub fn new(
        file: &'a Path,
        graph: &'a ScopeGraph,
        resolution: &LocalResolution,
        fs: &'a dyn RepoFiles,
        tables: &'a ModuleTables,
        language: &'a Language,
    ) -> Self {
        let mut unresolved: BTreeMap<&'a str, BTreeSet<NodeId>> = BTreeMap::new();
        for &reference in resolution.unresolved() {
            let name = graph.reference(reference).and_then(|r| r.symbol_name.as_deref());
            if let (Some(name), Some(scope)) = (name, graph.owning_scope(reference)) {
                unresolved.entry(name).or_default().insert(scope);
            }
        }
        Self { file, graph, fs, tables, language, unresolved }
    }

    /// All imports of the file, in statement order
    pub fn imports(&self) -> Vec<LocalImport> {
        self.graph
            .all_imports()
            .flat_map(|(node, stmt)| self.import_stmt_to_import(node, stmt))
            .collect()
    }

    /// One [`LocalImport`] per imported name of `stmt`
    pub fn import_stmt_to_import(&self, import_node: NodeId, stmt: &ImportStmt) -> Vec<LocalImport> {
        let delimiter = self.language.namespace_delimiter;
        let from_name = stmt.from_name.join(&delimiter.to_string());

        stmt.names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (namespace, bound_name) = if from_name.is_empty() {
                    let namespace = NameSpace::new(name, "", delimiter);
                    let first = namespace.root().unwrap_or(name.as_str()).to_string();
                    (namespace, stmt.alias(i).map(String::from).unwrap_or(first))
                } else {
                    let namespace = NameSpace::new(&from_name, name, delimiter);
                    (namespace, stmt.alias(i).unwrap_or(name.as_str()).to_string())
                };

                let target = self.resolve_target(&namespace);
                let module_type = match (&target, namespace.root()) {
                    (Some(_), _) => ModuleType::Local,
                    (None, _) if namespace.is_relative() => ModuleType::Unknown,
                    (None, Some(root)) => self.tables.classify_root(root),
                    (None, None) => ModuleType::Unknown,
                };
                let ref_scopes = self
                    .unresolved
                    .get(bound_name.as_str())
                    .map(|scopes| scopes.iter().copied().collect())
                    .unwrap_or_default();

                LocalImport {
                    namespace,
                    module_type,
                    import_node,
                    bound_name,
                    ref_scopes,
                    target,
                }
            })
            .collect()
    }

    /// Repository file providing the namespace's module.
    ///
    /// Relative imports climb `level - 1` directories from the importing
    /// file; absolute imports try the repository root, then the importing
    /// file's directory.
    fn resolve_target(&self, namespace: &NameSpace) -> Option<PathBuf> {
        let dir = self.file.parent().unwrap_or(Path::new(""));
        let module = namespace.to_path();

        if namespace.is_relative() {
            let mut base = dir;
            for _ in 1..namespace.level {
                base = base.parent()?;
            }
            return self.fs.match_file(&base.join(module));
        }

        if module.as_os_str().is_empty() {
            return None;
        }
        self.fs
            .match_file(&module)
            .or_else(|| self.fs.match_file(&dir.join(&module)))
            .filter(|target| target != self.file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::PYTHON;
    use crate::range::TextRange;
    use crate::scope::graph::Reference;
    use crate::scope::resolver::{LocalResolver, LocalVisibility};

    /// Files known by relative path, without touching the disk
    struct FakeFs(Vec<&'static str>);

    impl RepoFiles for FakeFs {
        fn root(&self) -> &Path {
            Path::new("/repo")
        }

        fn get_files_content(&self) -> Result<Vec<(PathBuf, Vec<u8>)>> {
            Ok(self.0.iter().map(|p| (PathBuf::from(p), Vec::new())).collect())
        }

        fn match_file(&self, candidate: &Path) -> Option<PathBuf> {
            [format!("{}.py", candidate.display()), format!("{}/__init__.py", candidate.display())]
                .into_iter()
                .map(|p| p.trim_start_matches('/').to_string())
                .find(|p| self.0.contains(&p.as_str()))
                .map(PathBuf::from)
        }
    }

    fn tables() -> ModuleTables {
        ModuleTables::new(["os", "sys"], ["numpy"])
    }

    fn stmt(from: &[&str], names: &[&str], aliases: &[Option<&str>]) -> ImportStmt {
        ImportStmt {
            from_name: from.iter().map(|s| s.to_string()).collect(),
            names: names.iter().map(|s| s.to_string()).collect(),
            aliases: aliases.iter().map(|a| a.map(String::from)).collect(),
        }
    }

    #[test]
    fn test_embedded_tables_classify_roots() {
        let tables = ModuleTables::for_language(&PYTHON).unwrap();
        assert_eq!(tables.classify_root("os"), ModuleType::System);
        assert_eq!(tables.classify_root("numpy"), ModuleType::ThirdParty);
        assert_eq!(tables.classify_root("my_project"), ModuleType::Unknown);
    }

    #[test]
    fn test_malformed_table_is_an_error() {
        assert!(ModuleTables::from_json("[\"os\"]", "{\"modules\": []}").is_err());
    }

    #[test]
    fn test_from_import_classification_and_ref_scopes() {
        let mut graph = ScopeGraph::new(TextRange::from_bytes(0, 200));
        let func = graph.insert_local_scope(TextRange::from_bytes(50, 150)).unwrap();
        let import_node = graph
            .insert_import(TextRange::from_bytes(0, 40), stmt(&["pkg.util"], &["load", "dump"], &[None, Some("save")]))
            .unwrap();
        graph.insert_reference(TextRange::from_bytes(60, 64), Reference::new(Some("load".into()), None)).unwrap();
        graph.insert_reference(TextRange::from_bytes(160, 164), Reference::new(Some("save".into()), None)).unwrap();
        graph.insert_reference(TextRange::from_bytes(170, 174), Reference::new(Some("load".into()), None)).unwrap();

        let resolution = LocalResolver::new(&graph, LocalVisibility::Unordered).resolve_all();
        let fs = FakeFs(vec!["main.py", "pkg/__init__.py", "pkg/util.py"]);
        let tables = tables();
        let ctx = ImportContext::new(Path::new("main.py"), &graph, &resolution, &fs, &tables, &PYTHON);

        let imports = ctx.imports();
        assert_eq!(imports.len(), 2);

        let load = &imports[0];
        assert_eq!(load.namespace.to_string(), "pkg.util.load");
        assert_eq!(load.module_type, ModuleType::Local);
        assert_eq!(load.import_node, import_node);
        assert_eq!(load.target, Some(PathBuf::from("pkg/util.py")));
        assert_eq!(load.bound_name, "load");
        assert_eq!(load.ref_scopes, vec![NodeId::root(), func]);

        let dump = &imports[1];
        assert_eq!(dump.bound_name, "save");
        assert_eq!(dump.imported_name(), Some("dump"));
        assert_eq!(dump.ref_scopes, vec![NodeId::root()]);
    }

    #[test]
    fn test_plain_import_binds_first_segment() {
        let mut graph = ScopeGraph::new(TextRange::from_bytes(0, 100));
        graph.insert_import(TextRange::from_bytes(0, 20), stmt(&[], &["os.path", "numpy"], &[None, Some("np")])).unwrap();
        let resolution = LocalResolver::new(&graph, LocalVisibility::Unordered).resolve_all();
        let fs = FakeFs(vec!["main.py"]);
        let tables = tables();
        let ctx = ImportContext::new(Path::new("main.py"), &graph, &resolution, &fs, &tables, &PYTHON);

        let imports = ctx.imports();
        assert_eq!(imports[0].bound_name, "os");
        assert_eq!(imports[0].module_type, ModuleType::System);
        assert_eq!(imports[0].imported_name(), None);
        assert_eq!(imports[1].bound_name, "np");
        assert_eq!(imports[1].module_type, ModuleType::ThirdParty);
        assert!(imports.iter().all(|i| i.target.is_none()));
    }

    #[test]
    fn test_relative_import_climbs_directories() {
        let mut graph = ScopeGraph::new(TextRange::from_bytes(0, 100));
        graph.insert_import(TextRange::from_bytes(0, 20), stmt(&[".helpers"], &["a"], &[None])).unwrap();
        graph.insert_import(TextRange::from_bytes(30, 50), stmt(&["..models"], &["User"], &[None])).unwrap();
        graph.insert_import(TextRange::from_bytes(60, 80), stmt(&[".missing"], &["b"], &[None])).unwrap();
        let resolution = LocalResolver::new(&graph, LocalVisibility::Unordered).resolve_all();
        let fs = FakeFs(vec!["app/api/views.py", "app/api/helpers.py", "app/models.py"]);
        let tables = tables();
        let ctx = ImportContext::new(Path::new("app/api/views.py"), &graph, &resolution, &fs, &tables, &PYTHON);

        let imports = ctx.imports();
        assert_eq!(imports[0].target, Some(PathBuf::from("app/api/helpers.py")));
        assert_eq!(imports[1].target, Some(PathBuf::from("app/models.py")));
        assert_eq!(imports[2].module_type, ModuleType::Unknown);
    }
}
