//! Repository file access
//!
//! [`RepoFiles`] is the seam between the graph builder and the disk. Paths
//! handed out by an implementation are relative to [`RepoFiles::root`].

use crate::ignore::IgnoreFilter;
use crate::language::Language;
use crate::{Error, Result};
use ignore::WalkBuilder;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub trait RepoFiles: Sync {
    /// Absolute repository root
    fn root(&self) -> &Path;

    /// Every source file of the repository with its contents, sorted by path
    fn get_files_content(&self) -> Result<Vec<(PathBuf, Vec<u8>)>>;

    /// Resolve a module path (no extension) to a source file, if one exists
    fn match_file(&self, candidate: &Path) -> Option<PathBuf>;
}

/// Source files of one language under a directory on disk
pub struct RepoFs {
    root: PathBuf,
    language: &'static Language,
    filter: IgnoreFilter,
}

impl RepoFs {
    pub fn new(root: impl AsRef<Path>, language: &'static Language, excludes: &[String]) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::RepoNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;
        let filter = IgnoreFilter::new(&root, excludes);
        Ok(Self { root, language, filter })
    }

    pub fn language(&self) -> &'static Language {
        self.language
    }

    /// Relative paths of all source files, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        let filter = self.filter.clone();
        let walker = WalkBuilder::new(&self.root)
            .require_git(false)
            .sort_by_file_path(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !filter.is_ignored(entry.path(), is_dir)
            })
            .build();

        let mut files = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) || !self.language.can_handle(path) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                files.push(relative.to_path_buf());
            }
        }
        files
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

impl RepoFiles for RepoFs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn get_files_content(&self) -> Result<Vec<(PathBuf, Vec<u8>)>> {
        let mut contents = Vec::new();
        for relative in self.files() {
            match std::fs::read(self.root.join(&relative)) {
                Ok(bytes) => contents.push((relative, bytes)),
                Err(e) => tracing::warn!("Failed to read {}: {}", relative.display(), e),
            }
        }
        tracing::debug!("Found {} {} files under {}", contents.len(), self.language.name, self.root.display());
        Ok(contents)
    }

    fn match_file(&self, candidate: &Path) -> Option<PathBuf> {
        let base = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        // module file first, then package aggregator
        for ext in self.language.extensions {
            let mut module: OsString = base.clone().into_os_string();
            module.push(".");
            module.push(ext);
            let module = PathBuf::from(module);
            if candidate.components().next().is_some() && module.is_file() {
                return self.relative(&module);
            }
        }
        for ext in self.language.extensions {
            let package = base.join(format!("{}.{}", self.language.aggregator_stem, ext));
            if package.is_file() {
                return self.relative(&package);
            }
        }
        None
    }
}
