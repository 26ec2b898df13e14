use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Gitignore-style matcher combining repository ignore files, built-in
/// noise patterns and user excludes
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults (global)
        let defaults = [
            // Virtual environments and build output
            "venv/", ".venv/", "env/", ".tox/", ".nox/", "site-packages/",
            "dist/", "build/", "*.egg-info/", "__pycache__/", "node_modules/", "target/",
            // Tool caches
            ".git/", ".mypy_cache/", ".pytest_cache/", ".ruff_cache/", ".ipynb_checkpoints/",
            ".vscode/", ".idea/",
            // Compiled artefacts
            "*.pyc", "*.pyo", "*.pyd", "*.so", "*.dll", "*.dylib",
        ];

        for pattern in defaults {
            // static patterns, known valid
            builder.add_line(None, pattern).ok();
        }

        // 3. Add user config excludes
        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}
