use crate::imports::ModuleTables;
use crate::language::Language;
use crate::repo::graph::RepoGraphOptions;
use crate::scope::resolver::LocalVisibility;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReposcopeConfig {
    /// Source language of the repository
    pub language: String,
    /// Extra gitignore-style patterns to skip
    pub exclude: Vec<String>,
    /// JSON table replacing the embedded standard-library modules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_modules: Option<PathBuf>,
    /// JSON table replacing the embedded third-party modules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub third_party_modules: Option<PathBuf>,
    pub local_visibility: LocalVisibility,
    pub parallel: bool,
}

impl Default for ReposcopeConfig {
    fn default() -> Self {
        Self {
            language: "python".to_string(),
            exclude: Vec::new(),
            system_modules: None,
            third_party_modules: None,
            local_visibility: LocalVisibility::default(),
            parallel: true,
        }
    }
}

impl ReposcopeConfig {
    pub fn language(&self) -> Result<&'static Language> {
        Language::from_name(&self.language)
            .ok_or_else(|| Error::Config(format!("unsupported language: {}", self.language)))
    }

    pub fn module_tables(&self, language: &Language) -> Result<ModuleTables> {
        ModuleTables::load(language, self.system_modules.as_deref(), self.third_party_modules.as_deref())
            .map_err(|e| Error::Config(format!("module tables: {}", e)))
    }

    pub fn graph_options(&self) -> RepoGraphOptions {
        RepoGraphOptions {
            local_visibility: self.local_visibility,
            parallel: self.parallel,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("reposcope.toml")
}

/// Config file of a repository: `<repo>/reposcope.toml`
pub fn config_path_in(base: &Path) -> PathBuf {
    base.join(default_config_path())
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<ReposcopeConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: ReposcopeConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &ReposcopeConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ReposcopeConfig = toml::from_str("local_visibility = \"ordered\"\n").unwrap();
        assert_eq!(config.local_visibility, LocalVisibility::Ordered);
        assert_eq!(config.language, "python");
        assert!(config.parallel);
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_unknown_language_is_a_config_error() {
        let config = ReposcopeConfig {
            language: "fortran".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.language(), Err(Error::Config(_))));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path_in(dir.path());
        assert!(load_config(Some(&path)).unwrap().is_none());

        let config = ReposcopeConfig {
            exclude: vec!["migrations/".to_string()],
            parallel: false,
            ..Default::default()
        };
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.exclude, vec!["migrations/"]);
        assert!(!loaded.parallel);
    }

    #[test]
    fn test_table_override_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("sys.json");
        std::fs::write(&system, r#"{"modules": ["internal_runtime"]}"#).unwrap();

        let config = ReposcopeConfig {
            system_modules: Some(system),
            ..Default::default()
        };
        let language = config.language().unwrap();
        let tables = config.module_tables(language).unwrap();
        assert_eq!(tables.classify_root("internal_runtime"), crate::imports::ModuleType::System);
        assert_eq!(tables.classify_root("os"), crate::imports::ModuleType::Unknown);
        assert_eq!(tables.classify_root("numpy"), crate::imports::ModuleType::ThirdParty);
    }
}
