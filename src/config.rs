//! Runtime configuration.
//!
//! ```toml
//! mappings = "mappings.toml"
//! jobs = 4
//! extensions = ["sql", "trg"]
//!
//! [generate]
//! current_timestamp = "clock_timestamp()"
//! retain_error_code = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::Diagnostics;
use crate::error::{TriggerError, TriggerResult};
use crate::mapping::MappingTables;
use crate::transpiler::GenerateOptions;

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "trigport.toml";

/// Main trigport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mapping tables file (TOML or JSON). Relative paths are resolved
    /// against the directory of the config file.
    pub mappings: Option<PathBuf>,

    /// Worker threads for batch conversion; 0 uses every available core.
    pub jobs: usize,

    /// Input file extensions picked up when converting a directory.
    pub extensions: Vec<String>,

    pub generate: GenerateOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mappings: None,
            jobs: 0,
            extensions: vec!["sql".to_string(), "trg".to_string(), "pls".to_string()],
            generate: GenerateOptions::default(),
        }
    }
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> TriggerResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TriggerError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            TriggerError::Config(format!("invalid config '{}': {}", path.display(), e))
        })?;

        if let (Some(mappings), Some(dir)) = (&config.mappings, path.parent()) {
            if mappings.is_relative() {
                config.mappings = Some(dir.join(mappings));
            }
        }
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Candidate config files, most specific first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("trigport").join("config.toml"));
        }
        paths
    }

    /// Load the explicit config file if given, else the first existing
    /// file from [`Config::search_paths`], else the defaults.
    ///
    /// An explicit path that does not exist is an error; missing search
    /// path candidates are not.
    pub fn load(explicit: Option<&Path>) -> TriggerResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Build the mapping tables this config asks for. A mapping file that
    /// cannot be loaded is reported to `diags` and the built-in tables are
    /// used instead.
    pub fn mapping_tables(&self, diags: &mut Diagnostics) -> MappingTables {
        let tables = MappingTables::load_or_default(self.mappings.as_deref(), diags);
        let generate = &self.generate;
        if generate.current_timestamp.is_none() && generate.current_date.is_none() {
            return tables;
        }
        tables.with_current_time(
            generate
                .current_timestamp
                .as_deref()
                .unwrap_or("CURRENT_TIMESTAMP"),
            generate.current_date.as_deref().unwrap_or("CURRENT_DATE"),
        )
    }

    /// Whether `path` carries one of the configured input extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the mapping tables file
    pub fn mappings(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mappings = Some(path.into());
        self
    }

    /// Set the worker count
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the generator options
    pub fn generate(mut self, options: GenerateOptions) -> Self {
        self.config.generate = options;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trigport-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            jobs = 2

            [generate]
            retain_error_code = true
            "#,
        )
        .unwrap();
        assert_eq!(config.jobs, 2);
        assert!(config.generate.retain_error_code);
        assert_eq!(config.generate.indent, 4);
        assert_eq!(config.extensions, Config::default().extensions);
    }

    #[test]
    fn test_relative_mappings_resolved_against_config_dir() {
        let dir = temp_dir("relative");
        let path = dir.join("trigport.toml");
        fs::write(&path, "mappings = \"maps/custom.toml\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.mappings, Some(dir.join("maps/custom.toml")));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/trigport.toml"))).unwrap_err();
        assert!(matches!(err, TriggerError::Config(_)));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = temp_dir("invalid");
        let path = dir.join("bad.toml");
        fs::write(&path, "jobs = \"many\"\n").unwrap();
        assert!(Config::from_file(&path).is_err());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_current_time_overrides_reach_tables() {
        let config = Config::builder()
            .generate(GenerateOptions {
                current_timestamp: Some("clock_timestamp()".to_string()),
                ..GenerateOptions::default()
            })
            .build();
        let mut diags = Diagnostics::new();
        let tables = config.mapping_tables(&mut diags);
        assert_eq!(tables.pseudo_column("SYSDATE"), Some("clock_timestamp()"));
        assert_eq!(tables.call_override("TRUNC(SYSDATE)"), Some("CURRENT_DATE"));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_missing_mapping_file_falls_back() {
        let config = Config::builder().mappings("/nonexistent/maps.toml").build();
        let mut diags = Diagnostics::new();
        let tables = config.mapping_tables(&mut diags);
        assert_eq!(tables, MappingTables::builtin());
        assert_eq!(diags.count(Severity::Error), 1);
    }

    #[test]
    fn test_accepts_extensions() {
        let config = Config::builder().extensions(["sql"]).build();
        assert!(config.accepts(Path::new("a/trg_orders.SQL")));
        assert!(!config.accepts(Path::new("a/README.md")));
        assert!(!config.accepts(Path::new("a/noext")));
    }
}
