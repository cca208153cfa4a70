//! Configuration management for Gramdex.
//!
//! Configuration is stored in TOML format, either at an explicit path or in
//! the platform config directory. A missing file yields the defaults and
//! every section may be omitted. Gramdex only reads configuration; the file
//! is maintained by hand.

use crate::build::{BuildStrategy, ForkJoin, Pipeline, Sequential, StrategyKind};
use crate::error::{IndexError, Result};
use crate::inspect::{AcceptAll, ContentInspector, FileFilter, GlobFilter, WhitelistInspector};
use crate::types::{DEFAULT_ARITY, DEFAULT_SEPARATOR};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Main configuration structure for Gramdex.
///
/// ## Example Configuration File (gramdex.toml)
///
/// ```toml
/// [general]
/// log_level = "info"
/// max_results = 1000
///
/// [index]
/// roots = ["src"]
/// arity = 3
/// strategy = "pipeline"
///
/// [pipeline]
/// readers = 8
/// mergers = 2
///
/// [filter]
/// include = ["*.rs", "*.kt"]
/// exclude = ["**/target/**"]
///
/// [inspector]
/// whitelist_tolerance = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// What to index and how
    pub index: IndexConfig,

    /// Fork-join strategy tuning
    pub parallel: ParallelConfig,

    /// Pipeline strategy tuning
    pub pipeline: PipelineConfig,

    /// File include/exclude patterns
    pub filter: FilterConfig,

    /// Content inspection
    pub inspector: InspectorConfig,
}

/// General configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum number of results to print
    pub max_results: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
            max_results: 1000,
        }
    }
}

/// Index configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root paths to index
    pub roots: Vec<PathBuf>,

    /// N-gram length
    pub arity: usize,

    /// Text placed between lines
    pub separator: String,

    /// Build strategy
    pub strategy: StrategyKind,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            roots: Vec::new(),
            arity: DEFAULT_ARITY,
            separator: DEFAULT_SEPARATOR.to_string(),
            strategy: StrategyKind::default(),
        }
    }
}

/// Fork-join configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Dedicated worker threads (0 = global rayon pool)
    pub threads: usize,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reader threads
    pub readers: usize,

    /// Merger threads
    pub mergers: usize,

    /// Capacity of the filename queue
    pub file_queue: usize,

    /// Capacity of the partial index queue
    pub partial_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let pipeline = Pipeline::default();
        PipelineConfig {
            readers: pipeline.readers(),
            mergers: pipeline.mergers(),
            file_queue: pipeline.file_queue(),
            partial_queue: pipeline.partial_queue(),
        }
    }
}

/// File filter configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Glob patterns a file must match (empty = every file)
    pub include: Vec<String>,

    /// Glob patterns that exclude a file
    pub exclude: Vec<String>,
}

/// Content inspector configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Distinct non-whitelisted characters tolerated per file
    /// (None = accept everything)
    pub whitelist_tolerance: Option<usize>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| IndexError::config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "gramdex")
            .ok_or_else(|| IndexError::config("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("gramdex.toml"))
    }

    /// The configured build strategy with its tuning applied.
    pub fn build_strategy(&self) -> Result<Arc<dyn BuildStrategy>> {
        let strategy: Arc<dyn BuildStrategy> = match self.index.strategy {
            StrategyKind::Sequential => Arc::new(Sequential),
            StrategyKind::Parallel => Arc::new(ForkJoin::with_threads(self.parallel.threads)),
            StrategyKind::Pipeline => {
                let pipeline = Pipeline::new(self.pipeline.readers, self.pipeline.mergers)?
                    .with_queue_capacities(self.pipeline.file_queue, self.pipeline.partial_queue)?;
                Arc::new(pipeline)
            }
        };
        Ok(strategy)
    }

    /// The configured file filter.
    pub fn file_filter(&self) -> Result<Arc<dyn FileFilter>> {
        if self.filter.include.is_empty() && self.filter.exclude.is_empty() {
            return Ok(Arc::new(AcceptAll));
        }
        Ok(Arc::new(GlobFilter::new(&self.filter.include, &self.filter.exclude)?))
    }

    /// The configured content inspector.
    pub fn content_inspector(&self) -> Arc<dyn ContentInspector> {
        match self.inspector.whitelist_tolerance {
            Some(tolerance) => Arc::new(WhitelistInspector::new(tolerance)),
            None => Arc::new(AcceptAll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.arity, 3);
        assert_eq!(config.index.separator, "\n");
        assert_eq!(config.index.strategy, StrategyKind::Pipeline);
        assert_eq!(config.pipeline.readers, 8);
        assert_eq!(config.pipeline.mergers, 2);
        assert_eq!(config.pipeline.file_queue, 64);
        assert_eq!(config.general.max_results, 1000);
    }

    #[test]
    fn test_load_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("gramdex.toml");
        fs::write(
            &config_path,
            r#"
[general]
log_level = "debug"
max_results = 50

[index]
roots = ["src", "tests"]
arity = 4
separator = "\r\n"
strategy = "parallel"

[parallel]
threads = 2

[pipeline]
readers = 4
mergers = 1
file_queue = 16
partial_queue = 8

[filter]
include = ["*.rs"]
exclude = ["**/target/**"]

[inspector]
whitelist_tolerance = 3
"#,
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.max_results, 50);
        assert_eq!(config.index.roots, vec![PathBuf::from("src"), PathBuf::from("tests")]);
        assert_eq!(config.index.arity, 4);
        assert_eq!(config.index.separator, "\r\n");
        assert_eq!(config.index.strategy, StrategyKind::Parallel);
        assert_eq!(config.parallel.threads, 2);
        assert_eq!(config.pipeline.partial_queue, 8);
        assert_eq!(config.filter.exclude, vec!["**/target/**".to_string()]);
        assert_eq!(config.inspector.whitelist_tolerance, Some(3));
        assert_eq!(config.build_strategy().unwrap().name(), "parallel");
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[index]\narity = 4\nstrategy = \"sequential\"\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.index.arity, 4);
        assert_eq!(config.index.strategy, StrategyKind::Sequential);
        assert_eq!(config.index.separator, "\n");
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[index]\nstrategy = \"quantum\"\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_build_strategy() {
        let mut config = Config::default();
        assert_eq!(config.build_strategy().unwrap().name(), "pipeline");

        config.pipeline.mergers = 0;
        assert!(config.build_strategy().is_err());

        config.index.strategy = StrategyKind::Parallel;
        assert_eq!(config.build_strategy().unwrap().name(), "parallel");
    }

    #[test]
    fn test_filter_and_inspector() {
        let mut config = Config::default();
        assert!(config.file_filter().unwrap().accept(Path::new("anything")));

        config.filter.exclude = vec!["*.lock".to_string()];
        let filter = config.file_filter().unwrap();
        assert!(!filter.accept(Path::new("Cargo.lock")));
        assert!(filter.accept(Path::new("Cargo.toml")));

        config.filter.include = vec!["[".to_string()];
        assert!(config.file_filter().is_err());

        config.inspector.whitelist_tolerance = Some(0);
        let inspector = config.content_inspector();
        assert!(!inspector.proceed_on_ngram("\u{0}ab", 0, Path::new("blob")));
    }
}
