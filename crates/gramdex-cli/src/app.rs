//! Application state management.

use gramdex_core::{BuildOutcome, BuildReport, Config, IndexBuilder, IndexSnapshot, StrategyKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Roots given on the command line
    pub roots: Vec<PathBuf>,

    /// N-gram length
    pub arity: Option<usize>,

    /// Build strategy
    pub strategy: Option<StrategyKind>,
}

/// Shared application state.
pub struct App {
    /// Configuration with command-line overrides applied
    pub config: Config,

    /// The index builder
    pub builder: IndexBuilder,
}

impl App {
    /// Create a new application instance.
    pub fn new(mut config: Config, overrides: Overrides) -> anyhow::Result<Self> {
        if !overrides.roots.is_empty() {
            config.index.roots = overrides.roots;
        }
        if config.index.roots.is_empty() {
            config.index.roots = vec![PathBuf::from(".")];
        }
        if let Some(arity) = overrides.arity {
            config.index.arity = arity;
        }
        if let Some(strategy) = overrides.strategy {
            config.index.strategy = strategy;
        }

        let builder = IndexBuilder::from_config(&config)?;

        info!(
            roots = config.index.roots.len(),
            n = config.index.arity,
            strategy = %config.index.strategy,
            "Application initialized"
        );

        Ok(App { config, builder })
    }

    /// Build the index and wait for the result.
    pub fn build(&self) -> anyhow::Result<(Arc<IndexSnapshot>, BuildReport)> {
        match self.builder.build_and_wait()? {
            BuildOutcome::Ready { snapshot, report } => Ok((snapshot, report)),
            BuildOutcome::Cancelled => anyhow::bail!("Index build was cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_to_current_directory() {
        let app = App::new(Config::default(), Overrides::default()).unwrap();
        assert_eq!(app.config.index.roots, vec![PathBuf::from(".")]);
        assert_eq!(app.builder.roots(), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.index.roots = vec![PathBuf::from("from-config")];

        let overrides = Overrides {
            roots: vec![PathBuf::from("from-cli")],
            arity: Some(4),
            strategy: Some(StrategyKind::Sequential),
        };
        let app = App::new(config, overrides).unwrap();

        assert_eq!(app.config.index.roots, vec![PathBuf::from("from-cli")]);
        assert_eq!(app.config.index.arity, 4);
        assert_eq!(app.config.index.strategy, StrategyKind::Sequential);
    }

    #[test]
    fn test_invalid_arity() {
        let overrides = Overrides {
            arity: Some(0),
            ..Default::default()
        };
        assert!(App::new(Config::default(), overrides).is_err());
    }

    #[test]
    fn test_build() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello world\n").unwrap();
        fs::write(dir.path().join("b.txt"), "goodbye\n").unwrap();

        let overrides = Overrides {
            roots: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        let app = App::new(Config::default(), overrides).unwrap();
        let (snapshot, report) = app.build().unwrap();

        assert_eq!(report.files, 2);
        let hits = snapshot.query("hello").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.contains(&dir.path().join("a.txt")));
    }
}
