//! # Gramdex CLI
//!
//! Command-line interface for the Gramdex n-gram search index.
//!
//! ## Commands
//!
//! - `gramdex query <pattern> [roots...]` - Build an index and list matching files
//! - `gramdex stats [roots...]` - Build an index and show its statistics
//! - `gramdex interactive [roots...]` - Query while the index builds
//!
//! ## Example Usage
//!
//! ```bash
//! # Files containing a literal
//! gramdex query "fn main" src
//!
//! # Exact positions, including matches spanning lines
//! gramdex query --scan $'}\n\nimpl' crates
//!
//! # Interactive session over the configured roots
//! gramdex interactive
//! ```

mod app;
mod commands;

use app::Overrides;
use clap::{Parser, Subcommand};
use gramdex_core::StrategyKind;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Gramdex - In-memory n-gram substring search
#[derive(Parser)]
#[command(name = "gramdex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// N-gram length (overrides the config file)
    #[arg(short = 'n', long, global = true)]
    arity: Option<usize>,

    /// Build strategy: sequential, parallel or pipeline
    #[arg(short, long, global = true)]
    strategy: Option<StrategyKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and search it for a literal pattern
    Query {
        /// Literal to search for; may contain newlines
        pattern: String,

        /// Root paths to index (default: config roots, then the current directory)
        roots: Vec<PathBuf>,

        /// Rescan matched files for exact line and column positions
        #[arg(long)]
        scan: bool,

        /// Maximum number of files to show (default: config max_results)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Build the index and show its statistics
    Stats {
        /// Root paths to index
        roots: Vec<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Query the index while it is being built
    #[command(alias = "i")]
    Interactive {
        /// Root paths to index
        roots: Vec<PathBuf>,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => gramdex_core::Config::load_from(path)?,
        None => gramdex_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .init();

    let overrides = |roots: Vec<PathBuf>| Overrides {
        roots,
        arity: cli.arity,
        strategy: cli.strategy,
    };

    // Execute command
    match cli.command {
        Commands::Query {
            pattern,
            roots,
            scan,
            limit,
            output,
        } => commands::query::run(config, overrides(roots), &pattern, scan, limit, output),
        Commands::Stats { roots, output } => commands::stats::run(config, overrides(roots), output),
        Commands::Interactive { roots } => commands::interactive::run(config, overrides(roots)),
    }
}
