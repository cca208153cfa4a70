//! Query command - search indexed files for a literal.

use crate::app::{App, Overrides};
use crate::OutputFormat;
use gramdex_core::{Config, LineMatches, ScanResults};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

/// Run the query command.
pub fn run(
    config: Config,
    overrides: Overrides,
    pattern: &str,
    scan: bool,
    limit: Option<usize>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::new(config, overrides)?;
    let limit = limit.unwrap_or(app.config.general.max_results);

    let (snapshot, report) = app.build()?;
    eprintln!(
        "Indexed {} of {} files in {}ms",
        report.indexed, report.files, report.elapsed_ms
    );

    let start = Instant::now();
    if scan {
        let results = snapshot.query_and_scan(pattern)?;
        let elapsed = start.elapsed();

        match output {
            OutputFormat::Text => {
                for line in positions(&results, limit) {
                    println!("{}", line);
                }
                eprintln!();
                eprintln!(
                    "Found matches in {} files in {:.3}ms",
                    results.len(),
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            OutputFormat::Json => {
                let json_results: Vec<serde_json::Value> = results
                    .iter()
                    .take(limit)
                    .map(|(path, lines)| {
                        serde_json::json!({
                            "path": path,
                            "matches": matches_json(lines),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_results)?);
            }
        }
    } else {
        let results = snapshot.query(pattern)?;
        let elapsed = start.elapsed();

        match output {
            OutputFormat::Text => {
                for path in results.iter().take(limit) {
                    println!("{}", path.display());
                }
                eprintln!();
                eprintln!(
                    "Found {} candidate files in {:.3}ms",
                    results.len(),
                    elapsed.as_secs_f64() * 1000.0
                );
            }
            OutputFormat::Json => {
                let json_results: Vec<&PathBuf> = limited(&results, limit);
                println!("{}", serde_json::to_string_pretty(&json_results)?);
            }
        }
    }

    Ok(())
}

fn limited(results: &BTreeSet<PathBuf>, limit: usize) -> Vec<&PathBuf> {
    results.iter().take(limit).collect()
}

/// `path:line:column` for every match in the first `limit` files, 1-based.
fn positions(results: &ScanResults, limit: usize) -> impl Iterator<Item = String> + '_ {
    results.iter().take(limit).flat_map(|(path, lines)| {
        lines.iter().flat_map(move |(line, offsets)| {
            offsets
                .iter()
                .map(move |offset| format!("{}:{}:{}", path.display(), line + 1, offset + 1))
        })
    })
}

fn matches_json(lines: &LineMatches) -> Vec<serde_json::Value> {
    lines
        .iter()
        .map(|(line, offsets)| {
            serde_json::json!({
                "line": line + 1,
                "columns": offsets.iter().map(|o| o + 1).collect::<Vec<_>>(),
            })
        })
        .collect()
}
