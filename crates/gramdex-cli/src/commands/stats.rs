//! Stats command - build the index and show its statistics.

use crate::app::{App, Overrides};
use crate::OutputFormat;
use gramdex_core::{BuildReport, Config, IndexStats};

/// Run the stats command.
pub fn run(config: Config, overrides: Overrides, output: OutputFormat) -> anyhow::Result<()> {
    let app = App::new(config, overrides)?;
    let (snapshot, report) = app.build()?;
    let stats = snapshot.stats();

    match output {
        OutputFormat::Text => {
            println!("Gramdex Index Statistics");
            println!("========================");
            println!();
            print_report(&report);
            println!();
            print_stats(stats);
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "n": snapshot.n(),
                "roots": app.config.index.roots,
                "strategy": app.config.index.strategy,
                "build": report,
                "index": stats,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

fn print_report(report: &BuildReport) {
    println!("Build:");
    println!("  Files found:       {}", report.files);
    println!("  Indexed:           {}", report.indexed);
    println!("  Rejected:          {}", report.rejected);
    println!("  Unreadable:        {}", report.unreadable);
    println!("  Elapsed:           {} ms", report.elapsed_ms);
}

pub(crate) fn print_stats(stats: &IndexStats) {
    println!("Index:");
    println!("  N-grams:           {}", stats.ngrams);
    println!("  Files:             {}", stats.files);
    println!(
        "  File size:         min {} / avg {:.1} / max {} bytes",
        stats.file_size_min, stats.file_size_avg, stats.file_size_max
    );
    println!(
        "  Total size:        {} bytes ({:.2} MB)",
        stats.file_size_total,
        stats.file_size_total as f64 / (1024.0 * 1024.0)
    );
    println!("  Posting entries:   {}", stats.entries_total);
    println!(
        "  Per n-gram:        avg {:.2} / max {}",
        stats.entries_per_ngram_avg, stats.entries_per_ngram_max
    );
    println!("  N-grams per file:  {:.1}", stats.avg_ngrams_per_file);
    println!("  Alphabet size:     {}", stats.alphabet.chars().count());

    if let Some(built) = stats.built_at {
        println!("  Built at:          {}", built.format("%Y-%m-%d %H:%M:%S"));
    }
}
