//! Interactive command - query the index while it builds.
//!
//! Queries are answered from whatever snapshot the builder currently holds,
//! so results grow from empty to complete as the first build finishes.

use crate::app::{App, Overrides};
use crate::commands::stats::print_stats;
use chrono::Utc;
use gramdex_core::{BuildOutcome, Config, PendingBuild};
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::warn;

const HELP: &str = "\
Commands:
  <pattern>   search for a literal (\\n and \\t are unescaped)
  :scan <p>   search and show line:column positions
  :state      show the builder state
  :stats      show statistics of the current snapshot
  :cancel     cancel the running build
  :rebuild    start a new build
  :help       show this help
  :quit       exit";

enum Input<'a> {
    Query(String),
    Scan(String),
    State,
    Stats,
    Cancel,
    Rebuild,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    match line {
        "" => Input::Empty,
        ":state" => Input::State,
        ":stats" => Input::Stats,
        ":cancel" => Input::Cancel,
        ":rebuild" => Input::Rebuild,
        ":help" | ":h" => Input::Help,
        ":quit" | ":q" => Input::Quit,
        _ => match line.strip_prefix(":scan ") {
            Some(pattern) => Input::Scan(unescape(pattern)),
            None if line.starts_with(':') => Input::Unknown(line),
            None => Input::Query(unescape(line)),
        },
    }
}

fn unescape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Report a build that has ended, if any.
fn reap(pending: &mut Option<PendingBuild>) {
    if !pending.as_ref().is_some_and(PendingBuild::is_finished) {
        return;
    }
    let Some(build) = pending.take() else {
        return;
    };
    match build.wait() {
        Ok(BuildOutcome::Ready { report, .. }) => println!(
            "Build finished: {} of {} files indexed in {}ms",
            report.indexed, report.files, report.elapsed_ms
        ),
        Ok(BuildOutcome::Cancelled) => println!("Build cancelled"),
        Err(e) => println!("Build failed: {}", e),
    }
}

/// Run the interactive command.
pub fn run(config: Config, overrides: Overrides) -> anyhow::Result<()> {
    let app = App::new(config, overrides)?;
    let max_results = app.config.general.max_results;

    let mut pending = Some(app.builder.build()?);
    println!("Indexing {} root(s) in the background. Type :help for commands.", app.builder.roots().len());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("gramdex [{}]> ", app.builder.state());
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        reap(&mut pending);

        match parse(&line) {
            Input::Empty => {}
            Input::Help => println!("{}", HELP),
            Input::Quit => break,
            Input::Unknown(cmd) => println!("Unknown command: {} (try :help)", cmd),
            Input::State => {
                let snapshot = app.builder.get();
                print!("State: {}", app.builder.state());
                match snapshot.built_at() {
                    Some(built) => println!(
                        ", snapshot of {} files built {}s ago",
                        snapshot.files().len(),
                        (Utc::now() - built).num_seconds()
                    ),
                    None => println!(", no snapshot yet"),
                }
            }
            Input::Stats => print_stats(app.builder.get().stats()),
            Input::Cancel => {
                if app.builder.cancel() {
                    println!("Build cancelled");
                } else {
                    println!("No build running");
                }
            }
            Input::Rebuild => match app.builder.build() {
                Ok(build) => {
                    pending = Some(build);
                    println!("Rebuild started");
                }
                Err(e) => println!("Cannot rebuild: {}", e),
            },
            Input::Query(pattern) => {
                let start = Instant::now();
                match app.builder.query(&pattern) {
                    Ok(results) => {
                        for path in results.iter().take(max_results) {
                            println!("{}", path.display());
                        }
                        println!(
                            "{} files ({:.3}ms)",
                            results.len(),
                            start.elapsed().as_secs_f64() * 1000.0
                        );
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            Input::Scan(pattern) => match app.builder.get().query_and_scan(&pattern) {
                Ok(results) => {
                    for (path, lines) in results.iter().take(max_results) {
                        for (line, offsets) in lines {
                            for offset in offsets {
                                println!("{}:{}:{}", path.display(), line + 1, offset + 1);
                            }
                        }
                    }
                    println!("{} files", results.len());
                }
                Err(e) => println!("Error: {}", e),
            },
        }
    }

    if app.builder.cancel() {
        warn!("Exiting with a build in flight; cancelled it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert!(matches!(parse(":quit"), Input::Quit));
        assert!(matches!(parse(":q\r\n"), Input::Quit));
        assert!(matches!(parse(":stats"), Input::Stats));
        assert!(matches!(parse(":cancel"), Input::Cancel));
        assert!(matches!(parse(":rebuild"), Input::Rebuild));
        assert!(matches!(parse(""), Input::Empty));
        assert!(matches!(parse(":frobnicate"), Input::Unknown(":frobnicate")));
    }

    #[test]
    fn test_parse_patterns() {
        match parse("fn main") {
            Input::Query(p) => assert_eq!(p, "fn main"),
            _ => panic!("expected query"),
        }
        match parse(":scan }\\n\\nimpl") {
            Input::Scan(p) => assert_eq!(p, "}\n\nimpl"),
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\tb"), "a\tb");
        assert_eq!(unescape("a\\\\n"), "a\\n");
        assert_eq!(unescape("a\\x"), "a\\x");
        assert_eq!(unescape("trailing\\"), "trailing\\");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_reap_without_build() {
        let mut pending = None;
        reap(&mut pending);
        assert!(pending.is_none());
    }
}
