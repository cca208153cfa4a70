//! Builder lifecycle: configuration, asynchronous builds and the snapshot
//! served to queries.
//!
//! ## States
//!
//! ```text
//! Initial --build--> Build --success--> Ready --build--> Build ...
//!                      |
//!                      +--cancel--> state before the build
//!                      +--failure--> Achtung (terminal)
//! ```
//!
//! Only one build runs per builder. Queries never wait for it: they are
//! answered from the last published snapshot, or from an empty snapshot
//! before the first build succeeds. A build publishes its snapshot only if
//! it is still the builder's current build when it completes, so a
//! cancelled build can never overwrite anything.

use crate::build::{BuildContext, BuildStrategy, CancellationToken, Pipeline};
use crate::config::Config;
use crate::error::{IndexError, Result};
use crate::inspect::{AcceptAll, ContentInspector, FileFilter};
use crate::reader::{BasicFileReader, FileReader};
use crate::snapshot::IndexSnapshot;
use crate::types::{BuildReport, FileId, DEFAULT_ARITY, DEFAULT_SEPARATOR};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Lifecycle state of an [`IndexBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuilderState {
    /// No build has completed yet
    Initial,
    /// A build is in flight
    Build,
    /// The last build completed and its snapshot is served
    Ready,
    /// A build failed unexpectedly; no further builds are accepted
    Achtung,
}

impl fmt::Display for BuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderState::Initial => write!(f, "initial"),
            BuilderState::Build => write!(f, "build"),
            BuilderState::Ready => write!(f, "ready"),
            BuilderState::Achtung => write!(f, "achtung"),
        }
    }
}

/// How a finished build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The build completed and its snapshot was published
    Ready {
        snapshot: Arc<IndexSnapshot>,
        report: BuildReport,
    },
    /// The build was cancelled and published nothing
    Cancelled,
}

#[derive(Clone)]
struct Settings {
    roots: Vec<PathBuf>,
    n: usize,
    separator: String,
    inspector: Arc<dyn ContentInspector>,
    reader: Arc<dyn FileReader>,
    filter: Arc<dyn FileFilter>,
    strategy: Arc<dyn BuildStrategy>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            roots: Vec::new(),
            n: DEFAULT_ARITY,
            separator: DEFAULT_SEPARATOR.to_string(),
            inspector: Arc::new(AcceptAll),
            reader: Arc::new(BasicFileReader),
            filter: Arc::new(AcceptAll),
            strategy: Arc::new(Pipeline::default()),
        }
    }
}

struct InFlight {
    generation: u64,
    prior: BuilderState,
    cancel: CancellationToken,
}

struct Lifecycle {
    state: BuilderState,
    snapshot: Arc<IndexSnapshot>,
    generation: u64,
    in_flight: Option<InFlight>,
}

/// Configures and runs builds, and holds the snapshot served to queries.
///
/// All methods take `&self`; the builder can be shared between a thread
/// issuing builds and any number of querying threads.
///
/// ## Example
///
/// ```rust,no_run
/// use gramdex_core::IndexBuilder;
///
/// let builder = IndexBuilder::new().with_root("src");
/// builder.build_and_wait()?;
/// for path in builder.query("fn main")? {
///     println!("{}", path.display());
/// }
/// # Ok::<(), gramdex_core::IndexError>(())
/// ```
pub struct IndexBuilder {
    settings: Mutex<Settings>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    /// Builder with default settings and no roots.
    pub fn new() -> Self {
        let settings = Settings::default();
        let snapshot = IndexSnapshot::empty(settings.n, settings.separator.clone(), settings.reader.clone());
        IndexBuilder {
            settings: Mutex::new(settings),
            lifecycle: Arc::new(Mutex::new(Lifecycle {
                state: BuilderState::Initial,
                snapshot: Arc::new(snapshot),
                generation: 0,
                in_flight: None,
            })),
        }
    }

    /// Builder configured from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let builder = IndexBuilder::new()
            .with_arity(config.index.arity)?
            .with_separator(config.index.separator.clone())
            .with_strategy(config.build_strategy()?)
            .with_filter(config.file_filter()?)
            .with_inspector(config.content_inspector());
        builder.add_roots(config.index.roots.iter().cloned());
        Ok(builder)
    }

    // === Configuration ===
    //
    // Settings are captured when a build starts; changes made while a build
    // runs apply to the next one.

    pub fn add_root(&self, root: impl Into<PathBuf>) {
        self.settings.lock().roots.push(root.into());
    }

    pub fn add_roots(&self, roots: impl IntoIterator<Item = PathBuf>) {
        self.settings.lock().roots.extend(roots);
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.settings.lock().roots.clone()
    }

    /// Set the n-gram length.
    pub fn set_arity(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(IndexError::InvalidArity { n });
        }
        let mut settings = self.settings.lock();
        settings.n = n;
        self.refresh_empty_snapshot(&settings);
        Ok(())
    }

    pub fn set_separator(&self, separator: impl Into<String>) {
        let mut settings = self.settings.lock();
        settings.separator = separator.into();
        self.refresh_empty_snapshot(&settings);
    }

    pub fn set_inspector(&self, inspector: Arc<dyn ContentInspector>) {
        self.settings.lock().inspector = inspector;
    }

    pub fn set_reader(&self, reader: Arc<dyn FileReader>) {
        let mut settings = self.settings.lock();
        settings.reader = reader;
        self.refresh_empty_snapshot(&settings);
    }

    pub fn set_filter(&self, filter: Arc<dyn FileFilter>) {
        self.settings.lock().filter = filter;
    }

    pub fn set_strategy(&self, strategy: Arc<dyn BuildStrategy>) {
        self.settings.lock().strategy = strategy;
    }

    pub fn with_root(self, root: impl Into<PathBuf>) -> Self {
        self.add_root(root);
        self
    }

    pub fn with_arity(self, n: usize) -> Result<Self> {
        self.set_arity(n)?;
        Ok(self)
    }

    pub fn with_separator(self, separator: impl Into<String>) -> Self {
        self.set_separator(separator);
        self
    }

    pub fn with_inspector(self, inspector: Arc<dyn ContentInspector>) -> Self {
        self.set_inspector(inspector);
        self
    }

    pub fn with_reader(self, reader: Arc<dyn FileReader>) -> Self {
        self.set_reader(reader);
        self
    }

    pub fn with_filter(self, filter: Arc<dyn FileFilter>) -> Self {
        self.set_filter(filter);
        self
    }

    pub fn with_strategy(self, strategy: Arc<dyn BuildStrategy>) -> Self {
        self.set_strategy(strategy);
        self
    }

    /// Keep the placeholder snapshot in line with the settings until a
    /// real one is published, so queries are validated against the
    /// configured arity.
    fn refresh_empty_snapshot(&self, settings: &Settings) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.snapshot.is_empty() {
            lifecycle.snapshot = Arc::new(IndexSnapshot::empty(
                settings.n,
                settings.separator.clone(),
                settings.reader.clone(),
            ));
        }
    }

    // === Lifecycle ===

    /// The snapshot queries are currently answered from.
    pub fn get(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.lifecycle.lock().snapshot)
    }

    pub fn state(&self) -> BuilderState {
        self.lifecycle.lock().state
    }

    /// Query the current snapshot.
    pub fn query(&self, pattern: &str) -> Result<BTreeSet<PathBuf>> {
        self.get().query(pattern)
    }

    /// Cancel the build in flight, if any.
    ///
    /// The builder returns to the state it had before the build at once;
    /// the build's threads wind down in the background. Returns whether a
    /// build was cancelled.
    pub fn cancel(&self) -> bool {
        cancel_generation(&self.lifecycle, None)
    }

    /// Start a build on a background thread.
    ///
    /// Fails with [`IndexError::BuildInProgress`] while another build runs
    /// and with [`IndexError::BuilderFailed`] once the builder is in
    /// [`BuilderState::Achtung`].
    #[instrument(skip(self))]
    pub fn build(&self) -> Result<PendingBuild> {
        let settings = self.settings.lock().clone();

        let (generation, cancel) = {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                BuilderState::Build => return Err(IndexError::BuildInProgress),
                BuilderState::Achtung => return Err(IndexError::BuilderFailed),
                BuilderState::Initial | BuilderState::Ready => {}
            }
            lifecycle.generation += 1;
            let generation = lifecycle.generation;
            let cancel = CancellationToken::new();
            lifecycle.in_flight = Some(InFlight {
                generation,
                prior: lifecycle.state,
                cancel: cancel.clone(),
            });
            lifecycle.state = BuilderState::Build;
            (generation, cancel)
        };

        info!(
            generation,
            roots = settings.roots.len(),
            n = settings.n,
            strategy = settings.strategy.name(),
            "Starting index build"
        );

        let (tx, rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.lifecycle);
        let spawned = thread::Builder::new()
            .name("gramdex-build".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| run(settings, cancel)))
                    .unwrap_or_else(|payload| {
                        Err(IndexError::build_failed(format!(
                            "build panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    });
                let outcome = finish(&shared, generation, result);
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(handle) => Ok(PendingBuild {
                generation,
                lifecycle: Arc::clone(&self.lifecycle),
                outcome: rx,
                handle: Some(handle),
            }),
            Err(err) => {
                cancel_generation(&self.lifecycle, Some(generation));
                Err(IndexError::build_failed(format!("failed to spawn build thread: {}", err)))
            }
        }
    }

    /// Start a build and block until it ends.
    pub fn build_and_wait(&self) -> Result<BuildOutcome> {
        self.build()?.wait()
    }
}

/// Handle to a build running in the background.
///
/// Dropping the handle detaches the build; it still publishes its snapshot
/// when it completes.
pub struct PendingBuild {
    generation: u64,
    lifecycle: Arc<Mutex<Lifecycle>>,
    outcome: Receiver<Result<BuildOutcome>>,
    handle: Option<JoinHandle<()>>,
}

impl PendingBuild {
    /// Cancel this build. Idempotent; returns whether this call cancelled it.
    pub fn cancel(&self) -> bool {
        cancel_generation(&self.lifecycle, Some(self.generation))
    }

    /// Whether the build thread has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the build ends.
    ///
    /// A build that was cancelled reports [`BuildOutcome::Cancelled`] even if
    /// its threads completed the work.
    pub fn wait(mut self) -> Result<BuildOutcome> {
        let outcome = self
            .outcome
            .recv()
            .unwrap_or_else(|_| Err(IndexError::build_failed("build thread ended without a result")));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        outcome
    }
}

/// Run one build to completion on the current thread.
///
/// `Ok(None)` means the build observed its cancellation.
fn run(settings: Settings, cancel: CancellationToken) -> Result<Option<(IndexSnapshot, BuildReport)>> {
    let started = Instant::now();
    let Settings {
        roots,
        n,
        separator,
        inspector,
        reader,
        filter,
        strategy,
    } = settings;

    let files = reader.list_files(&roots, filter.as_ref(), &cancel);
    if files.len() > FileId::CEILING {
        return Err(IndexError::build_failed(format!(
            "{} files exceed the limit of {} per index",
            files.len(),
            FileId::CEILING
        )));
    }
    if cancel.is_cancelled() {
        return Ok(None);
    }

    let ctx = BuildContext::new(n, separator.clone(), inspector, reader.clone())?
        .with_cancellation(cancel);
    let index = strategy.build(&files, &ctx)?;
    if ctx.is_cancelled() {
        return Ok(None);
    }

    let report = ctx.report(files.len(), started.elapsed());
    let snapshot = IndexSnapshot::new(n, separator, index, files, Arc::clone(ctx.interner()), reader);
    Ok(Some((snapshot, report)))
}

/// Publish the result of build `generation` if it is still current.
fn finish(
    shared: &Mutex<Lifecycle>,
    generation: u64,
    result: Result<Option<(IndexSnapshot, BuildReport)>>,
) -> Result<BuildOutcome> {
    let mut lifecycle = shared.lock();
    let in_flight = match lifecycle.in_flight.take() {
        Some(in_flight) if in_flight.generation == generation => in_flight,
        other => {
            // cancelled earlier; the state was reverted at that point
            lifecycle.in_flight = other;
            info!(generation, "Discarding result of cancelled build");
            return Ok(BuildOutcome::Cancelled);
        }
    };

    match result {
        Ok(Some((snapshot, report))) => {
            info!(
                generation,
                files = report.files,
                indexed = report.indexed,
                rejected = report.rejected,
                unreadable = report.unreadable,
                ngrams = snapshot.index().len(),
                elapsed_ms = report.elapsed_ms,
                "Index build complete"
            );
            let snapshot = Arc::new(snapshot);
            lifecycle.snapshot = Arc::clone(&snapshot);
            lifecycle.state = BuilderState::Ready;
            Ok(BuildOutcome::Ready { snapshot, report })
        }
        Ok(None) => {
            lifecycle.state = in_flight.prior;
            info!(generation, state = %in_flight.prior, "Index build cancelled");
            Ok(BuildOutcome::Cancelled)
        }
        Err(err) => {
            error!(generation, error = %err, "Index build failed");
            lifecycle.state = BuilderState::Achtung;
            Err(err)
        }
    }
}

/// Cancel the build in flight, or only build `generation` if given.
fn cancel_generation(shared: &Mutex<Lifecycle>, generation: Option<u64>) -> bool {
    let mut lifecycle = shared.lock();
    let matches = lifecycle
        .in_flight
        .as_ref()
        .is_some_and(|in_flight| generation.map_or(true, |g| g == in_flight.generation));
    if !matches {
        return false;
    }

    match lifecycle.in_flight.take() {
        Some(in_flight) => {
            in_flight.cancel.cancel();
            lifecycle.state = in_flight.prior;
            warn!(generation = in_flight.generation, state = %in_flight.prior, "Index build cancelled");
            true
        }
        None => false,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
