//! File watching for `fastpack serve`.
//!
//! A `notify` watcher runs on its own thread. Raw events are coalesced into
//! batches with [`debounce`], filtered with [`is_ignored`], and sent to the
//! rebuild loop. The rebuild loop decides with [`ChangeFilter`] whether a
//! batch touches the current build.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Directories whose contents never trigger a rebuild.
const IGNORED_DIRS: &[&str] = &[".git", "elm-stuff"];

/// A burst is flushed after this many windows even if events keep coming.
const MAX_BURST_WINDOWS: u32 = 20;

/// Block for the next event, then keep collecting until `window` passes
/// without a new one.
///
/// Returns `None` once the sender is gone and nothing is pending.
pub fn debounce<T>(rx: &Receiver<T>, window: Duration) -> Option<Vec<T>> {
    let first = rx.recv().ok()?;
    let mut batch = vec![first];
    let hard_deadline = Instant::now() + window * MAX_BURST_WINDOWS;

    loop {
        let remaining = hard_deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Some(batch);
        }
        match rx.recv_timeout(window.min(remaining)) {
            Ok(item) => batch.push(item),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                return Some(batch)
            }
        }
    }
}

/// Paths the watcher drops before they reach the rebuild loop: the bundle
/// itself, VCS and compiler caches, and dotfiles (which covers the temp files
/// the bundle is written through).
///
/// The rest of the output directory is not ignored, since it may be the
/// project root.
pub fn is_ignored(path: &Path, bundle_file: &Path) -> bool {
    if path == bundle_file {
        return true;
    }

    if path.components().any(|c| {
        let c = c.as_os_str().to_string_lossy();
        IGNORED_DIRS.contains(&c.as_ref())
    }) {
        return true;
    }

    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Whether a batch of changes should trigger a rebuild.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    /// Files of the last successful build; `None` while the last build failed.
    graph_files: Option<HashSet<PathBuf>>,
    /// Extra paths of the last successful build; changes at or under them count.
    watch_paths: Vec<PathBuf>,
}

impl ChangeFilter {
    /// Filter in the failed state: every change is relevant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the graph `files` and the transforms' `watch_paths` of a good build.
    pub fn on_success(
        &mut self,
        files: impl IntoIterator<Item = PathBuf>,
        watch_paths: impl IntoIterator<Item = PathBuf>,
    ) {
        self.graph_files = Some(files.into_iter().collect());
        self.watch_paths = watch_paths.into_iter().collect();
    }

    pub fn on_failure(&mut self) {
        self.graph_files = None;
        self.watch_paths.clear();
    }

    pub fn is_relevant(&self, changed: &[PathBuf]) -> bool {
        match &self.graph_files {
            None => !changed.is_empty(),
            Some(files) => changed.iter().any(|p| {
                files.contains(p) || self.watch_paths.iter().any(|w| p.starts_with(w))
            }),
        }
    }
}

/// Watch `root` recursively and send debounced, filtered change batches.
///
/// Runs until the receiving side of `tx` is dropped.
pub fn watch_files(
    root: PathBuf,
    bundle_file: PathBuf,
    window: Duration,
    tx: mpsc::Sender<Vec<PathBuf>>,
) -> notify::Result<()> {
    let (event_tx, event_rx) = std::sync::mpsc::channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(event_tx, Config::default())?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    debug!(root = %root.display(), "Watching for changes");

    while let Some(batch) = debounce(&event_rx, window) {
        let mut changed = BTreeSet::new();
        for result in batch {
            match result {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(event) => changed.extend(
                    event
                        .paths
                        .into_iter()
                        .filter(|p| !is_ignored(p, &bundle_file)),
                ),
                Err(e) => warn!(error = %e, "Watch error"),
            }
        }

        if changed.is_empty() {
            continue;
        }
        if tx.blocking_send(changed.into_iter().collect()).is_err() {
            break;
        }
    }

    Ok(())
}
