//! File watching that reports which modules changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::Config as NotifyConfig;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;

pub struct WatcherConfig {
    pub debounce_ms: u64,
    pub project_root: PathBuf,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            project_root: PathBuf::from("."),
        }
    }
}

/// Watches the project root and maps changed paths to their modules.
pub struct ModuleWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<notify::Result<Event>>,
    config: WatcherConfig,
    module_roots: Vec<(PathBuf, String)>,
    /// Modules seen in the batch being debounced. Kept here so a dropped
    /// `next_changes` future does not lose them.
    pending: BTreeSet<String>,
}

impl ModuleWatcher {
    pub fn new(config: WatcherConfig, graph: &DependencyGraph) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // The receiver is gone once the watcher is being dropped.
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::Watcher(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&config.project_root, RecursiveMode::Recursive)
            .map_err(|e| Error::Watcher(format!("Failed to watch directory: {}", e)))?;

        let mut module_watcher = Self {
            _watcher: watcher,
            receiver: rx,
            config,
            module_roots: Vec::new(),
            pending: BTreeSet::new(),
        };
        module_watcher.set_graph(graph);

        Ok(module_watcher)
    }

    /// Refreshes the path-to-module mapping after the graph was reloaded.
    pub fn set_graph(&mut self, graph: &DependencyGraph) {
        self.module_roots = module_roots(&self.config.project_root, graph);
    }

    /// Waits for the next batch of changes and returns the affected modules.
    ///
    /// Events arriving within the debounce window of each other are merged.
    /// Batches that touch no module are skipped. Cancel safe: changes seen
    /// by a dropped call are returned by the next one.
    pub async fn next_changes(&mut self) -> Result<BTreeSet<String>> {
        let debounce = Duration::from_millis(self.config.debounce_ms);

        loop {
            if self.pending.is_empty() {
                let first = self
                    .receiver
                    .recv()
                    .await
                    .ok_or_else(|| Error::Watcher("Watcher channel disconnected".to_string()))?;
                self.collect(first)?;
            }

            while let Ok(Some(next)) = tokio::time::timeout(debounce, self.receiver.recv()).await {
                self.collect(next)?;
            }

            if !self.pending.is_empty() {
                return Ok(std::mem::take(&mut self.pending));
            }
        }
    }

    fn collect(&mut self, event: notify::Result<Event>) -> Result<()> {
        let event = event.map_err(|e| Error::Watcher(format!("Watcher error: {}", e)))?;
        if matches!(event.kind, EventKind::Access(_)) {
            return Ok(());
        }
        let roots = &self.module_roots;
        self.pending.extend(
            event
                .paths
                .iter()
                .filter_map(|path| module_for_path(roots, path)),
        );
        Ok(())
    }
}

/// Absolute module roots, longest first so nested modules win.
fn module_roots(project_root: &Path, graph: &DependencyGraph) -> Vec<(PathBuf, String)> {
    let base = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let mut roots: Vec<(PathBuf, String)> = graph
        .all_modules()
        .into_iter()
        .map(|m| (base.join(&m.path), m.name.clone()))
        .collect();
    roots.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
    roots
}

/// Finds the module whose root contains `path`.
pub fn module_for_path(module_roots: &[(PathBuf, String)], path: &Path) -> Option<String> {
    module_roots
        .iter()
        .find(|(root, _)| path.starts_with(root))
        .map(|(_, name)| name.clone())
}
