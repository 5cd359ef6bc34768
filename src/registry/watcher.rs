//! Source tree watcher for hot reload.

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::lifecycle::shutdown::ShutdownReceiver;
use crate::registry::{collect_files, is_ignored, Registry, RegistryError};

/// A filesystem change relevant to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

impl SourceEvent {
    pub fn path(&self) -> &Path {
        match self {
            SourceEvent::Added(p) | SourceEvent::Changed(p) | SourceEvent::Removed(p) => p,
        }
    }
}

impl Registry {
    /// Apply one filesystem event.
    pub fn apply(&self, event: &SourceEvent) -> Result<(), RegistryError> {
        match event {
            SourceEvent::Added(path) => self.add(path),
            SourceEvent::Changed(path) => self.change(path),
            SourceEvent::Removed(path) => self.remove(path).map(|_| ()),
        }
    }
}

/// Watches the registry root and forwards classified events.
pub struct SourceWatcher {
    root: PathBuf,
    poll_interval: Duration,
    event_tx: mpsc::UnboundedSender<SourceEvent>,
}

impl SourceWatcher {
    /// Create a new SourceWatcher.
    ///
    /// Returns the watcher and a receiver for source events.
    pub fn new(
        root: &Path,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SourceEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                root: root.to_path_buf(),
                poll_interval,
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching in a background thread. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx.clone();
        let root = self.root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for source_event in classify(&root, &event) {
                        tracing::debug!(event = ?source_event, "Source change detected");
                        let _ = tx.send(source_event);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        tracing::info!(path = ?self.root, "Source watcher started");
        Ok(watcher)
    }
}

/// Map a raw notification to registry events, dropping ignored paths.
///
/// A directory that appears (created or moved in) expands to one `Added`
/// per file beneath it; a moved-in tree produces no per-file events.
pub fn classify(root: &Path, event: &Event) -> Vec<SourceEvent> {
    let paths = event.paths.iter().filter(|p| !ignored(root, p));

    let events: Vec<SourceEvent> = match event.kind {
        EventKind::Create(_) => paths.cloned().map(SourceEvent::Added).collect(),
        EventKind::Remove(_) => paths.cloned().map(SourceEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.cloned().map(SourceEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.cloned().map(SourceEvent::Added).collect()
        }
        // paths = [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .filter(|(_, p)| !ignored(root, p))
            .map(|(i, p)| {
                if i == 0 {
                    SourceEvent::Removed(p.clone())
                } else {
                    SourceEvent::Added(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|p| {
                if p.exists() {
                    SourceEvent::Added(p.clone())
                } else {
                    SourceEvent::Removed(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths.cloned().map(SourceEvent::Changed).collect(),
        _ => Vec::new(),
    };

    events
        .into_iter()
        .flat_map(expand_directory)
        .collect()
}

fn expand_directory(event: SourceEvent) -> Vec<SourceEvent> {
    match event {
        SourceEvent::Added(path) if path.is_dir() => {
            let mut files = Vec::new();
            if let Err(e) = collect_files(&path, &mut files) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to scan added directory");
            }
            files.sort();
            files.into_iter().map(SourceEvent::Added).collect()
        }
        // Directory metadata and content listing changes carry no endpoint.
        SourceEvent::Changed(path) if path.is_dir() => Vec::new(),
        event => vec![event],
    }
}

fn ignored(root: &Path, path: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    is_ignored(relative)
}

/// Drain `events` into `registry` until the channel closes or shutdown fires.
pub async fn apply_events(
    registry: Arc<Registry>,
    mut events: mpsc::UnboundedReceiver<SourceEvent>,
    mut shutdown: ShutdownReceiver,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = shutdown.recv() => break,
        };

        let registry = registry.clone();
        let path = event.path().to_path_buf();
        let result = tokio::task::spawn_blocking(move || registry.apply(&event)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(RegistryError::UnknownSource(_))) => {}
            Ok(Err(e)) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to apply source change. Keeping current endpoint.");
            }
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Source update task failed"),
        }
    }

    tracing::info!("Source event loop stopped");
}
