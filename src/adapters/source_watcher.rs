use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Mutex,
};

use eyre::{Context, Result};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches route definition files and signals when any of them changes, so a
/// host can rebuild the router and swap it in through a `RouterHandle`.
///
/// Signals are coalesced: at most one pending notification is buffered.
pub struct RouteSourceWatcher {
    paths: Vec<PathBuf>,
    // Kept alive for as long as the watcher should run.
    _watcher: notify::RecommendedWatcher,
    update_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl RouteSourceWatcher {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Result<Self> {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(1);

        let file_names: HashSet<OsString> = paths
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_owned())
                    .ok_or_else(|| eyre::eyre!("Invalid route source path: {}", p.display()))
            })
            .collect::<Result<_>>()?;

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if (event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove())
                            && event
                                .paths
                                .iter()
                                .any(|p| p.file_name().is_some_and(|n| file_names.contains(n)))
                        {
                            tracing::debug!("Route source changed: {:?}", event.kind);
                            // A full channel already holds a pending signal.
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => tracing::error!("Route source watch error: {:?}", e),
                }
            })?;

        let dirs: HashSet<&Path> = paths
            .iter()
            .map(|p| match p.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new("."),
            })
            .collect();
        for dir in dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .wrap_err_with(|| format!("Failed to watch route directory {}", dir.display()))?;
        }

        tracing::info!(sources = paths.len(), "Watching route sources");
        Ok(Self {
            paths,
            _watcher: watcher,
            update_rx: Mutex::new(Some(rx)),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Take the change notification channel. Only the first call gets it.
    pub fn watch(&self) -> Option<mpsc::Receiver<()>> {
        match self.update_rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(e) => {
                tracing::error!("Route source watcher lock poisoned: {}", e);
                None
            }
        }
    }
}
