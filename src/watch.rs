//! File watching for the render pipeline
//!
//! Re-runs a render whenever one of its input files changes. A failing
//! re-run is logged and the watch keeps going, so a half-saved style file
//! does not kill the loop.

use anyhow::Result;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use tracing::{debug, error, info};

/// Watch `files` and call `rerun` on every modification. Blocks forever.
pub fn watch_and_rerun<F>(files: &[PathBuf], mut rerun: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    info!("Watching for changes");
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(tx, Config::default())?;
    for file in files {
        watcher.watch(file, RecursiveMode::NonRecursive)?;
    }

    loop {
        match rx.recv() {
            Ok(event) => {
                if let Ok(event) = event {
                    if let EventKind::Modify(_) = event.kind {
                        debug!("File modified {:?}", event.paths);
                        info!("Change detected, re-rendering");
                        if let Err(e) = rerun() {
                            error!("Re-render failed: {}", e);
                        }
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        }
    }
}
