//! Plugin directory hot reload
//!
//! Watches the plugin directory and triggers a reload after file activity
//! settles. The debounce timer restarts on every event so an editor's
//! save-then-rename burst coalesces into one reload.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::PluginManager;

/// Quiet period before a reload fires
const DEBOUNCE: Duration = Duration::from_secs(2);

/// Start watching the plugin directory. Returns once the watcher task is
/// spawned; the task runs until `shutdown` is cancelled.
pub fn start_plugin_watcher(
    manager: Arc<PluginManager>,
    shutdown: CancellationToken,
) -> Result<()> {
    let dir = manager.plugins_dir().clone();
    if !dir.is_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create plugins directory {}", dir.display()))?;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<()>();

    let mut watcher = RecommendedWatcher::new(
        move |result: std::result::Result<Event, notify::Error>| match result {
            Ok(event) => {
                if event.paths.iter().any(|p| is_relevant(p)) {
                    let _ = tx.send(());
                }
            }
            Err(e) => debug!("Plugin watcher event error: {e}"),
        },
        notify::Config::default(),
    )
    .context("Failed to create plugin file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch plugins directory {}", dir.display()))?;

    info!("Plugin file watcher started on: {}", dir.display());

    tokio::spawn(async move {
        // Keep the watcher alive for the lifetime of the task
        let _watcher = watcher;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = rx.recv() => {
                    if event.is_none() {
                        break;
                    }
                    // Restartable debounce: every further event resets the timer
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            _ = tokio::time::sleep(DEBOUNCE) => break,
                            event = rx.recv() => {
                                if event.is_none() {
                                    return;
                                }
                            }
                        }
                    }

                    info!("Plugin directory changed, hot-reloading plugins");
                    let (loaded, errors) = manager.reload().await;
                    if errors.is_empty() {
                        info!("Hot-reload complete: {} plugin(s) loaded", loaded.len());
                    } else {
                        error!(
                            "Hot-reload complete: {} plugin(s) loaded, {} file(s) skipped",
                            loaded.len(),
                            errors.len()
                        );
                    }
                }
            }
        }
        info!("Plugin file watcher stopped");
    });

    Ok(())
}

/// Only visible `.toml` files trigger a reload
fn is_relevant(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("toml") {
        return false;
    }
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('_') && !name.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_filter_matches_loader_rules() {
        assert!(is_relevant(Path::new("/plugins/mysubs.toml")));
        assert!(!is_relevant(Path::new("/plugins/_draft.toml")));
        assert!(!is_relevant(Path::new("/plugins/.hidden.toml")));
        assert!(!is_relevant(Path::new("/plugins/readme.md")));
    }
}
