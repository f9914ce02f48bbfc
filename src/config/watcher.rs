//! Config file watching for hot reload.
//!
//! A change to the file is parsed and validated off the request path; only
//! configs that pass validation are forwarded to the server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Forwards every valid revision of a config file to a channel.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end the server drains.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Dropping the returned handle stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let reload_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => reload(&reload_path, &updates),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(_) | EventKind::Create(_))
}

fn reload(path: &Path, updates: &mpsc::UnboundedSender<GuardConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config change detected, applying");
            if updates.send(config).is_err() {
                tracing::debug!("Config receiver dropped, ignoring change");
            }
        }
        Err(e) => tracing::error!(
            path = %path.display(),
            error = %e,
            "Config reload rejected, keeping current configuration"
        ),
    }
}
