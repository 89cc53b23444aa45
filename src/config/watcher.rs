//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Config file change detected, reloading");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload config, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// What a reloaded configuration changes at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadPlan {
    /// Profile to swap in, if it changed.
    pub profile: Option<crate::throttle::ProfileName>,
    /// Sections that changed but only take effect after a restart.
    pub restart_required: Vec<&'static str>,
}

impl ReloadPlan {
    pub fn between(current: &ProxyConfig, next: &ProxyConfig) -> Self {
        let profile = (current.throttle.profile != next.throttle.profile)
            .then_some(next.throttle.profile);

        let mut restart_required = Vec::new();
        if current.listener != next.listener {
            restart_required.push("listener");
        }
        if current.relay != next.relay {
            restart_required.push("relay");
        }
        if current.admin != next.admin {
            restart_required.push("admin");
        }
        if current.observability != next.observability {
            restart_required.push("observability");
        }

        Self {
            profile,
            restart_required,
        }
    }
}
