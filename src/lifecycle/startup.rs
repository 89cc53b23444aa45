//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the proxy listener (when `auto_start` is set) and the admin API
//! - Apply config reloads until a shutdown signal arrives

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::admin::{self, AdminState};
use crate::config::{ConfigWatcher, ProxyConfig, ReloadPlan};
use crate::control::ProxyService;
use crate::lifecycle::signals::shutdown_signal;
use crate::net::BindError;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to bind admin API on {address}: {source}")]
    AdminBind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// Run the proxy until Ctrl-C/SIGTERM.
pub async fn run(config: ProxyConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    run_until(config, config_path, shutdown_signal()).await
}

/// Run the proxy until `shutdown` resolves.
pub async fn run_until<F>(
    config: ProxyConfig,
    config_path: Option<PathBuf>,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = Arc::new(ProxyService::new(&config));
    tracing::info!(profile = %config.throttle.profile, "Throttle profile active");

    if config.listener.auto_start {
        service.start().await?;
    }

    let stop_admin = CancellationToken::new();
    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(config.admin.bind_address.as_str())
            .await
            .map_err(|source| StartupError::AdminBind {
                address: config.admin.bind_address.clone(),
                source,
            })?;
        let state = AdminState::new(Arc::clone(&service), &config.admin.api_key);
        let token = stop_admin.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, state, token).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }))
    } else {
        None
    };

    // Dropping the notify handle stops the watch.
    let (_watcher, mut updates) = match &config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    tokio::pin!(shutdown);
    let mut current = config;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(next) = updates.recv() => {
                apply_reload(&service, &current, &next);
                current = next;
            }
        }
    }

    service.stop().await;
    stop_admin.cancel();
    if let Some(task) = admin_task {
        let _ = task.await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn apply_reload(service: &ProxyService, current: &ProxyConfig, next: &ProxyConfig) {
    let plan = ReloadPlan::between(current, next);
    if let Some(name) = plan.profile {
        service.set_named_profile(name);
    }
    if !plan.restart_required.is_empty() {
        tracing::warn!(
            sections = ?plan.restart_required,
            "Config sections changed; restart to apply"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::ProfileName;

    #[test]
    fn reload_swaps_profile_on_running_service() {
        let current = ProxyConfig::default();
        let service = ProxyService::new(&current);
        let mut next = current.clone();
        next.throttle.profile = ProfileName::Gprs;

        apply_reload(&service, &current, &next);
        assert_eq!(service.current_profile(), ProfileName::Gprs.profile());
    }

    #[tokio::test]
    async fn startup_fails_when_no_port_is_free() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ProxyConfig::default();
        config.listener.bind_host = "127.0.0.1".into();
        config.listener.preferred_port = held.local_addr().unwrap().port();
        config.listener.fallback_ports = vec![];

        let result = run_until(config, None, std::future::pending()).await;
        assert!(matches!(result, Err(StartupError::Bind(_))));
    }

    #[tokio::test]
    async fn runs_until_shutdown_resolves() {
        let mut config = ProxyConfig::default();
        config.listener.bind_host = "127.0.0.1".into();
        config.listener.preferred_port = 0;
        config.listener.fallback_ports = vec![];

        run_until(config, None, async {}).await.unwrap();
    }
}
