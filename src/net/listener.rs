//! Proxy listener with port fallback.
//!
//! # Responsibilities
//! - Bind the preferred port, falling back through a fixed list
//! - Run the accept loop and spawn one relay task per connection
//! - Start/stop on demand, reporting its phase and bound port
//!
//! # Design Decisions
//! - No connection cap: every accepted socket gets its own task
//! - `stop()` only stops accepting; in-flight relays run to completion
//! - Accept errors are logged and retried after a short pause

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::net::connection::ConnectionTracker;
use crate::observability::metrics;
use crate::relay::{self, RelayContext};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Every candidate port was unavailable.
#[derive(Debug, Error)]
#[error("failed to bind {host} on any of ports {ports:?}: {source}")]
pub struct BindError {
    pub host: String,
    /// Ports tried, in order.
    pub ports: Vec<u16>,
    /// Error from the last attempt.
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerPhase {
    Stopped,
    Binding,
    Listening,
}

/// Snapshot of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListenerStatus {
    pub phase: ListenerPhase,
    pub running: bool,
    pub bound_port: Option<u16>,
    pub active_connections: u64,
}

enum ListenerState {
    Stopped,
    Binding,
    Listening {
        port: u16,
        shutdown: CancellationToken,
        accept_task: JoinHandle<()>,
    },
}

pub struct ProxyListener {
    bind_host: String,
    ctx: RelayContext,
    tracker: ConnectionTracker,
    state: Mutex<ListenerState>,
    /// Serializes `start`/`stop` so transitions never interleave.
    transition: tokio::sync::Mutex<()>,
}

impl ProxyListener {
    pub fn new(bind_host: impl Into<String>, ctx: RelayContext) -> Self {
        Self {
            bind_host: bind_host.into(),
            ctx,
            tracker: ConnectionTracker::new(),
            state: Mutex::new(ListenerState::Stopped),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// Bind and start accepting. Returns the bound port.
    ///
    /// Already listening: returns the current port without rebinding.
    pub async fn start(
        &self,
        preferred_port: u16,
        fallback_ports: &[u16],
    ) -> Result<u16, BindError> {
        let _transition = self.transition.lock().await;
        if let ListenerState::Listening { port, .. } = &*self.state() {
            return Ok(*port);
        }

        *self.state() = ListenerState::Binding;
        let (listener, port) = match self.bind_first(preferred_port, fallback_ports).await {
            Ok(bound) => bound,
            Err(e) => {
                *self.state() = ListenerState::Stopped;
                tracing::error!(error = %e, "Proxy listener failed to start");
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            port,
            self.ctx.clone(),
            self.tracker.clone(),
            shutdown.clone(),
        ));
        *self.state() = ListenerState::Listening { port, shutdown, accept_task };

        tracing::info!(host = %self.bind_host, port, "Proxy listening");
        Ok(port)
    }

    /// Stop accepting and release the port. No-op when stopped.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;
        let previous = std::mem::replace(&mut *self.state(), ListenerState::Stopped);

        if let ListenerState::Listening { port, shutdown, accept_task } = previous {
            shutdown.cancel();
            if let Err(e) = accept_task.await {
                tracing::warn!(port, error = %e, "Accept loop ended abnormally");
            }
            tracing::info!(
                port,
                active_connections = self.tracker.active_count(),
                "Proxy listener stopped"
            );
        }
    }

    pub fn status(&self) -> ListenerStatus {
        let (phase, bound_port) = match &*self.state() {
            ListenerState::Stopped => (ListenerPhase::Stopped, None),
            ListenerState::Binding => (ListenerPhase::Binding, None),
            ListenerState::Listening { port, .. } => (ListenerPhase::Listening, Some(*port)),
        };
        ListenerStatus {
            phase,
            running: phase == ListenerPhase::Listening,
            bound_port,
            active_connections: self.tracker.active_count(),
        }
    }

    pub fn bound_port(&self) -> Option<u16> {
        self.status().bound_port
    }

    async fn bind_first(
        &self,
        preferred_port: u16,
        fallback_ports: &[u16],
    ) -> Result<(TcpListener, u16), BindError> {
        let mut tried = Vec::with_capacity(fallback_ports.len() + 1);
        let mut last_error = None;

        for port in std::iter::once(preferred_port).chain(fallback_ports.iter().copied()) {
            tried.push(port);
            let bound = match TcpListener::bind((self.bind_host.as_str(), port)).await {
                Ok(listener) => listener.local_addr().map(|addr| (listener, addr.port())),
                Err(e) => Err(e),
            };
            match bound {
                Ok(bound) => {
                    if port != preferred_port {
                        tracing::info!(
                            preferred_port,
                            port,
                            "Preferred port unavailable, using fallback"
                        );
                    }
                    return Ok(bound);
                }
                Err(e) => {
                    tracing::debug!(host = %self.bind_host, port, error = %e, "Port unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(BindError {
            host: self.bind_host.clone(),
            ports: tried,
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "no ports to try")
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn accept_loop(
    listener: TcpListener,
    port: u16,
    ctx: RelayContext,
    tracker: ConnectionTracker,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                let guard = tracker.track();
                metrics::record_connection_accepted();
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer_addr = %peer,
                    "Connection accepted"
                );

                let ctx = ctx.clone();
                tokio::spawn(async move {
                    relay::handle_connection(stream, peer, guard.id(), ctx).await;
                    drop(guard);
                });
            }
            Err(e) => {
                if shutdown.is_cancelled() {
                    break;
                }
                tracing::warn!(port, error = %e, "Accept failed");
                metrics::record_accept_error();
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
    tracing::debug!(port, "Accept loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelaySettings;
    use crate::throttle::ActiveProfile;

    fn listener() -> ProxyListener {
        let ctx = RelayContext::new(ActiveProfile::default(), RelaySettings::default());
        ProxyListener::new("127.0.0.1", ctx)
    }

    fn occupied_port() -> (std::net::TcpListener, u16) {
        let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[tokio::test]
    async fn ephemeral_port_reports_real_port() {
        let listener = listener();
        assert_eq!(listener.status().phase, ListenerPhase::Stopped);

        let port = listener.start(0, &[]).await.unwrap();
        assert_ne!(port, 0);
        let status = listener.status();
        assert!(status.running);
        assert_eq!(status.bound_port, Some(port));

        listener.stop().await;
        assert_eq!(listener.status().phase, ListenerPhase::Stopped);
        assert_eq!(listener.bound_port(), None);
    }

    #[tokio::test]
    async fn start_while_listening_keeps_port() {
        let listener = listener();
        let first = listener.start(0, &[]).await.unwrap();
        let second = listener.start(0, &[]).await.unwrap();
        assert_eq!(first, second);
        listener.stop().await;
    }

    #[tokio::test]
    async fn falls_back_when_preferred_is_taken() {
        let (_held, taken) = occupied_port();
        let (free_socket, free) = occupied_port();
        drop(free_socket);

        let listener = listener();
        let port = listener.start(taken, &[free]).await.unwrap();
        assert_eq!(port, free);
        listener.stop().await;
    }

    #[tokio::test]
    async fn all_ports_taken_is_a_bind_error() {
        let (_a, first) = occupied_port();
        let (_b, second) = occupied_port();

        let listener = listener();
        let err = listener.start(first, &[second]).await.unwrap_err();
        assert_eq!(err.ports, vec![first, second]);
        assert_eq!(listener.status().phase, ListenerPhase::Stopped);
    }

    #[tokio::test]
    async fn stop_releases_the_port() {
        let listener = listener();
        let port = listener.start(0, &[]).await.unwrap();
        listener.stop().await;

        std::net::TcpListener::bind(("127.0.0.1", port)).expect("port should be free after stop");
        listener.stop().await;
    }
}
