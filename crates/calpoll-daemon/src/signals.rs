//! OS signal handling for long-running watches.
//!
//! - SIGTERM/SIGINT: shut every scheduler down
//! - SIGHUP: fetch every feed now

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::SchedulerHandle;

/// Signals the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM, SIGINT or Ctrl+C.
    Shutdown,
    /// SIGHUP.
    Refresh,
}

/// Fans OS signals out to watch channels.
pub struct SignalHandler {
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    /// Bumped once per refresh request.
    refresh_tx: Arc<watch::Sender<u64>>,
    refresh_rx: watch::Receiver<u64>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = watch::channel(0);

        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            refresh_tx: Arc::new(refresh_tx),
            refresh_rx,
        }
    }

    /// Installs the OS handlers and spawns the listener task.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError::Signal`] if a handler cannot be installed.
    #[cfg(unix)]
    pub fn spawn_listener(&self) -> DaemonResult<JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
        let mut sighup = signal(SignalKind::hangup()).map_err(DaemonError::Signal)?;

        let shutdown_tx = self.shutdown_tx.clone();
        let refresh_tx = self.refresh_tx.clone();

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, shutting down");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sighup.recv() => {
                        info!("Received SIGHUP, fetching all feeds");
                        refresh_tx.send_modify(|n| *n += 1);
                    }
                }
            }
            debug!("Signal listener stopped");
        }))
    }

    /// Installs a Ctrl+C handler and spawns the listener task.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) -> DaemonResult<JoinHandle<()>> {
        let shutdown_tx = self.shutdown_tx.clone();

        Ok(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, shutting down");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }))
    }

    /// Returns a future that completes when shutdown is signaled.
    pub fn shutdown(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_rx.clone(),
        }
    }

    /// Returns a stream of refresh requests.
    pub fn refreshes(&self) -> RefreshSignal {
        let mut rx = self.refresh_rx.clone();
        rx.mark_unchanged();
        RefreshSignal { rx }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Programmatically triggers a shutdown.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Programmatically triggers a refresh.
    pub fn trigger_refresh(&self) {
        self.refresh_tx.send_modify(|n| *n += 1);
    }

    /// Dispatches a signal as if it came from the OS.
    pub fn raise(&self, signal: Signal) {
        match signal {
            Signal::Shutdown => self.trigger_shutdown(),
            Signal::Refresh => self.trigger_refresh(),
        }
    }
}

/// Completes when shutdown is signaled.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal. Also returns if the handler is dropped.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|down| *down).await;
    }
}

/// Yields once per refresh request.
pub struct RefreshSignal {
    rx: watch::Receiver<u64>,
}

impl RefreshSignal {
    /// Waits for the next refresh request. Returns false once the handler
    /// is gone.
    pub async fn next(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Routes signals to schedulers until shutdown, then stops them all.
pub async fn supervise(handles: &[SchedulerHandle], signals: &SignalHandler) {
    let shutdown = signals.shutdown().wait();
    tokio::pin!(shutdown);
    let mut refreshes = signals.refreshes();

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            more = refreshes.next() => {
                if !more {
                    break;
                }
                for handle in handles {
                    if let Err(e) = handle.request_fetch() {
                        warn!(url = %handle.url(), error = %e, "Could not request fetch");
                    }
                }
            }
        }
    }

    for handle in handles {
        handle.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_shutdown() {
        let handler = SignalHandler::new();
        assert!(!handler.is_shutdown());

        handler.raise(Signal::Shutdown);

        assert!(handler.is_shutdown());
        let result = tokio::time::timeout(Duration::from_millis(100), handler.shutdown().wait()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_signal_wakes_waiter() {
        let handler = SignalHandler::new();
        let shutdown = handler.shutdown();

        let waiter = tokio::spawn(shutdown.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        handler.trigger_shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), waiter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn refresh_requests_are_observed() {
        let handler = SignalHandler::new();
        handler.trigger_refresh();

        // subscribers only see requests made after they subscribed
        let mut refreshes = handler.refreshes();
        handler.raise(Signal::Refresh);

        let result = tokio::time::timeout(Duration::from_millis(100), refreshes.next()).await;
        assert_eq!(result.ok(), Some(true));
    }

    #[tokio::test]
    async fn refresh_stream_ends_with_handler() {
        let handler = SignalHandler::new();
        let mut refreshes = handler.refreshes();
        drop(handler);

        assert!(!refreshes.next().await);
    }
}
