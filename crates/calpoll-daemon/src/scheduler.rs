//! Per-feed fetch scheduler.
//!
//! Each feed runs as one tokio task owning a [`FeedScheduler`]. The task:
//! - fetches immediately on start
//! - re-arms a single reload timer after every pass (nominal interval on
//!   success, the backoff delay on failure)
//! - answers manual triggers, coalescing any that arrive mid-fetch
//! - stops on shutdown, abandoning an in-flight request without delivering it
//!
//! All interaction from outside goes through a cloneable [`SchedulerHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use calpoll_core::NormalizedEvent;
use calpoll_feed::{
    FeedConfig, FeedError, FeedErrorCode, FeedParser, FetchRequest, NormalizeOptions, Transport,
    normalize_entries,
};
use chrono::Local;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::error::{DaemonError, DaemonResult};
use crate::listener::FeedListener;
use crate::session::{FetchSession, RetryDecision};

/// Environment variable that switches schedulers into test mode.
pub const TEST_MODE_ENV: &str = "CALPOLL_TEST_MODE";

/// Scheduler behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Never arm the reload timer; fetches only happen on start and on trigger.
    pub test_mode: bool,
}

impl SchedulerOptions {
    /// Reads options from the environment.
    pub fn from_env() -> Self {
        Self {
            test_mode: flag_enabled(std::env::var(TEST_MODE_ENV).ok().as_deref()),
        }
    }

    /// Builder: set test mode.
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }
}

fn flag_enabled(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Commands that can be sent to a scheduler.
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Fetch now, cancelling the armed timer. Coalesced if a fetch is in flight.
    TriggerFetch {
        respond: Option<oneshot::Sender<FetchReport>>,
    },
    /// Stop the scheduler.
    Shutdown,
}

/// Outcome of a triggered fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchReport {
    /// Events were delivered to the listener.
    Delivered {
        events: usize,
        next_delay: Option<Duration>,
    },
    /// The pass failed; the listener got the error.
    Failed {
        code: FeedErrorCode,
        message: String,
        next_delay: Option<Duration>,
    },
    /// A fetch was already in flight; no new request was made.
    Coalesced,
    /// The scheduler shut down before the pass finished.
    Cancelled,
}

impl FetchReport {
    /// The delay of the timer armed after this pass. `None` when no timer
    /// was armed (test mode, coalesced or cancelled passes).
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            Self::Delivered { next_delay, .. } | Self::Failed { next_delay, .. } => *next_delay,
            Self::Coalesced | Self::Cancelled => None,
        }
    }
}

/// Shared session state.
pub type SharedSession = Arc<RwLock<FetchSession>>;

/// Why the scheduler is about to fetch.
enum Wake {
    Scheduled,
    Manual(Option<oneshot::Sender<FetchReport>>),
}

/// The armed reload timer.
#[derive(Debug, Clone, Copy)]
struct PendingFetch {
    deadline: Instant,
}

/// Shutdown flag shared by a scheduler and its handles.
///
/// Listener hooks run while the lock is held, so once [`close`] returns no
/// hook is running and none will start.
///
/// [`close`]: ShutdownGate::close
#[derive(Debug, Default)]
struct ShutdownGate(Mutex<bool>);

impl ShutdownGate {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        *self.lock()
    }

    /// Closes the gate, waiting for a running hook. Returns `true` on the
    /// first call.
    fn close(&self) -> bool {
        let mut closed = self.lock();
        !std::mem::replace(&mut *closed, true)
    }

    /// Runs `hook` unless the gate is closed. Returns whether it ran.
    fn run_open(&self, hook: impl FnOnce()) -> bool {
        let closed = self.lock();
        if *closed {
            return false;
        }
        hook();
        true
    }
}

/// Drives fetches for a single feed.
pub struct FeedScheduler {
    session: SharedSession,
    request: FetchRequest,
    normalize: NormalizeOptions,
    transport: Arc<dyn Transport>,
    parser: Arc<dyn FeedParser>,
    listener: Arc<dyn FeedListener>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    shut_down: Arc<ShutdownGate>,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: Option<mpsc::Receiver<SchedulerCommand>>,
}

impl FeedScheduler {
    /// Creates a scheduler for one feed using the system clock.
    pub fn new(
        config: FeedConfig,
        transport: Arc<dyn Transport>,
        parser: Arc<dyn FeedParser>,
        listener: Arc<dyn FeedListener>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            request: FetchRequest::for_feed(&config),
            normalize: NormalizeOptions::from(&config),
            session: Arc::new(RwLock::new(FetchSession::new(config))),
            transport,
            parser,
            listener,
            clock: Arc::new(SystemClock),
            options: SchedulerOptions::default(),
            shut_down: Arc::new(ShutdownGate::default()),
            command_tx,
            command_rx: Some(command_rx),
        }
    }

    /// Builder: use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: set scheduler options.
    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns a handle for controlling the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            url: self.request.url.clone(),
            command_tx: self.command_tx.clone(),
            session: self.session.clone(),
            shut_down: self.shut_down.clone(),
            clock: self.clock.clone(),
        }
    }

    /// Spawns the scheduler onto the current runtime.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.is_closed()
    }

    /// Runs the scheduler until shutdown.
    pub async fn run(mut self) {
        let Some(mut commands) = self.command_rx.take() else {
            warn!(url = %self.request.url, "scheduler is already running");
            return;
        };

        let interval = self.session.read().await.nominal_interval();
        info!(
            url = %self.request.url,
            interval_secs = interval.as_secs(),
            test_mode = self.options.test_mode,
            "Feed scheduler started"
        );

        let mut pending: Option<PendingFetch> = None;
        let mut wake = Some(Wake::Scheduled);

        loop {
            if self.is_shut_down() {
                break;
            }

            if let Some(reason) = wake.take() {
                let respond = match reason {
                    Wake::Manual(respond) => respond,
                    Wake::Scheduled => None,
                };
                // the pass re-arms; never leave two timers around
                pending = None;

                let Some(report) = self.fetch_pass(&mut commands).await else {
                    reply(respond, FetchReport::Cancelled);
                    break;
                };
                pending = self.arm(&report).await;
                reply(respond, report);
                continue;
            }

            tokio::select! {
                _ = wait_for(pending.map(|p| p.deadline)) => {
                    debug!(url = %self.request.url, "Reload timer fired");
                    wake = Some(Wake::Scheduled);
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(SchedulerCommand::TriggerFetch { respond }) => {
                            debug!(url = %self.request.url, "Received TriggerFetch command");
                            wake = Some(Wake::Manual(respond));
                        }
                        Some(SchedulerCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        self.shut_down.close();
        self.session.write().await.shut_down();
        info!(url = %self.request.url, "Feed scheduler stopped");
    }

    /// Runs one fetch while still answering commands.
    ///
    /// Returns `None` if a shutdown arrived before the fetch finished; the
    /// in-flight request is dropped.
    async fn fetch_pass(&self, commands: &mut mpsc::Receiver<SchedulerCommand>) -> Option<FetchReport> {
        let fetch = self.fetch_once();
        tokio::pin!(fetch);

        loop {
            tokio::select! {
                biased;
                report = &mut fetch => return Some(report),
                cmd = commands.recv() => {
                    match cmd {
                        Some(SchedulerCommand::TriggerFetch { respond }) => {
                            debug!(url = %self.request.url, "Fetch in flight, coalescing trigger");
                            reply(respond, FetchReport::Coalesced);
                        }
                        Some(SchedulerCommand::Shutdown) | None => {
                            info!(url = %self.request.url, "Shutdown during fetch, abandoning request");
                            return None;
                        }
                    }
                }
            }
        }
    }

    async fn fetch_once(&self) -> FetchReport {
        let url = &self.request.url;
        self.session.write().await.begin_fetch(self.clock.now());
        debug!(%url, "Fetching feed");

        let response = match self.transport.fetch(&self.request).await {
            Ok(response) => response,
            Err(error) => {
                let error = error.with_url(url.as_str());
                warn!(%url, error = %error, "Fetch failed");
                return self.fail(error).await;
            }
        };

        let now = self.clock.now();
        if !response.is_success() {
            let RetryDecision { error, delay } =
                self.session.write().await.classify_response(&response, now);
            return self.report_failure(error, delay).await;
        }

        let entries = match self.parser.parse(&response.body) {
            Ok(entries) => entries,
            Err(error) => {
                let error = error.with_url(url.as_str());
                warn!(%url, error = %error, "Feed payload could not be parsed");
                return self.fail(error).await;
            }
        };

        let events = normalize_entries(&entries, &self.normalize, &now.with_timezone(&Local));
        let count = events.len();
        let delay = self.session.write().await.record_success(events, now);

        let snapshot = self.session.read().await.clone();
        let delivered = self.shut_down.run_open(|| {
            info!(%url, entries = entries.len(), events = count, "Broadcasting events");
            self.listener.on_events(&snapshot, snapshot.events());
        });
        if !delivered {
            debug!(%url, "Shut down, dropping events");
        }

        FetchReport::Delivered {
            events: count,
            next_delay: self.timer_delay(delay),
        }
    }

    /// Records a failure that retries at the nominal interval.
    async fn fail(&self, error: FeedError) -> FetchReport {
        let mut session = self.session.write().await;
        let nominal = session.nominal_interval();
        let delay = session.record_failure(&error, nominal);
        drop(session);
        self.report_failure(error, delay).await
    }

    async fn report_failure(&self, error: FeedError, delay: Duration) -> FetchReport {
        let snapshot = self.session.read().await.clone();
        self.shut_down.run_open(|| self.listener.on_error(&snapshot, &error));
        FetchReport::Failed {
            code: error.code(),
            message: error.message().to_string(),
            next_delay: self.timer_delay(delay),
        }
    }

    fn timer_delay(&self, delay: Duration) -> Option<Duration> {
        (!self.options.test_mode).then_some(delay)
    }

    async fn arm(&self, report: &FetchReport) -> Option<PendingFetch> {
        if self.is_shut_down() {
            return None;
        }
        let Some(delay) = report.next_delay() else {
            debug!(url = %self.request.url, "Test mode, reload timer not armed");
            return None;
        };
        let Some(deadline) = Instant::now().checked_add(delay) else {
            warn!(url = %self.request.url, delay_secs = delay.as_secs(), "Delay out of range, reload timer not armed");
            return None;
        };

        let at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| self.clock.now().checked_add_signed(d));
        self.session.write().await.set_next_fetch(at);
        debug!(url = %self.request.url, delay_secs = delay.as_secs(), "Scheduling next fetch");

        Some(PendingFetch { deadline })
    }
}

fn reply(respond: Option<oneshot::Sender<FetchReport>>, report: FetchReport) {
    if let Some(tx) = respond {
        let _ = tx.send(report);
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Handle for controlling a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    url: Url,
    command_tx: mpsc::Sender<SchedulerCommand>,
    session: SharedSession,
    shut_down: Arc<ShutdownGate>,
    clock: Arc<dyn Clock>,
}

impl SchedulerHandle {
    /// The feed this scheduler polls.
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn closed(&self) -> DaemonError {
        if self.is_shut_down() {
            DaemonError::shut_down(self.url.as_str())
        } else {
            DaemonError::scheduler_gone(self.url.as_str())
        }
    }

    /// Fetches now and waits for the outcome.
    pub async fn trigger_fetch(&self) -> DaemonResult<FetchReport> {
        if self.is_shut_down() {
            return Err(self.closed());
        }
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SchedulerCommand::TriggerFetch { respond: Some(tx) })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Requests a fetch without waiting for it.
    pub fn request_fetch(&self) -> DaemonResult<()> {
        if self.is_shut_down() {
            return Err(self.closed());
        }
        match self
            .command_tx
            .try_send(SchedulerCommand::TriggerFetch { respond: None })
        {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(url = %self.url, "Command queue full, fetch request dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.closed()),
        }
    }

    /// True when the last success is at least one nominal interval old, or
    /// there has been none.
    pub async fn should_refetch(&self) -> bool {
        let now = self.clock.now();
        self.session.read().await.should_refetch(now)
    }

    /// The last known good event list.
    pub async fn events(&self) -> Vec<NormalizedEvent> {
        self.session.read().await.events().to_vec()
    }

    /// A snapshot of the session state.
    pub async fn session(&self) -> FetchSession {
        self.session.read().await.clone()
    }

    /// Stops the scheduler. No listener hook fires and no timer is armed
    /// after this returns; a hook already running is waited for.
    pub fn shutdown(&self) {
        if self.shut_down.close() {
            info!(url = %self.url, "Shutting down feed scheduler");
        }
        let _ = self.command_tx.try_send(SchedulerCommand::Shutdown);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.is_closed()
    }
}
