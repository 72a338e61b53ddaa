//! Fetch scheduling for calpoll.
//!
//! One [`FeedScheduler`] task runs per feed. It fetches on start, re-arms a
//! single reload timer after every pass, backs off on failures and
//! delivers results to a [`FeedListener`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calpoll_daemon::{ChannelListener, FeedScheduler};
//! use calpoll_feed::{FeedConfig, HttpTransport, IcsParser};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FeedConfig::new("webcal://example.com/team.ics")?;
//!     let (listener, mut updates) = ChannelListener::new();
//!
//!     let (handle, task) = FeedScheduler::new(
//!         config,
//!         Arc::new(HttpTransport::new()?),
//!         Arc::new(IcsParser),
//!         Arc::new(listener),
//!     )
//!     .spawn();
//!
//!     if let Some(update) = updates.recv().await {
//!         println!("{:?}", update);
//!     }
//!     handle.shutdown();
//!     task.await?;
//!     Ok(())
//! }
//! ```

mod backoff;
mod clock;
mod error;
mod listener;
mod scheduler;
mod session;
mod signals;

pub use backoff::{
    FIFTEEN_MINUTES, MAX_BACKOFF_STEPS, THIRTY_MINUTES, delay_for_status, parse_retry_after,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DaemonError, DaemonResult};
pub use listener::{ChannelListener, FeedListener, FeedUpdate};
pub use scheduler::{
    FeedScheduler, FetchReport, SchedulerCommand, SchedulerHandle, SchedulerOptions,
    SharedSession, TEST_MODE_ENV,
};
pub use session::{FetchPhase, FetchSession, RetryDecision};
pub use signals::{RefreshSignal, ShutdownSignal, Signal, SignalHandler, supervise};
