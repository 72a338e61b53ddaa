//! Delivery hooks for fetch results.

use calpoll_core::NormalizedEvent;
use calpoll_feed::{FeedError, FeedErrorCode};
use tokio::sync::mpsc;
use url::Url;

use crate::session::FetchSession;

/// Receives the outcome of every fetch pass.
///
/// Each hook gets a snapshot of the session taken after the pass was
/// recorded. Hooks run on the scheduler task while shutdown is held off, so
/// they must not block and must not call [`SchedulerHandle::shutdown`].
///
/// [`SchedulerHandle::shutdown`]: crate::SchedulerHandle::shutdown
pub trait FeedListener: Send + Sync {
    /// Called with the full, freshly normalized event list after a successful fetch.
    fn on_events(&self, session: &FetchSession, events: &[NormalizedEvent]);

    /// Called for every failed fetch.
    fn on_error(&self, session: &FetchSession, error: &FeedError);
}

/// An owned copy of a listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    Events {
        feed: Url,
        events: Vec<NormalizedEvent>,
    },
    Error {
        feed: Url,
        code: FeedErrorCode,
        message: String,
    },
}

impl FeedUpdate {
    /// Returns the feed this update belongs to.
    pub fn feed(&self) -> &Url {
        match self {
            Self::Events { feed, .. } | Self::Error { feed, .. } => feed,
        }
    }
}

/// Forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<FeedUpdate>,
}

impl ChannelListener {
    /// Creates a listener and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FeedListener for ChannelListener {
    fn on_events(&self, session: &FetchSession, events: &[NormalizedEvent]) {
        let _ = self.tx.send(FeedUpdate::Events {
            feed: session.url().clone(),
            events: events.to_vec(),
        });
    }

    fn on_error(&self, session: &FetchSession, error: &FeedError) {
        let _ = self.tx.send(FeedUpdate::Error {
            feed: session.url().clone(),
            code: error.code(),
            message: error.message().to_string(),
        });
    }
}
