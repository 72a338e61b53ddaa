//! The parser seam: turns a fetched payload into raw entries.

use crate::error::FeedResult;
use crate::raw_event::RawEntry;

/// Parses a feed payload.
///
/// Implementations should be tolerant: a component they cannot read is
/// skipped, and only a document that cannot be read at all is an error.
pub trait FeedParser: Send + Sync {
    fn parse(&self, payload: &str) -> FeedResult<Vec<RawEntry>>;
}

impl<F> FeedParser for F
where
    F: Fn(&str) -> FeedResult<Vec<RawEntry>> + Send + Sync,
{
    fn parse(&self, payload: &str) -> FeedResult<Vec<RawEntry>> {
        self(payload)
    }
}
