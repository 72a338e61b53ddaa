//! Feed side of calpoll: fetching, parsing and normalizing calendar feeds.
//!
//! - [`FeedConfig`] - validated per-feed settings and [`Credential`]s
//! - [`Transport`] / [`HttpTransport`] - one GET per fetch, status left uninterpreted
//! - [`FeedParser`] / [`IcsParser`] - payload to [`RawEntry`] values
//! - [`normalize_entries`] - recurrence expansion, filtering, bounding and sorting
//! - [`FeedError`] - the error taxonomy shared with the scheduler
//!
//! ```text
//!  FeedConfig ──► FetchRequest ──► Transport ──► FetchResponse
//!                                                     │ body
//!                                                     ▼
//!                                   FeedParser ──► Vec<RawEntry>
//!                                                     │
//!                                                     ▼ normalize_entries()
//!                                             Vec<NormalizedEvent>
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod ics;
pub mod normalize;
pub mod parser;
pub mod raw_event;
pub mod recurrence;
pub mod transport;

pub use config::{Credential, FeedConfig};
pub use error::{FeedError, FeedErrorCode, FeedResult};
pub use ics::IcsParser;
pub use normalize::{NormalizeOptions, normalize_entries};
pub use parser::FeedParser;
pub use raw_event::{RawEntry, RawEventTime};
pub use transport::{BoxFuture, FetchRequest, FetchResponse, HttpTransport, Transport};
