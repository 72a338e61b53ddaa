//! Core types: event times, normalized events, output formatting, tracing

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{NormalizedEvent, RelativeDay};
pub use format::{EventFormatter, FormatOptions, JsonEvent, OutputFormat, ellipsis};
pub use time::{EventTime, TimeWindow};
pub use tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
