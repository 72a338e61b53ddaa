//! Subcommand implementations and the plumbing they share.

pub mod config;
pub mod fetch;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use calpoll_core::{EventFormatter, NormalizedEvent, OutputFormat};
use calpoll_daemon::{FeedListener, FeedScheduler, SchedulerHandle, SchedulerOptions};
use calpoll_feed::{FeedConfig, FeedParser, IcsParser, Transport};
use chrono::{DateTime, TimeZone};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{CliResult, ConfigError, ConfigResult};

/// How long to wait for schedulers to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running scheduler and its task.
pub type RunningScheduler = (SchedulerHandle, JoinHandle<()>);

/// Resolves and validates the feeds to poll.
pub fn feed_configs(cli: &Cli, config: &ClientConfig) -> ConfigResult<Vec<FeedConfig>> {
    let settings = cli.feed_settings(config);
    if settings.is_empty() {
        return Err(ConfigError::NoFeeds {
            path: cli.config.clone().unwrap_or_else(ClientConfig::default_path),
        });
    }
    settings
        .iter()
        .enumerate()
        .map(|(index, feed)| feed.to_feed_config(index))
        .collect()
}

/// Spawns one scheduler per feed, all reporting to `listener`.
pub fn spawn_schedulers(
    feeds: Vec<FeedConfig>,
    transport: Arc<dyn Transport>,
    listener: Arc<dyn FeedListener>,
    options: SchedulerOptions,
) -> Vec<RunningScheduler> {
    let parser: Arc<dyn FeedParser> = Arc::new(IcsParser);
    feeds
        .into_iter()
        .map(|feed| {
            FeedScheduler::new(feed, transport.clone(), parser.clone(), listener.clone())
                .with_options(options)
                .spawn()
        })
        .collect()
}

/// Shuts every scheduler down and waits for the tasks to finish.
pub async fn shutdown_all(schedulers: Vec<RunningScheduler>) {
    for (handle, _) in &schedulers {
        handle.shutdown();
    }
    for (handle, task) in schedulers {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(url = %handle.url(), error = %e, "Scheduler task failed"),
            Err(_) => warn!(url = %handle.url(), "Scheduler did not stop in time"),
        }
    }
}

/// Merges per-feed lists into one chronological list.
pub fn merge_events(lists: impl IntoIterator<Item = Vec<NormalizedEvent>>) -> Vec<NormalizedEvent> {
    let mut events: Vec<NormalizedEvent> = lists.into_iter().flatten().collect();
    events.sort_by(|a, b| {
        a.starts_at
            .cmp(&b.starts_at)
            .then_with(|| a.ends_at.cmp(&b.ends_at))
            .then_with(|| a.title.cmp(&b.title))
    });
    events
}

/// Renders an event list in the requested format.
pub fn render_events<Tz: TimeZone>(
    formatter: &EventFormatter,
    format: OutputFormat,
    events: &[NormalizedEvent],
    now: &DateTime<Tz>,
) -> CliResult<String>
where
    Tz::Offset: std::fmt::Display,
{
    match format {
        OutputFormat::Text => Ok(formatter.format_text(events, now)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&formatter.format_json(events))?),
    }
}
