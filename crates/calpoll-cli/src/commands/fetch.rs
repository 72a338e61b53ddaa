//! `calpoll fetch`: one pass over every feed.

use std::sync::Arc;

use calpoll_core::EventFormatter;
use calpoll_daemon::{ChannelListener, FeedUpdate};
use calpoll_feed::HttpTransport;
use chrono::Local;
use tracing::{debug, warn};

use super::{feed_configs, merge_events, render_events, shutdown_all, spawn_schedulers};
use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::{CliError, CliResult};

/// Fetches every feed once and prints the merged event list.
///
/// Feeds that fail are reported on stderr; the command only fails when
/// every feed did.
pub async fn run(cli: &Cli, config: &ClientConfig) -> CliResult<()> {
    let feeds = feed_configs(cli, config)?;
    let expected = feeds.len();

    let transport = Arc::new(HttpTransport::with_timeout(config.http.timeout())?);
    let (listener, mut updates) = ChannelListener::new();
    // no timers: each scheduler reports exactly once
    let options = config.scheduler_options().with_test_mode(true);
    let schedulers = spawn_schedulers(feeds, transport, Arc::new(listener), options);

    let mut lists = Vec::with_capacity(expected);
    let mut failures = 0;
    for _ in 0..expected {
        let Some(update) = updates.recv().await else {
            break;
        };
        match update {
            FeedUpdate::Events { feed, events } => {
                debug!(url = %feed, count = events.len(), "Feed fetched");
                lists.push(events);
            }
            FeedUpdate::Error {
                feed,
                code,
                message,
            } => {
                warn!(url = %feed, code = %code, "Feed failed: {}", message);
                eprintln!("warning: {}: {}", feed, message);
                failures += 1;
            }
        }
    }
    shutdown_all(schedulers).await;

    if failures == expected {
        return Err(CliError::AllFeedsFailed(expected));
    }

    let formatter = EventFormatter::new(cli.format_options(config));
    let events = merge_events(lists);
    println!(
        "{}",
        render_events(&formatter, cli.output_format(), &events, &Local::now())?
    );
    Ok(())
}
