//! `calpoll watch`: keep every feed fresh until interrupted.
//!
//! SIGHUP fetches every feed immediately; SIGTERM/SIGINT stop the watch.

use std::sync::Arc;

use calpoll_core::{EventFormatter, OutputFormat};
use calpoll_daemon::{ChannelListener, FeedUpdate, SchedulerHandle, SignalHandler, supervise};
use calpoll_feed::HttpTransport;
use chrono::{DateTime, Local, TimeZone};
use serde_json::json;
use tracing::info;

use super::{feed_configs, render_events, shutdown_all, spawn_schedulers};
use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::CliResult;

/// Polls every feed and prints each update as it arrives.
pub async fn run(cli: &Cli, config: &ClientConfig) -> CliResult<()> {
    let feeds = feed_configs(cli, config)?;
    info!(feeds = feeds.len(), "Starting watch");

    let transport = Arc::new(HttpTransport::with_timeout(config.http.timeout())?);
    let (listener, mut updates) = ChannelListener::new();
    let schedulers = spawn_schedulers(
        feeds,
        transport,
        Arc::new(listener),
        config.scheduler_options(),
    );
    let handles: Vec<SchedulerHandle> = schedulers.iter().map(|(h, _)| h.clone()).collect();

    let signals = Arc::new(SignalHandler::new());
    let _signal_task = signals.spawn_listener()?;
    let supervisor = {
        let signals = signals.clone();
        tokio::spawn(async move { supervise(&handles, &signals).await })
    };

    let formatter = EventFormatter::new(cli.format_options(config));
    let format = cli.output_format();
    let shutdown = signals.shutdown().wait();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            update = updates.recv() => {
                let Some(update) = update else { break };
                match render_update(&formatter, format, &update, &Local::now())? {
                    Output::Stdout(text) => println!("{}", text),
                    Output::Stderr(text) => eprintln!("{}", text),
                }
            }
        }
    }

    info!("Shutting down...");
    signals.trigger_shutdown();
    let _ = supervisor.await;
    shutdown_all(schedulers).await;
    info!("Watch stopped");
    Ok(())
}

/// Where a rendered update goes.
#[derive(Debug, PartialEq, Eq)]
pub enum Output {
    Stdout(String),
    Stderr(String),
}

/// Renders one listener update.
///
/// Text mode prints a header per feed and sends errors to stderr; JSON
/// mode prints one object per line for both.
pub fn render_update<Tz: TimeZone>(
    formatter: &EventFormatter,
    format: OutputFormat,
    update: &FeedUpdate,
    now: &DateTime<Tz>,
) -> CliResult<Output>
where
    Tz::Offset: std::fmt::Display,
{
    match (format, update) {
        (OutputFormat::Text, FeedUpdate::Events { feed, events }) => Ok(Output::Stdout(format!(
            "{}\n{}",
            feed,
            render_events(formatter, format, events, now)?
        ))),
        (OutputFormat::Text, FeedUpdate::Error { feed, message, .. }) => {
            Ok(Output::Stderr(format!("warning: {}: {}", feed, message)))
        }
        (OutputFormat::Json, FeedUpdate::Events { feed, events }) => Ok(Output::Stdout(
            json!({ "feed": feed.as_str(), "events": formatter.format_json(events) }).to_string(),
        )),
        (OutputFormat::Json, FeedUpdate::Error { feed, code, message }) => Ok(Output::Stdout(
            json!({ "feed": feed.as_str(), "error": { "code": code.as_str(), "message": message } })
                .to_string(),
        )),
    }
}
