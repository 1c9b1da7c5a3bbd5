use std::sync::Arc;

use anyhow::{Context, Result};
use portal_core::{
    FeedConfig, FeedSnapshot, HttpNotificationService, NotificationFeed, NotificationId, PortalConfig,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Line commands accepted on stdin while watching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchInput {
    Read(String),
    More,
    Refresh,
    ClearError,
    Pause,
    Resume,
    Quit,
}

pub fn parse_input(line: &str) -> Option<WatchInput> {
    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let input = match command {
        "read" | "r" => WatchInput::Read(parts.next()?.to_string()),
        "more" | "m" => WatchInput::More,
        "refresh" | "f" => WatchInput::Refresh,
        "clear" | "c" => WatchInput::ClearError,
        "pause" => WatchInput::Pause,
        "resume" => WatchInput::Resume,
        "quit" | "q" => WatchInput::Quit,
        _ => return None,
    };
    Some(input)
}

fn open_feed(config: &PortalConfig, feed: FeedConfig) -> Result<NotificationFeed> {
    let service = HttpNotificationService::new(&config.service)
        .with_context(|| format!("Failed to create client for {}", config.service.base_url))?;
    NotificationFeed::new(Arc::new(service), feed).context("Invalid feed configuration")
}

fn print_snapshot(snapshot: &FeedSnapshot, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    println!("{}", json);
    Ok(())
}

fn summary(snapshot: &FeedSnapshot) -> String {
    let mut line = format!(
        "{} notifications, {} unread",
        snapshot.notifications.len(),
        snapshot.unread_count
    );
    if snapshot.has_more {
        line.push_str(", more available");
    }
    if snapshot.loading {
        line.push_str(", loading");
    }
    if let Some(error) = &snapshot.error {
        line.push_str(&format!(" [error: {}]", error));
    }
    line
}

/// Load the first page (plus `pages - 1` further pages) and print the feed.
pub async fn run_list(config: &PortalConfig, pages: usize, pretty: bool) -> Result<()> {
    let feed = open_feed(
        config,
        FeedConfig {
            auto_poll: false,
            enabled: true,
            ..config.feed.clone()
        },
    )?;
    if let Some(initial) = feed.activate() {
        initial.await.context("Initial load task failed")?;
    }
    for _ in 1..pages {
        if !feed.snapshot().has_more {
            break;
        }
        feed.load_more().await;
    }

    let snapshot = feed.snapshot();
    feed.teardown();
    print_snapshot(&snapshot, pretty)?;
    if let Some(error) = snapshot.error {
        anyhow::bail!(error);
    }
    Ok(())
}

/// Mark one notification read and report whether the change stuck.
pub async fn run_mark_read(config: &PortalConfig, id: &str) -> Result<()> {
    let feed = open_feed(
        config,
        FeedConfig {
            auto_poll: false,
            enabled: true,
            ..config.feed.clone()
        },
    )?;
    if let Some(initial) = feed.activate() {
        initial.await.context("Initial load task failed")?;
    }
    let report = mark_read(&feed, id).await;
    feed.teardown();
    println!("{}", report?);
    Ok(())
}

/// Only the mark-read outcome decides success; a failed first page merely
/// means the entry cannot be shown.
async fn mark_read(feed: &NotificationFeed, id: &str) -> Result<String> {
    if let Some(error) = feed.snapshot().error {
        warn!(%error, "feed not loaded, marking read anyway");
        feed.clear_error();
    }
    let id = NotificationId::new(id);
    let before = feed.snapshot();
    let listed = before.get(&id).is_some();

    feed.mark_as_read(id.clone()).await;

    let after = feed.snapshot();
    if let Some(error) = after.error {
        anyhow::bail!(error);
    }
    if listed {
        Ok(format!(
            "{} marked read (unread {} -> {})",
            id, before.unread_count, after.unread_count
        ))
    } else {
        Ok(format!("{} marked read", id))
    }
}

/// Keep the feed live until Ctrl-C or `quit`, printing every change.
pub async fn run_watch(config: &PortalConfig, json: bool) -> Result<()> {
    let feed = open_feed(config, config.feed.clone())?;
    let mut updates = feed.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!(
        base_url = %config.service.base_url,
        interval_ms = config.feed.poll_interval_ms,
        "watching notifications (commands: read <id>, more, refresh, clear, pause, resume, quit)"
    );
    feed.activate();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if json {
                    print_snapshot(&snapshot, false)?;
                } else {
                    println!("{}", summary(&snapshot));
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin closed");
                        stdin_open = false;
                        continue;
                    }
                };
                match parse_input(&line) {
                    Some(WatchInput::Read(id)) => {
                        tokio::spawn(feed.mark_as_read(id));
                    }
                    Some(WatchInput::More) => {
                        tokio::spawn(feed.load_more());
                    }
                    Some(WatchInput::Refresh) => {
                        tokio::spawn(feed.refetch());
                    }
                    Some(WatchInput::ClearError) => feed.clear_error(),
                    Some(WatchInput::Pause) => {
                        feed.set_enabled(false);
                    }
                    Some(WatchInput::Resume) => {
                        feed.set_enabled(true);
                    }
                    Some(WatchInput::Quit) => break,
                    None => warn!(input = %line.trim(), "unknown command"),
                }
            }
        }
    }

    feed.teardown();
    Ok(())
}
