//! Count Keeper
//!
//! Runs a scripted counting session against the in-memory chat platform.
//! A real deployment wires a platform connection into `start_session`
//! instead; everything after that point is identical.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use count_keeper::{
    network::{AdminCommand, CountingHandle, MemoryPlatform, PostOutcome},
    start_session, AuthorId, Config, JsonFileStore, VERSION,
};

const BOT_ID: &str = "count-keeper";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Count Keeper v{}", VERSION);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("{} - running with demo configuration", e);
            Config {
                unique_users: 2,
                admin_ids: vec![AuthorId::new("admin")],
                ..Config::default()
            }
        }
    };
    info!(
        "Channel {} with {} unique users between posts",
        config.channel_id, config.unique_users
    );

    demo_session(config).await
}

/// Demo: recover a streak from seeded history, then play a few rounds.
async fn demo_session(config: Config) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let platform = Arc::new(MemoryPlatform::new(BOT_ID));
    platform.add_channel(config.channel_id.clone(), true);

    // History from before the "restart"
    let players = ["alice", "bob", "carol", "dave"];
    let start = Utc::now() - Duration::minutes(30);
    for n in 1..=7u32 {
        platform.post(
            config.channel_id.clone(),
            players[n as usize % players.len()],
            &n.to_string(),
            start + Duration::minutes(i64::from(n)),
        );
    }
    let mut delivered = platform.history(&config.channel_id).len();

    let store = Arc::new(JsonFileStore::new(&config.state_file));
    let channel = config.channel_id.clone();
    let (handle, runner) = start_session(config, platform.clone(), store)
        .await
        .context("Startup recovery failed")?;

    let script = [
        ("alice", "8"),
        ("bob", "9 nine is fine"),
        ("alice", "10"),
        ("erin", "1"),
        ("frank", "2"),
        ("erin", "3?"),
    ];

    for (author, content) in script {
        platform.post(channel.clone(), author, content, Utc::now());
        deliver(&handle, &platform, &channel, &mut delivered).await;
    }

    let snapshot = handle.snapshot().join().await?;
    info!(
        "Current: {} Best: {} ({:?})",
        snapshot.current_number, snapshot.best, snapshot.high_score_phase
    );

    let admin = AuthorId::new("admin");
    let state = handle.admin(admin.clone(), AdminCommand::PrintState).join().await?;
    info!("State:\n{}", state.text);

    let version = handle.admin(admin, AdminCommand::Version).join().await?;
    info!("Version: {}", version.text);

    drop(handle);
    let session = runner.await.context("Event queue runner crashed")?;
    info!("Final status: {}", session.state().status_line());
    Ok(())
}

/// Forward every post the platform has not delivered yet, like a gateway
/// connection would, and wait for each to be processed.
async fn deliver(
    handle: &CountingHandle,
    platform: &MemoryPlatform,
    channel: &count_keeper::ChannelId,
    delivered: &mut usize,
) {
    loop {
        let history = platform.history(channel);
        let Some(post) = history.get(*delivered).cloned() else {
            break;
        };
        *delivered += 1;

        let author = post.author_id.clone();
        let content = post.content.clone();
        match handle.on_post(post).join().await {
            Ok(PostOutcome::Counted { number, new_record }) => {
                info!("{} counted {}{}", author, number, if new_record { " (new record!)" } else { "" });
            }
            Ok(PostOutcome::Rejected { violations }) => {
                info!("{} posted {:?}: rejected ({} violations)", author, content, violations.len());
            }
            Ok(PostOutcome::Observed) => info!("Bot said: {}", content),
            Ok(PostOutcome::Ignored) => {}
            Err(e) => warn!("Processing failed: {}", e),
        }
    }
}
