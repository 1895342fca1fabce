//! Counting Session
//!
//! Owns the game state and the recent-author window, applies the per-post
//! policy, and talks back to the chat platform. All of it runs inside the
//! [`EventQueue`], so exactly one event is processed at a time.
//!
//! The chat collaborator drives a session through [`CountingHandle`]:
//!
//! ```text
//!  platform events ──► CountingHandle::on_post / on_post_edited / admin
//!                                   │
//!                                   ▼
//!                      EventQueue (FIFO, single runner)
//!                                   │
//!                                   ▼
//!        CountingSession: validate ─► GameState ─► responses ─► window
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::core::post::{AuthorId, Post, PostId};
use crate::core::window::RecentAuthorWindow;
use crate::game::recovery::replay_history;
use crate::game::rules::{validate, ValidationResult, Violation};
use crate::game::state::{GameState, StateSnapshot};
use crate::network::admin::{AdminCommand, AdminReply};
use crate::network::history::fetch_recovery_slice;
use crate::network::platform::{ChatPlatform, PlatformError};
use crate::network::queue::{EventQueue, TaskHandle};
use crate::network::reply::{
    compose_edit_rebuke, compose_failure_reply, CELEBRATION_REACTIONS, FAILURE_REACTION,
};
use crate::store::StateStore;

/// Errors while processing one event.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Talking to the platform failed.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

/// Errors that prevent the game from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Channel checks or history fetch failed.
    #[error("Startup recovery failed: {0}")]
    Platform(#[from] PlatformError),
}

/// What happened to a new post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostOutcome {
    /// Not in the counting channel
    Ignored,
    /// Bot post, only recorded for spacing
    Observed,
    /// Valid next number
    Counted {
        /// The counted number
        number: u64,
        /// First record of this run, celebrated
        new_record: bool,
    },
    /// Broke the streak
    Rejected {
        /// Every rule it broke
        violations: Vec<Violation>,
    },
}

/// What happened to an edited post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// Outside the channel, by the bot, or before the current streak
    Ignored,
    /// Edit inside the streak: streak reset at the rebuke
    Rebuked {
        /// The bot's rebuke, now the reset anchor
        reply: PostId,
    },
}

// =============================================================================
// SESSION
// =============================================================================

/// Game state plus everything needed to process events.
pub struct CountingSession {
    pub(crate) config: Config,
    pub(crate) platform: Arc<dyn ChatPlatform>,
    pub(crate) state: GameState,
    pub(crate) window: RecentAuthorWindow,
}

impl CountingSession {
    /// Session over existing state and window.
    pub fn new(
        config: Config,
        platform: Arc<dyn ChatPlatform>,
        state: GameState,
        window: RecentAuthorWindow,
    ) -> Self {
        Self {
            config,
            platform,
            state,
            window,
        }
    }

    /// Game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Recent-author window.
    pub fn window(&self) -> &RecentAuthorWindow {
        &self.window
    }

    /// Process a new post.
    #[instrument(skip(self, post), fields(post = %post.id, author = %post.author_id))]
    pub async fn handle_post(&mut self, post: Post) -> Result<PostOutcome, SessionError> {
        if post.channel_id != self.config.channel_id {
            debug!("Ignoring post from channel {}", post.channel_id);
            return Ok(PostOutcome::Ignored);
        }

        if post.is_system_authored {
            self.window.add(post);
            return Ok(PostOutcome::Observed);
        }

        let result = self.judge(&post).await;
        // Window goes last so responses saw the state before this post
        self.window.add(post);
        result
    }

    async fn judge(&mut self, post: &Post) -> Result<PostOutcome, SessionError> {
        let verdict = validate(
            post,
            &self.window,
            self.state.current_number(),
            self.config.unique_users,
        );

        match verdict {
            ValidationResult::Valid { number } => {
                let new_record = self.state.record_success().await;
                debug!("Counted {}", number);
                self.publish_status().await;

                if new_record {
                    info!("New record: {}", self.state.best());
                    for symbol in CELEBRATION_REACTIONS {
                        self.platform.send_reaction(post, symbol).await?;
                    }
                }
                Ok(PostOutcome::Counted { number, new_record })
            }
            ValidationResult::Invalid { violations } => {
                self.reject(post, &violations).await?;
                Ok(PostOutcome::Rejected { violations })
            }
        }
    }

    /// Break the streak at `post`.
    ///
    /// Shared by live posts and the post found broken during recovery. Does
    /// not touch the window.
    pub(crate) async fn reject(
        &mut self,
        post: &Post,
        violations: &[Violation],
    ) -> Result<(), SessionError> {
        info!(
            "Post {} by {} broke the streak at {}: {:?}",
            post.id,
            post.author_id,
            self.state.current_number(),
            violations
        );

        let text = compose_failure_reply(
            violations,
            self.state.current_number(),
            self.streak_age(Utc::now()),
        );

        self.state.reset(post.id.clone()).await;
        self.publish_status().await;

        self.platform.send_reaction(post, FAILURE_REACTION).await?;
        self.platform.send_reply(post, &text).await?;
        Ok(())
    }

    /// How long the current streak has been running, if long enough to
    /// mention.
    fn streak_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        if self.state.current_number() == 0 {
            return None;
        }
        let started = self.state.last_reset_at()?;
        let age = now.signed_duration_since(started);
        let threshold = chrono::Duration::from_std(self.config.streak_notice_after).ok()?;
        (age > threshold).then_some(age)
    }

    /// Process an edited post.
    #[instrument(skip(self, old, new), fields(post = %new.id))]
    pub async fn handle_edit(&mut self, old: Post, new: Post) -> Result<EditOutcome, SessionError> {
        if new.channel_id != self.config.channel_id || new.is_system_authored {
            return Ok(EditOutcome::Ignored);
        }

        let in_streak = match self.state.last_reset_at() {
            Some(started) => new.created_at >= started,
            None => true,
        };
        if !in_streak {
            debug!("Edit of post {} predates the current streak", new.id);
            return Ok(EditOutcome::Ignored);
        }

        info!(
            "Post {} by {} edited from {:?} to {:?}",
            new.id, new.author_id, old.content, new.content
        );

        let reply = self.platform.send_reply(&new, &compose_edit_rebuke()).await?;
        self.platform.send_reaction(&new, FAILURE_REACTION).await?;
        self.state.reset(reply.id.clone()).await;
        self.publish_status().await;

        Ok(EditOutcome::Rebuked { reply: reply.id })
    }

    /// Push the status line to the platform. Failures are logged only.
    pub(crate) async fn publish_status(&self) {
        if let Err(e) = self.platform.set_status(&self.state.status_line()).await {
            warn!("Failed to update status: {}", e);
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Entry points for the chat collaborator. Cheap to clone.
#[derive(Clone)]
pub struct CountingHandle {
    queue: EventQueue<CountingSession>,
}

impl CountingHandle {
    /// A new post appeared.
    pub fn on_post(&self, post: Post) -> TaskHandle<PostOutcome> {
        self.queue
            .push(move |session: &mut CountingSession| Box::pin(session.handle_post(post)))
    }

    /// A post was edited.
    pub fn on_post_edited(&self, old: Post, new: Post) -> TaskHandle<EditOutcome> {
        self.queue
            .push(move |session: &mut CountingSession| Box::pin(session.handle_edit(old, new)))
    }

    /// An administrative command was issued by `invoker`.
    pub fn admin(&self, invoker: AuthorId, command: AdminCommand) -> TaskHandle<AdminReply> {
        self.queue.push(move |session: &mut CountingSession| {
            Box::pin(session.handle_admin(invoker, command))
        })
    }

    /// Current state, read in queue order.
    pub fn snapshot(&self) -> TaskHandle<StateSnapshot> {
        self.queue.push(|session: &mut CountingSession| {
            Box::pin(async move { Ok::<_, SessionError>(session.state.snapshot()) })
        })
    }

    /// Events waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

// =============================================================================
// STARTUP
// =============================================================================

/// Load state, recover the streak from history and start processing.
///
/// Returns the handle for inbound events and the runner, which yields the
/// session back once every handle is dropped.
pub async fn start_session(
    config: Config,
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn StateStore>,
) -> Result<(CountingHandle, JoinHandle<CountingSession>), StartupError> {
    platform.verify_channel(&config.channel_id).await?;

    let persisted = match store.load().await {
        Ok(Some(persisted)) => {
            info!("Loaded previous state with a record of {}", persisted.best);
            persisted
        }
        Ok(None) => {
            info!("No previous state found");
            Default::default()
        }
        Err(e) => {
            warn!("Could not read previous state, starting fresh: {}", e);
            Default::default()
        }
    };
    let mut state = GameState::from_persisted(persisted, store);

    let slice = fetch_recovery_slice(
        platform.as_ref(),
        &config.channel_id,
        state.last_reset_anchor(),
        config.history_lookback(),
    )
    .await?;

    let outcome = replay_history(
        &slice.posts,
        slice.primary_start,
        slice.anchored,
        config.unique_users,
    );
    state.restore_current(outcome.current_number);
    info!(
        "Recovered streak at {} from {} posts ({} verified)",
        outcome.current_number,
        slice.posts.len(),
        outcome.verified
    );

    let session = CountingSession::new(config, platform, state, outcome.window);
    let (queue, runner) = EventQueue::start(session);
    let handle = CountingHandle { queue };

    if let Some(broken) = outcome.broken {
        info!("Post {} already broke the streak", broken.post.id);
        let task = handle.queue.push(move |session: &mut CountingSession| {
            Box::pin(async move {
                session.reject(&broken.post, &broken.violations).await?;
                Ok::<_, SessionError>(())
            })
        });
        if let Err(e) = task.join().await {
            warn!("Could not report the broken streak: {}", e);
        }
    }

    let status = handle.queue.push(|session: &mut CountingSession| {
        Box::pin(async move {
            session.publish_status().await;
            Ok::<_, SessionError>(())
        })
    });
    if let Err(e) = status.join().await {
        warn!("Could not publish status: {}", e);
    }

    Ok((handle, runner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::post::ChannelId;
    use crate::network::memory::MemoryPlatform;
    use crate::store::MemoryStore;
    use std::time::Duration;

    const CHANNEL: &str = "count";

    fn config(unique_users: usize) -> Config {
        Config {
            channel_id: ChannelId::new(CHANNEL),
            unique_users,
            admin_ids: vec![AuthorId::new("admin")],
            streak_notice_after: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    fn session(unique_users: usize) -> (CountingSession, Arc<MemoryPlatform>) {
        let platform = Arc::new(MemoryPlatform::new("bot"));
        platform.add_channel(CHANNEL, true);
        let state = GameState::new(Arc::new(MemoryStore::new()));
        let session = CountingSession::new(
            config(unique_users),
            platform.clone(),
            state,
            RecentAuthorWindow::new(unique_users),
        );
        (session, platform)
    }

    fn say(platform: &MemoryPlatform, author: &str, content: &str) -> Post {
        platform.post(CHANNEL, author, content, Utc::now())
    }

    #[tokio::test]
    async fn test_valid_post_counts_and_celebrates_once() {
        let (mut session, platform) = session(1);

        let first = say(&platform, "alice", "1");
        let outcome = session.handle_post(first.clone()).await.unwrap();
        assert_eq!(
            outcome,
            PostOutcome::Counted {
                number: 1,
                new_record: true
            }
        );
        assert_eq!(platform.reactions_on(&first.id).len(), 3);

        let second = say(&platform, "bob", "2");
        session.handle_post(second.clone()).await.unwrap();
        assert!(platform.reactions_on(&second.id).is_empty());
        assert_eq!(platform.status().unwrap(), "Current: 2 Best: 2");
    }

    #[tokio::test]
    async fn test_invalid_post_resets_and_replies() {
        let (mut session, platform) = session(1);
        session.handle_post(say(&platform, "alice", "1")).await.unwrap();

        let bad = say(&platform, "bob", "3");
        let outcome = session.handle_post(bad.clone()).await.unwrap();
        assert_eq!(
            outcome,
            PostOutcome::Rejected {
                violations: vec![Violation::WrongNumber {
                    expected: 2,
                    actual: 3
                }]
            }
        );

        assert_eq!(session.state().current_number(), 0);
        assert_eq!(session.state().best(), 1);
        assert_eq!(session.state().last_reset_anchor(), Some(&bad.id));
        assert_eq!(platform.reactions_on(&bad.id), vec![FAILURE_REACTION]);
        assert_eq!(platform.replies_to(&bad.id).len(), 1);
        // The rejected post still counts for spacing
        assert_eq!(session.window().newest().unwrap().id, bad.id);
    }

    #[tokio::test]
    async fn test_spacing_violation() {
        let (mut session, platform) = session(2);
        session.handle_post(say(&platform, "alice", "1")).await.unwrap();
        session.handle_post(say(&platform, "bob", "2")).await.unwrap();

        let outcome = session.handle_post(say(&platform, "alice", "3")).await.unwrap();
        assert_eq!(
            outcome,
            PostOutcome::Rejected {
                violations: vec![Violation::TooFewUniqueAuthors {
                    messages_between: 1,
                    distinct_authors_between: 1
                }]
            }
        );
    }

    #[tokio::test]
    async fn test_system_posts_only_update_window() {
        let (mut session, platform) = session(2);
        let bot = say(&platform, "bot", "hello");
        assert!(bot.is_system_authored);

        let outcome = session.handle_post(bot).await.unwrap();
        assert_eq!(outcome, PostOutcome::Observed);
        assert_eq!(session.state().current_number(), 0);
        assert_eq!(session.window().len(), 1);
        assert!(platform.effects().is_empty());
    }

    #[tokio::test]
    async fn test_other_channel_is_ignored() {
        let (mut session, platform) = session(2);
        let elsewhere = platform.post("general", "alice", "1", Utc::now());

        let outcome = session.handle_post(elsewhere).await.unwrap();
        assert_eq!(outcome, PostOutcome::Ignored);
        assert!(session.window().is_empty());
    }

    #[tokio::test]
    async fn test_window_updated_even_when_response_fails() {
        let (mut session, platform) = session(2);
        platform.set_fail_requests(true);

        let result = session.handle_post(say(&platform, "alice", "x")).await;
        assert!(result.is_err());
        assert_eq!(session.window().len(), 1);
        assert_eq!(session.state().current_number(), 0);
    }

    #[tokio::test]
    async fn test_long_streak_mentions_duration() {
        let (mut session, platform) = session(1);
        let started = Utc::now() - chrono::Duration::hours(5);
        session
            .state
            .override_anchor(PostId::new("0"), started)
            .await;
        session.state.override_current(41).await;

        let bad = say(&platform, "alice", "40");
        session.handle_post(bad.clone()).await.unwrap();

        let reply = &platform.replies_to(&bad.id)[0];
        assert!(reply.contains("a streak of 41 that lasted"), "{}", reply);
    }

    #[tokio::test]
    async fn test_idle_channel_after_reset_gets_no_duration() {
        let (mut session, platform) = session(1);
        let long_ago = Utc::now() - chrono::Duration::hours(3);
        session.state.reset_at(PostId::new("0"), long_ago).await;

        let bad = say(&platform, "alice", "7");
        session.handle_post(bad.clone()).await.unwrap();

        assert_eq!(
            platform.replies_to(&bad.id),
            vec!["Wrong number, expected \"1\" got \"7\".\nBack to 1!"]
        );
    }

    #[tokio::test]
    async fn test_edit_inside_streak_is_rebuked() {
        let (mut session, platform) = session(1);
        let post = say(&platform, "alice", "1");
        session.handle_post(post.clone()).await.unwrap();

        let (old, new) = platform.edit(&post.id, "1 edited").unwrap();
        let outcome = session.handle_edit(old, new).await.unwrap();

        let EditOutcome::Rebuked { reply } = outcome else {
            panic!("expected a rebuke, got {:?}", outcome);
        };
        assert_eq!(session.state().current_number(), 0);
        assert_eq!(session.state().last_reset_anchor(), Some(&reply));
        assert_eq!(platform.reactions_on(&post.id).last().unwrap(), FAILURE_REACTION);
        assert_eq!(platform.replies_to(&post.id), vec![compose_edit_rebuke()]);
    }

    #[tokio::test]
    async fn test_edit_before_streak_is_ignored() {
        let (mut session, platform) = session(1);
        let old_post = platform.post(
            CHANNEL,
            "alice",
            "1",
            Utc::now() - chrono::Duration::days(1),
        );
        session.state.reset(PostId::new("99")).await;

        let (old, new) = platform.edit(&old_post.id, "one").unwrap();
        assert_eq!(session.handle_edit(old, new).await.unwrap(), EditOutcome::Ignored);
        assert!(platform.replies_to(&old_post.id).is_empty());
    }
}
