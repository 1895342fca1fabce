//! Chat Platform Boundary
//!
//! The abstract capabilities the counting game needs from the chat service.
//! A real connection (gateway, REST client) lives outside this crate and
//! implements [`ChatPlatform`]; it forwards inbound events to
//! [`CountingHandle`](crate::network::session::CountingHandle).

use async_trait::async_trait;
use thiserror::Error;

use crate::core::post::{ChannelId, Post, PostId};

/// Which part of a channel's history to fetch.
///
/// Results are always ordered oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryQuery {
    /// The most recent `limit` posts
    Latest {
        /// Maximum posts returned
        limit: usize,
    },
    /// Every post newer than `post`
    After {
        /// Exclusive lower bound
        post: PostId,
    },
    /// Up to `limit` posts older than `post`, the newest of them
    Before {
        /// Exclusive upper bound
        post: PostId,
        /// Maximum posts returned
        limit: usize,
    },
}

/// Platform errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Channel does not exist or is not visible.
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// Channel exists but the bot cannot post there.
    #[error("Channel {0} is not postable")]
    ChannelNotPostable(ChannelId),

    /// Referenced post does not exist.
    #[error("Post {0} not found")]
    PostNotFound(PostId),

    /// Transport or API failure.
    #[error("Platform request failed: {0}")]
    Request(String),
}

/// What the counting game needs from the chat service.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Check the channel exists and the bot can post in it.
    async fn verify_channel(&self, channel: &ChannelId) -> Result<(), PlatformError>;

    /// Fetch part of a channel's history, oldest first.
    async fn fetch_history(
        &self,
        channel: &ChannelId,
        query: HistoryQuery,
    ) -> Result<Vec<Post>, PlatformError>;

    /// Fetch a single post.
    async fn fetch_post(&self, channel: &ChannelId, post: &PostId) -> Result<Post, PlatformError>;

    /// React to a post with `symbol`.
    async fn send_reaction(&self, post: &Post, symbol: &str) -> Result<(), PlatformError>;

    /// Reply to a post. Returns the reply as posted.
    async fn send_reply(&self, post: &Post, text: &str) -> Result<Post, PlatformError>;

    /// Update the bot's status line.
    async fn set_status(&self, status: &str) -> Result<(), PlatformError>;
}
