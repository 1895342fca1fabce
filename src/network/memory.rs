//! In-Process Chat Platform
//!
//! A [`ChatPlatform`] that keeps channels in memory and records every
//! reaction, reply and status update. Drives the demo binary and the tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::post::{AuthorId, ChannelId, Post, PostId};
use crate::network::platform::{ChatPlatform, HistoryQuery, PlatformError};

/// Something the bot did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Reacted to a post
    Reaction {
        /// Target post
        post: PostId,
        /// Reaction symbol
        symbol: String,
    },
    /// Replied to a post
    Reply {
        /// Target post
        post: PostId,
        /// Reply post id
        reply: PostId,
        /// Reply text
        text: String,
    },
    /// Changed status line
    Status(String),
}

#[derive(Debug, Default)]
struct Channel {
    posts: Vec<Post>,
    postable: bool,
}

#[derive(Debug, Default)]
struct Inner {
    channels: BTreeMap<ChannelId, Channel>,
    effects: Vec<Effect>,
    next_id: u64,
    fail_requests: bool,
}

/// In-memory chat service.
#[derive(Debug)]
pub struct MemoryPlatform {
    bot_id: AuthorId,
    inner: Mutex<Inner>,
}

impl MemoryPlatform {
    /// Platform where the bot posts as `bot_id`.
    pub fn new(bot_id: impl Into<AuthorId>) -> Self {
        Self {
            bot_id: bot_id.into(),
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, PlatformError> {
        self.inner
            .lock()
            .map_err(|_| PlatformError::Request("platform state poisoned".into()))
    }

    /// Create a channel.
    pub fn add_channel(&self, channel: impl Into<ChannelId>, postable: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.channels.insert(
                channel.into(),
                Channel {
                    posts: Vec::new(),
                    postable,
                },
            );
        }
    }

    /// Make every request fail (or succeed again).
    pub fn set_fail_requests(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_requests = fail;
        }
    }

    /// Append a post by `author` and return it. The channel is created if
    /// needed.
    pub fn post(
        &self,
        channel: impl Into<ChannelId>,
        author: impl Into<AuthorId>,
        content: &str,
        at: DateTime<Utc>,
    ) -> Post {
        let channel = channel.into();
        let author = author.into();
        let system = author == self.bot_id;

        let Ok(mut inner) = self.inner.lock() else {
            return Post::new("0", channel, author, content, at);
        };
        let id = PostId::new(inner.next_id.to_string());
        inner.next_id += 1;

        let mut post = Post::new(id, channel.clone(), author, content, at);
        post.is_system_authored = system;

        inner
            .channels
            .entry(channel)
            .or_insert_with(|| Channel {
                posts: Vec::new(),
                postable: true,
            })
            .posts
            .push(post.clone());
        post
    }

    /// Replace a post's content in place. Returns (old, new).
    pub fn edit(&self, post: &PostId, content: &str) -> Option<(Post, Post)> {
        let mut inner = self.inner.lock().ok()?;
        for channel in inner.channels.values_mut() {
            if let Some(existing) = channel.posts.iter_mut().find(|p| &p.id == post) {
                let old = existing.clone();
                existing.content = content.to_string();
                return Some((old, existing.clone()));
            }
        }
        None
    }

    /// Every effect so far, oldest first.
    pub fn effects(&self) -> Vec<Effect> {
        self.inner
            .lock()
            .map(|i| i.effects.clone())
            .unwrap_or_default()
    }

    /// Reaction symbols placed on `post`.
    pub fn reactions_on(&self, post: &PostId) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Reaction { post: p, symbol } if &p == post => Some(symbol),
                _ => None,
            })
            .collect()
    }

    /// Reply texts sent for `post`.
    pub fn replies_to(&self, post: &PostId) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Reply { post: p, text, .. } if &p == post => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Latest status line.
    pub fn status(&self) -> Option<String> {
        self.effects().into_iter().rev().find_map(|e| match e {
            Effect::Status(s) => Some(s),
            _ => None,
        })
    }

    /// All posts in a channel, oldest first.
    pub fn history(&self, channel: &ChannelId) -> Vec<Post> {
        self.inner
            .lock()
            .ok()
            .and_then(|i| i.channels.get(channel).map(|c| c.posts.clone()))
            .unwrap_or_default()
    }
}

fn position(posts: &[Post], id: &PostId) -> Result<usize, PlatformError> {
    posts
        .iter()
        .position(|p| &p.id == id)
        .ok_or_else(|| PlatformError::PostNotFound(id.clone()))
}

#[async_trait]
impl ChatPlatform for MemoryPlatform {
    async fn verify_channel(&self, channel: &ChannelId) -> Result<(), PlatformError> {
        let inner = self.lock()?;
        match inner.channels.get(channel) {
            None => Err(PlatformError::ChannelNotFound(channel.clone())),
            Some(c) if !c.postable => Err(PlatformError::ChannelNotPostable(channel.clone())),
            Some(_) => Ok(()),
        }
    }

    async fn fetch_history(
        &self,
        channel: &ChannelId,
        query: HistoryQuery,
    ) -> Result<Vec<Post>, PlatformError> {
        let inner = self.lock()?;
        if inner.fail_requests {
            return Err(PlatformError::Request("history unavailable".into()));
        }
        let posts = &inner
            .channels
            .get(channel)
            .ok_or_else(|| PlatformError::ChannelNotFound(channel.clone()))?
            .posts;

        let slice = match query {
            HistoryQuery::Latest { limit } => &posts[posts.len().saturating_sub(limit)..],
            HistoryQuery::After { post } => &posts[position(posts, &post)? + 1..],
            HistoryQuery::Before { post, limit } => {
                let end = position(posts, &post)?;
                &posts[end.saturating_sub(limit)..end]
            }
        };
        Ok(slice.to_vec())
    }

    async fn fetch_post(&self, channel: &ChannelId, post: &PostId) -> Result<Post, PlatformError> {
        let inner = self.lock()?;
        inner
            .channels
            .get(channel)
            .and_then(|c| c.posts.iter().find(|p| &p.id == post))
            .cloned()
            .ok_or_else(|| PlatformError::PostNotFound(post.clone()))
    }

    async fn send_reaction(&self, post: &Post, symbol: &str) -> Result<(), PlatformError> {
        let mut inner = self.lock()?;
        if inner.fail_requests {
            return Err(PlatformError::Request("reaction rejected".into()));
        }
        inner.effects.push(Effect::Reaction {
            post: post.id.clone(),
            symbol: symbol.to_string(),
        });
        Ok(())
    }

    async fn send_reply(&self, post: &Post, text: &str) -> Result<Post, PlatformError> {
        if self.lock()?.fail_requests {
            return Err(PlatformError::Request("reply rejected".into()));
        }
        let reply = self.post(post.channel_id.clone(), self.bot_id.clone(), text, Utc::now());

        let mut inner = self.lock()?;
        inner.effects.push(Effect::Reply {
            post: post.id.clone(),
            reply: reply.id.clone(),
            text: text.to_string(),
        });
        Ok(reply)
    }

    async fn set_status(&self, status: &str) -> Result<(), PlatformError> {
        let mut inner = self.lock()?;
        inner.effects.push(Effect::Status(status.to_string()));
        Ok(())
    }
}
