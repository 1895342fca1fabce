//! Recovery History Fetching
//!
//! Pulls the slice of channel history that startup recovery replays.

use tracing::debug;

use crate::core::post::{ChannelId, Post, PostId};
use crate::network::platform::{ChatPlatform, HistoryQuery, PlatformError};

/// History to replay, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoverySlice {
    /// Top-up posts followed by the primary posts
    pub posts: Vec<Post>,
    /// Index of the first primary post
    pub primary_start: usize,
    /// Primary posts start right after a reset anchor
    pub anchored: bool,
}

impl RecoverySlice {
    /// Posts after the anchor (or the whole lookback when unanchored).
    pub fn primary(&self) -> &[Post] {
        &self.posts[self.primary_start..]
    }
}

/// Fetch the recovery slice for `channel`.
///
/// With an anchor: every post after it, topped up with older posts (anchor
/// included) until at least `lookback` posts are held. Without one: the
/// latest `lookback` posts.
pub async fn fetch_recovery_slice(
    platform: &dyn ChatPlatform,
    channel: &ChannelId,
    anchor: Option<&PostId>,
    lookback: usize,
) -> Result<RecoverySlice, PlatformError> {
    let Some(anchor) = anchor else {
        let posts = platform
            .fetch_history(channel, HistoryQuery::Latest { limit: lookback })
            .await?;
        debug!("Fetched {} posts without anchor", posts.len());
        return Ok(RecoverySlice {
            posts,
            primary_start: 0,
            anchored: false,
        });
    };

    let primary = platform
        .fetch_history(channel, HistoryQuery::After { post: anchor.clone() })
        .await?;

    if primary.len() >= lookback {
        debug!("Fetched {} posts after anchor {}", primary.len(), anchor);
        return Ok(RecoverySlice {
            posts: primary,
            primary_start: 0,
            anchored: true,
        });
    }

    let missing = lookback - primary.len();
    let older = match primary.first() {
        Some(oldest) => {
            platform
                .fetch_history(
                    channel,
                    HistoryQuery::Before {
                        post: oldest.id.clone(),
                        limit: missing,
                    },
                )
                .await?
        }
        // Nothing after the anchor: the latest posts end with it
        None => {
            platform
                .fetch_history(channel, HistoryQuery::Latest { limit: missing })
                .await?
        }
    };

    debug!(
        "Fetched {} posts after anchor {} plus {} older",
        primary.len(),
        anchor,
        older.len()
    );

    let primary_start = older.len();
    let mut posts = older;
    posts.extend(primary);
    Ok(RecoverySlice {
        posts,
        primary_start,
        anchored: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::memory::MemoryPlatform;
    use chrono::Utc;

    fn platform_with(n: usize) -> (MemoryPlatform, ChannelId) {
        let platform = MemoryPlatform::new("bot");
        let channel = ChannelId::new("count");
        for i in 1..=n {
            platform.post(channel.clone(), format!("user{}", i % 3), &i.to_string(), Utc::now());
        }
        (platform, channel)
    }

    #[tokio::test]
    async fn test_without_anchor_takes_lookback() {
        let (platform, channel) = platform_with(20);
        let slice = fetch_recovery_slice(&platform, &channel, None, 9).await.unwrap();
        assert_eq!(slice.posts.len(), 9);
        assert_eq!(slice.primary_start, 0);
        assert!(!slice.anchored);
        assert_eq!(slice.posts[0].content, "12");
    }

    #[tokio::test]
    async fn test_anchor_with_long_tail() {
        let (platform, channel) = platform_with(20);
        let slice = fetch_recovery_slice(&platform, &channel, Some(&PostId::new("5")), 9)
            .await
            .unwrap();
        assert_eq!(slice.posts.len(), 15);
        assert_eq!(slice.primary_start, 0);
        assert!(slice.anchored);
        assert_eq!(slice.primary().first().unwrap().content, "6");
    }

    #[tokio::test]
    async fn test_anchor_topped_up() {
        let (platform, channel) = platform_with(20);
        let slice = fetch_recovery_slice(&platform, &channel, Some(&PostId::new("17")), 9)
            .await
            .unwrap();

        assert_eq!(slice.posts.len(), 9);
        assert_eq!(slice.primary_start, 6);
        // Anchor is part of the top-up
        assert_eq!(slice.posts[5].id.as_str(), "17");
        assert_eq!(slice.primary().len(), 3);
    }

    #[tokio::test]
    async fn test_anchor_is_newest_post() {
        let (platform, channel) = platform_with(20);
        let slice = fetch_recovery_slice(&platform, &channel, Some(&PostId::new("20")), 9)
            .await
            .unwrap();
        assert_eq!(slice.posts.len(), 9);
        assert!(slice.primary().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let (platform, channel) = platform_with(3);
        platform.set_fail_requests(true);
        assert!(fetch_recovery_slice(&platform, &channel, None, 9).await.is_err());
    }
}
