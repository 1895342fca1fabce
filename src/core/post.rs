//! Post and Identifier Types
//!
//! Posts are observed once from the chat collaborator and never mutated.
//! Identifiers are opaque strings (platform snowflakes), wrapped so an
//! author id can never be passed where a post id is expected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw id.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id! {
    /// Unique post identifier.
    PostId
}

string_id! {
    /// Unique author (user) identifier.
    AuthorId
}

string_id! {
    /// Channel identifier.
    ChannelId
}

// =============================================================================
// POST
// =============================================================================

/// A single chat post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Post id
    pub id: PostId,

    /// Channel the post was made in
    pub channel_id: ChannelId,

    /// Who wrote it
    pub author_id: AuthorId,

    /// Raw text content
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Written by the bot itself (replies, announcements)
    pub is_system_authored: bool,
}

impl Post {
    /// Create a post by a regular participant.
    pub fn new(
        id: impl Into<PostId>,
        channel_id: impl Into<ChannelId>,
        author_id: impl Into<AuthorId>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            content: content.into(),
            created_at,
            is_system_authored: false,
        }
    }

    /// Mark this post as written by the bot.
    pub fn system_authored(mut self) -> Self {
        self.is_system_authored = true;
        self
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<String> for AuthorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
