//! Streak Recovery
//!
//! Rebuilds the current number and the recent-author window from channel
//! history after a restart. The replay judges each historical post exactly
//! as live processing would have: same validator, same window contents.
//!
//! ## Slice layout
//!
//! ```text
//!  posts:  [ top-up ............ | primary ....................... ]
//!           window context only    candidate + backward walk happen here
//!                                  ^ primary_start
//! ```
//!
//! The primary part is everything after the reset anchor (or the plain
//! lookback slice when there is no anchor). Older top-up posts only warm the
//! window.
//!
//! An anchored slice holds the whole streak, so the backward walk must land
//! on `1`. Bot replies to the anchor are skipped there, since users may post
//! before the reply arrives. Without an anchor the walk trusts whatever lies
//! past the first bot post or the lookback edge.

use crate::core::parse::parse_leading_number;
use crate::core::post::Post;
use crate::core::window::RecentAuthorWindow;
use crate::game::rules::{validate, ValidationResult, Violation};

/// A historical post that already broke the streak.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokenPost {
    /// The offending post
    pub post: Post,
    /// What it broke, as judged at the time it was posted
    pub violations: Vec<Violation>,
}

/// Result of replaying history.
#[derive(Clone, Debug)]
pub struct RecoveryOutcome {
    /// Rebuilt current number
    pub current_number: u64,
    /// Window as continuous live operation would have left it
    pub window: RecentAuthorWindow,
    /// Post that broke the streak, to be handled like a live failure
    pub broken: Option<BrokenPost>,
    /// Posts confirmed as a valid chain
    pub verified: usize,
}

/// Replay `posts` (oldest first) and rebuild the streak.
///
/// `primary_start` is the index of the first post after the reset anchor.
/// `anchored` tells whether the primary part starts right after a reset, in
/// which case the streak in it has to count up from 1.
pub fn replay_history(
    posts: &[Post],
    primary_start: usize,
    anchored: bool,
    unique_users: usize,
) -> RecoveryOutcome {
    let primary_start = primary_start.min(posts.len());

    // Window state just before each post
    let mut window = RecentAuthorWindow::new(unique_users);
    let mut before: Vec<RecentAuthorWindow> = Vec::with_capacity(posts.len());
    for post in posts {
        before.push(window.clone());
        window.add(post.clone());
    }

    let mut outcome = RecoveryOutcome {
        current_number: 0,
        window,
        broken: None,
        verified: 0,
    };

    let Some(candidate_idx) = (primary_start..posts.len())
        .rev()
        .find(|&i| !posts[i].is_system_authored)
    else {
        return outcome;
    };

    let candidate = &posts[candidate_idx];
    let Some(leading) = parse_leading_number(&candidate.content) else {
        outcome.broken = Some(BrokenPost {
            post: candidate.clone(),
            violations: validate(candidate, &before[candidate_idx], 0, unique_users)
                .violations()
                .to_vec(),
        });
        return outcome;
    };

    let mut expected = leading.value;
    for idx in (primary_start..=candidate_idx).rev() {
        if expected == 0 {
            break;
        }

        let post = &posts[idx];
        if post.is_system_authored {
            if anchored {
                continue;
            }
            break;
        }

        if let ValidationResult::Invalid { violations } =
            validate(post, &before[idx], expected - 1, unique_users)
        {
            outcome.broken = Some(BrokenPost {
                post: post.clone(),
                violations,
            });
            outcome.verified = 0;
            return outcome;
        }

        outcome.verified += 1;
        expected -= 1;
    }

    if anchored && expected != 0 {
        // Nothing after the reset counted up from 1, so live play would have
        // rejected every post of this chain; the newest one ends it.
        outcome.broken = Some(BrokenPost {
            post: candidate.clone(),
            violations: validate(candidate, &before[candidate_idx], 0, unique_users)
                .violations()
                .to_vec(),
        });
        outcome.verified = 0;
        return outcome;
    }

    outcome.current_number = leading.value;
    outcome
}
