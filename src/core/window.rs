//! Recent Author Window
//!
//! Bounded record of the most recent posts, newest first. Holds just enough
//! history to decide whether `unique_users` distinct authors posted since a
//! given author's previous post.
//!
//! Once warmed, the window is the shortest newest-first prefix whose set of
//! distinct authors has `unique_users + 1` members. Anything older can never
//! produce a spacing violation and is dropped.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::post::{AuthorId, Post};

/// Posts and distinct authors between a new post and its author's previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    /// Posts in between
    pub messages_between: usize,
    /// Distinct authors of those posts
    pub distinct_authors_between: usize,
}

/// Sliding window of recent posts.
#[derive(Clone, Debug)]
pub struct RecentAuthorWindow {
    /// Newest first
    posts: VecDeque<Post>,
    /// Required distinct authors between two posts by the same author
    unique_users: usize,
}

impl RecentAuthorWindow {
    /// Create an empty window.
    ///
    /// `unique_users` is clamped to at least 1; `Config` rejects 0 before
    /// it gets here.
    pub fn new(unique_users: usize) -> Self {
        Self {
            posts: VecDeque::new(),
            unique_users: unique_users.max(1),
        }
    }

    /// Required spacing.
    pub fn unique_users(&self) -> usize {
        self.unique_users
    }

    /// Number of posts currently held.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// True when nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Record a new post and drop history that can no longer matter.
    pub fn add(&mut self, post: Post) {
        self.posts.push_front(post);
        self.prune();
    }

    fn prune(&mut self) {
        let mut authors: BTreeSet<&AuthorId> = BTreeSet::new();
        let mut cut = None;

        for (idx, post) in self.posts.iter().enumerate() {
            authors.insert(&post.author_id);
            if authors.len() > self.unique_users {
                cut = Some(idx + 1);
                break;
            }
        }

        if let Some(cut) = cut {
            self.posts.truncate(cut);
        }
    }

    /// Spacing since `author`'s most recent post in the window.
    ///
    /// `None` means the author has no post in the window, which can never be
    /// a violation.
    pub fn authors_since(&self, author: &AuthorId) -> Option<Spacing> {
        let idx = self.posts.iter().position(|p| &p.author_id == author)?;

        let distinct: BTreeSet<&AuthorId> = self
            .posts
            .iter()
            .take(idx)
            .map(|p| &p.author_id)
            .collect();

        Some(Spacing {
            messages_between: idx,
            distinct_authors_between: distinct.len(),
        })
    }

    /// Copy of the held posts, oldest first.
    pub fn snapshot(&self) -> Vec<Post> {
        self.posts.iter().rev().cloned().collect()
    }

    /// Most recent post, if any.
    pub fn newest(&self) -> Option<&Post> {
        self.posts.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn post(id: u32, author: &str) -> Post {
        Post::new(id.to_string(), "count", author, id.to_string(), Utc::now())
    }

    fn window_of(unique_users: usize, authors: &[&str]) -> RecentAuthorWindow {
        let mut window = RecentAuthorWindow::new(unique_users);
        for (i, author) in authors.iter().enumerate() {
            window.add(post(i as u32 + 1, author));
        }
        window
    }

    #[test]
    fn test_five_distinct_authors_are_kept() {
        let window = window_of(5, &["alice", "bob", "charlie", "dave", "erin"]);
        assert_eq!(window.len(), 5);

        let spacing = window.authors_since(&"alice".into()).unwrap();
        assert_eq!(spacing.messages_between, 4);
        assert_eq!(spacing.distinct_authors_between, 4);
    }

    #[test]
    fn test_prunes_past_boundary_author() {
        let window = window_of(2, &["alice", "bob", "alice", "carol", "dave"]);

        // dave, carol, alice -> third distinct author is the boundary
        let ids: Vec<_> = window
            .snapshot()
            .into_iter()
            .map(|p| p.author_id.0)
            .collect();
        assert_eq!(ids, vec!["alice", "carol", "dave"]);
    }

    #[test]
    fn test_repeated_authors_stretch_the_window() {
        let window = window_of(2, &["alice", "bob", "bob", "bob", "carol"]);

        // carol, bob, bob, bob, alice: alice is the third distinct author
        assert_eq!(window.len(), 5);
        let spacing = window.authors_since(&"alice".into()).unwrap();
        assert_eq!(spacing.messages_between, 4);
        assert_eq!(spacing.distinct_authors_between, 2);
    }

    #[test]
    fn test_unknown_author_has_no_conflict() {
        let window = window_of(3, &["alice", "bob"]);
        assert_eq!(window.authors_since(&"zed".into()), None);
    }

    #[test]
    fn test_immediate_repeat() {
        let window = window_of(3, &["alice"]);
        let spacing = window.authors_since(&"alice".into()).unwrap();
        assert_eq!(spacing.messages_between, 0);
        assert_eq!(spacing.distinct_authors_between, 0);
    }

    #[test]
    fn test_snapshot_is_oldest_first_and_non_mutating() {
        let window = window_of(5, &["a", "b", "c"]);
        let first = window.snapshot();
        let second = window.snapshot();
        assert_eq!(first, second);
        assert_eq!(first[0].author_id.as_str(), "a");
        assert_eq!(window.newest().unwrap().author_id.as_str(), "c");
    }

    #[test]
    fn test_zero_unique_users_is_clamped() {
        let window = RecentAuthorWindow::new(0);
        assert_eq!(window.unique_users(), 1);
    }

    /// Spacing violation judged against the complete history.
    fn violates_in_full_history(history: &[&str], author: &str, unique_users: usize) -> bool {
        match history.iter().rposition(|a| *a == author) {
            Some(last) => {
                let between: BTreeSet<&&str> = history[last + 1..].iter().collect();
                between.len() < unique_users
            }
            None => false,
        }
    }

    proptest! {
        #[test]
        fn prop_window_agrees_with_full_history(
            unique_users in 1usize..6,
            authors in proptest::collection::vec(0u8..8, 1..80),
        ) {
            let names: Vec<String> = authors.iter().map(|a| format!("user{}", a)).collect();
            let mut window = RecentAuthorWindow::new(unique_users);
            let mut history: Vec<&str> = Vec::new();

            for (i, name) in names.iter().enumerate() {
                let by_window = window
                    .authors_since(&AuthorId::new(name.as_str()))
                    .map(|s| s.distinct_authors_between < unique_users)
                    .unwrap_or(false);
                prop_assert_eq!(
                    by_window,
                    violates_in_full_history(&history, name, unique_users)
                );

                window.add(post(i as u32, name));
                history.push(name);
            }
        }
    }
}
