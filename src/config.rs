//! Configuration
//!
//! Loaded from environment variables:
//!
//! | Variable                | Required | Default      |
//! |-------------------------|----------|--------------|
//! | `CHANNEL_ID`            | yes      |              |
//! | `UNIQUE_USERS`          | yes      |              |
//! | `ADMIN_IDS`             | yes      | (comma list) |
//! | `STATE_FILE`            | no       | `state.json` |
//! | `STREAK_NOTICE_MINUTES` | no       | `60`         |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::post::{AuthorId, ChannelId};

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable not set.
    #[error("Missing config value {0}")]
    Missing(&'static str),

    /// Variable set to something unusable.
    #[error("Invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },

    /// Spacing rule needs at least one other author.
    #[error("UNIQUE_USERS must be at least 1")]
    ZeroUniqueUsers,
}

/// Counting game configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Channel the game runs in.
    pub channel_id: ChannelId,
    /// Distinct authors required between two posts by the same author.
    pub unique_users: usize,
    /// Who may run administrative commands.
    pub admin_ids: Vec<AuthorId>,
    /// Where the durable state lives.
    pub state_file: PathBuf,
    /// Streaks older than this get their duration mentioned when broken.
    pub streak_notice_after: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_id: ChannelId::new("counting"),
            unique_users: 5,
            admin_ids: Vec::new(),
            state_file: PathBuf::from("state.json"),
            streak_notice_after: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let channel_id = ChannelId::new(required("CHANNEL_ID")?.trim());

        let raw = required("UNIQUE_USERS")?;
        let unique_users: usize = raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "UNIQUE_USERS",
            value: raw.clone(),
        })?;

        let admin_ids = lookup("ADMIN_IDS")
            .ok_or(ConfigError::Missing("ADMIN_IDS"))?
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(AuthorId::from)
            .collect();

        let defaults = Config::default();

        let state_file = lookup("STATE_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        let streak_notice_after = match lookup("STREAK_NOTICE_MINUTES") {
            Some(raw) => {
                let seconds = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .and_then(|minutes| minutes.checked_mul(60))
                    .ok_or_else(|| ConfigError::Invalid {
                        key: "STREAK_NOTICE_MINUTES",
                        value: raw.clone(),
                    })?;
                Duration::from_secs(seconds)
            }
            None => defaults.streak_notice_after,
        };

        let config = Self {
            channel_id,
            unique_users,
            admin_ids,
            state_file,
            streak_notice_after,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unique_users == 0 {
            return Err(ConfigError::ZeroUniqueUsers);
        }
        if lookback(self.unique_users).is_none() {
            return Err(ConfigError::Invalid {
                key: "UNIQUE_USERS",
                value: self.unique_users.to_string(),
            });
        }
        Ok(())
    }

    /// How many recent posts startup recovery looks at without an anchor.
    pub fn history_lookback(&self) -> usize {
        lookback(self.unique_users).unwrap_or(usize::MAX)
    }

    /// Check whether `author` may run administrative commands.
    pub fn is_admin(&self, author: &AuthorId) -> bool {
        self.admin_ids.contains(author)
    }
}

fn lookback(unique_users: usize) -> Option<usize> {
    unique_users.checked_mul(2)?.checked_add(5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_lookup(lookup(&[
            ("CHANNEL_ID", "123"),
            ("UNIQUE_USERS", "3"),
            ("ADMIN_IDS", "a, b,,c"),
            ("STATE_FILE", "/tmp/count.json"),
            ("STREAK_NOTICE_MINUTES", "5"),
        ]))
        .unwrap();

        assert_eq!(config.channel_id, ChannelId::new("123"));
        assert_eq!(config.unique_users, 3);
        assert_eq!(config.admin_ids.len(), 3);
        assert!(config.is_admin(&AuthorId::new("b")));
        assert_eq!(config.state_file, PathBuf::from("/tmp/count.json"));
        assert_eq!(config.streak_notice_after, Duration::from_secs(300));
        assert_eq!(config.history_lookback(), 11);
    }

    #[test]
    fn test_defaults_for_optional_values() {
        let config = Config::from_lookup(lookup(&[
            ("CHANNEL_ID", "123"),
            ("UNIQUE_USERS", "5"),
            ("ADMIN_IDS", ""),
        ]))
        .unwrap();

        assert!(config.admin_ids.is_empty());
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert_eq!(config.streak_notice_after, Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(
            Config::from_lookup(lookup(&[("UNIQUE_USERS", "5"), ("ADMIN_IDS", "")])),
            Err(ConfigError::Missing("CHANNEL_ID"))
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("CHANNEL_ID", "1"), ("UNIQUE_USERS", "5")])),
            Err(ConfigError::Missing("ADMIN_IDS"))
        );
    }

    #[test]
    fn test_invalid_unique_users() {
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("CHANNEL_ID", "1"),
                ("UNIQUE_USERS", "five"),
                ("ADMIN_IDS", "")
            ])),
            Err(ConfigError::Invalid { key: "UNIQUE_USERS", .. })
        ));
        assert_eq!(
            Config::from_lookup(lookup(&[
                ("CHANNEL_ID", "1"),
                ("UNIQUE_USERS", "0"),
                ("ADMIN_IDS", "")
            ])),
            Err(ConfigError::ZeroUniqueUsers)
        );
    }

    #[test]
    fn test_oversized_values_are_rejected() {
        let huge_users = usize::MAX.to_string();
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("CHANNEL_ID", "1"),
                ("UNIQUE_USERS", huge_users.as_str()),
                ("ADMIN_IDS", "")
            ])),
            Err(ConfigError::Invalid { key: "UNIQUE_USERS", .. })
        ));

        let huge_minutes = u64::MAX.to_string();
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("CHANNEL_ID", "1"),
                ("UNIQUE_USERS", "2"),
                ("ADMIN_IDS", ""),
                ("STREAK_NOTICE_MINUTES", huge_minutes.as_str()),
            ])),
            Err(ConfigError::Invalid { key: "STREAK_NOTICE_MINUTES", .. })
        ));

        // A hand-built config never panics computing the lookback
        let config = Config {
            unique_users: usize::MAX,
            ..Default::default()
        };
        assert_eq!(config.history_lookback(), usize::MAX);
    }
}
