//! Response Text
//!
//! Reactions and reply text the bot sends back. Wording is plain English;
//! a localized copy layer can replace these functions without touching the
//! game logic.

use chrono::Duration;

use crate::game::rules::Violation;

/// Reaction on a post that broke the streak.
pub const FAILURE_REACTION: &str = "❌";

/// Reactions on the post that first beats the record.
pub const CELEBRATION_REACTIONS: [&str; 3] = ["🎉", "🏆", "🥳"];

/// Reply for a post that broke one or more rules.
///
/// `streak_age` is included when the broken streak is worth mentioning.
pub fn compose_failure_reply(
    violations: &[Violation],
    broken_at: u64,
    streak_age: Option<Duration>,
) -> String {
    let mut lines: Vec<String> = violations.iter().map(ToString::to_string).collect();

    if let Some(age) = streak_age {
        lines.push(format!(
            "That ends a streak of {} that lasted {}.",
            broken_at,
            format_duration(age)
        ));
    }

    lines.push("Back to 1!".to_string());
    lines.join("\n")
}

/// Reply for an edited post.
pub fn compose_edit_rebuke() -> String {
    "Editing a message during a streak is not allowed. The count starts over at 1.".to_string()
}

/// Human-readable duration, largest two units.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_minutes().max(0);
    let (days, hours, minutes) = (total / (24 * 60), (total / 60) % 24, total % 60);

    let unit = |n: i64, name: &str| {
        if n == 1 {
            format!("1 {}", name)
        } else {
            format!("{} {}s", n, name)
        }
    };

    match (days, hours, minutes) {
        (0, 0, m) => unit(m, "minute"),
        (0, h, 0) => unit(h, "hour"),
        (0, h, m) => format!("{} {}", unit(h, "hour"), unit(m, "minute")),
        (d, 0, _) => unit(d, "day"),
        (d, h, _) => format!("{} {}", unit(d, "day"), unit(h, "hour")),
    }
}
