//! Counting Rules
//!
//! Pure validation of a candidate post against format, sequence and spacing
//! rules. Every rule category is evaluated; the result carries all violations
//! found, in a fixed order:
//!
//! 1. `TooFewUniqueAuthors` - author posted again too soon
//! 2. `NoLeadingNumber` - content does not start with a digit
//! 3. `LeadingZero` - content starts with `0`
//! 4. `TrailingCharacter` - digit run glued to a non-whitespace character
//! 5. `WrongNumber` - leading integer is not `current + 1`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::parse::{char_after_digits, leading_digits, parse_leading_number};
use crate::core::post::Post;
use crate::core::window::RecentAuthorWindow;

// =============================================================================
// VIOLATIONS
// =============================================================================

/// Broad category of a violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Malformed number
    Format,
    /// Number out of sequence
    Sequence,
    /// Author posted too soon
    Spacing,
}

/// A single broken rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum Violation {
    /// Content does not start with an ASCII digit
    NoLeadingNumber,

    /// Content starts with `0`
    LeadingZero,

    /// Digit run followed by something other than whitespace
    TrailingCharacter {
        /// The offending character
        character: char,
        /// The digit run before it, as written
        number: String,
    },

    /// Leading integer is not the next number
    WrongNumber {
        /// What should have been posted
        expected: u64,
        /// What was posted
        actual: u64,
    },

    /// Fewer distinct authors than required since this author's last post
    #[serde(rename_all = "camelCase")]
    TooFewUniqueAuthors {
        /// Posts since the author's previous post
        messages_between: usize,
        /// Distinct authors of those posts
        distinct_authors_between: usize,
    },
}

impl Violation {
    /// Category of this violation.
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::NoLeadingNumber
            | Violation::LeadingZero
            | Violation::TrailingCharacter { .. } => ViolationKind::Format,
            Violation::WrongNumber { .. } => ViolationKind::Sequence,
            Violation::TooFewUniqueAuthors { .. } => ViolationKind::Spacing,
        }
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NoLeadingNumber => write!(f, "Message does not start with a number."),
            Violation::LeadingZero => write!(f, "Message starts with a zero."),
            Violation::TrailingCharacter { character, number } => write!(
                f,
                "Extra character \"{}\" found after number \"{}\".",
                character, number
            ),
            Violation::WrongNumber { expected, actual } => write!(
                f,
                "Wrong number, expected \"{}\" got \"{}\".",
                expected, actual
            ),
            Violation::TooFewUniqueAuthors {
                messages_between,
                distinct_authors_between,
            } if messages_between == distinct_authors_between => write!(
                f,
                "Only {} {} since your last one.",
                messages_between,
                plural(*messages_between, "message", "messages"),
            ),
            Violation::TooFewUniqueAuthors {
                messages_between,
                distinct_authors_between,
            } => write!(
                f,
                "There {} {} {} since your last one, but only {} unique {} posted.",
                plural(*messages_between, "was", "were"),
                messages_between,
                plural(*messages_between, "message", "messages"),
                distinct_authors_between,
                plural(*distinct_authors_between, "person", "people"),
            ),
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Outcome of validating one post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationResult {
    /// Post is the correct next number
    Valid {
        /// The number that was counted
        number: u64,
    },
    /// One or more rules were broken
    Invalid {
        /// Every violation, in rule order
        violations: Vec<Violation>,
    },
}

impl ValidationResult {
    /// True when no rule was broken.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    /// Violations found (empty when valid).
    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Valid { .. } => &[],
            ValidationResult::Invalid { violations } => violations,
        }
    }
}

/// Validate `post` as the successor of `current_number`.
///
/// `window` must not yet contain `post`. Pure: the same inputs always give
/// the same result.
pub fn validate(
    post: &Post,
    window: &RecentAuthorWindow,
    current_number: u64,
    unique_users: usize,
) -> ValidationResult {
    let mut violations = Vec::new();
    let content = post.content.as_str();

    // 1. Spacing
    if let Some(spacing) = window.authors_since(&post.author_id) {
        if spacing.distinct_authors_between < unique_users {
            violations.push(Violation::TooFewUniqueAuthors {
                messages_between: spacing.messages_between,
                distinct_authors_between: spacing.distinct_authors_between,
            });
        }
    }

    let digits = leading_digits(content);

    // 2. Must start with a digit
    if digits.is_none() {
        violations.push(Violation::NoLeadingNumber);
    }

    // 3. No leading zero
    if content.starts_with('0') {
        violations.push(Violation::LeadingZero);
    }

    // 4. Separated from any following text
    if let (Some(number), Some(character)) = (digits, char_after_digits(content)) {
        if !character.is_whitespace() {
            violations.push(Violation::TrailingCharacter {
                character,
                number: number.to_string(),
            });
        }
    }

    // 5. Correct number
    let expected = current_number.saturating_add(1);
    let parsed = parse_leading_number(content);
    if let Some(leading) = parsed {
        if leading.value != expected {
            violations.push(Violation::WrongNumber {
                expected,
                actual: leading.value,
            });
        }
    }

    match parsed {
        Some(leading) if violations.is_empty() => ValidationResult::Valid {
            number: leading.value,
        },
        _ => ValidationResult::Invalid { violations },
    }
}
