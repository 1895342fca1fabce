//! Leading Number Parsing
//!
//! One parser shared by every numeric rule so leading-zero, trailing-character
//! and wrong-number checks all agree on what "the number" of a post is.
//!
//! Digits are ASCII only. Whitespace is Unicode whitespace.

/// The leading integer token of a post.
///
/// A token is a run of ASCII digits at the very start of the content that is
/// immediately followed by whitespace or the end of the content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeadingNumber<'a> {
    /// Parsed value (saturates at `u64::MAX`)
    pub value: u64,
    /// The digit run exactly as written, leading zeros included
    pub raw: &'a str,
}

/// Return the run of ASCII digits at the start of `content`, if any.
pub fn leading_digits(content: &str) -> Option<&str> {
    let end = content
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(content.len());

    if end == 0 {
        None
    } else {
        Some(&content[..end])
    }
}

/// The character right after the leading digit run, if there is one.
pub fn char_after_digits(content: &str) -> Option<char> {
    let digits = leading_digits(content)?;
    content[digits.len()..].chars().next()
}

/// Parse the leading integer token of `content`.
///
/// Returns `None` when the content does not start with a digit or when the
/// digit run is glued to a non-whitespace character (`"12a"`, `"1?"`).
pub fn parse_leading_number(content: &str) -> Option<LeadingNumber<'_>> {
    let raw = leading_digits(content)?;

    match content[raw.len()..].chars().next() {
        Some(c) if !c.is_whitespace() => None,
        _ => Some(LeadingNumber {
            value: digits_value(raw),
            raw,
        }),
    }
}

/// Numeric value of an ASCII digit run.
pub fn digits_value(digits: &str) -> u64 {
    digits.bytes().fold(0u64, |acc, b| {
        acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
    })
}
