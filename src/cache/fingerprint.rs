//! Cache validator derivation.
//!
//! The validator format is kept bit-compatible with validators already held by
//! clients: `{Y}{M}{D}{h}{m}-{len}-{digit_sum}`, with the calendar fields
//! printed without padding or separators. Different timestamps can therefore
//! collide (2024-1-11 and 2024-11-1). This is a non-cryptographic validator and
//! must not be used for integrity checks.

use std::time::SystemTime;

use time::OffsetDateTime;

/// Derive the validator for an asset from its mtime, raw length, and filename.
pub fn fingerprint(last_modified: SystemTime, raw_len: usize, filename: &str) -> String {
    let stamp = OffsetDateTime::from(last_modified);
    format!(
        "{}{}{}{}{}-{}-{}",
        stamp.year(),
        u8::from(stamp.month()),
        stamp.day(),
        stamp.hour(),
        stamp.minute(),
        raw_len,
        digit_sum(filename),
    )
}

/// Sum of `codepoint - '0'` over every character of `text`.
///
/// Characters below `'0'` (such as `.` and `-`) contribute negative values.
pub fn digit_sum(text: &str) -> i64 {
    text.chars().map(|c| i64::from(u32::from(c)) - 48).sum()
}
