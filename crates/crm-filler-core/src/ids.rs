//! Persistent identifier minting.
//!
//! Identifiers look like `{prefix}-{number}` (`CO-2001`, `C-2014`, `D-2003`).
//! A new identifier is one past the highest number already present in the
//! collection, starting from 2001 for an empty collection. Records are never
//! deleted by this crate, so the scan is monotonic.

use crate::models::Record;

/// Number used as the "highest seen" when a collection has no numbered ids.
pub const ID_BASE: u64 = 2000;

/// Numeric segment of an identifier (the part after the first `-`, up to
/// the next `-`) as decimal digits without leading zeros, at any length.
/// Returns `None` when it is missing or not a number.
pub fn id_digits(id: &str) -> Option<&str> {
    let segment = id.split('-').nth(1)?.trim();
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = segment.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed })
}

/// `digits + 1` in decimal. Stored suffixes can exceed any fixed-width
/// integer, so the addition works on the text.
fn increment(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    let mut carried = String::with_capacity(out.len() + 1);
    carried.push('1');
    carried.push_str(&String::from_utf8_lossy(&out));
    carried
}

/// Mint the next identifier for `prefix` given the ids already in use.
pub fn next_id_from<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    // Without leading zeros, a longer digit string is the larger number.
    let highest = existing
        .into_iter()
        .filter_map(id_digits)
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    let next = match highest {
        Some(digits) => increment(digits),
        None => (ID_BASE + 1).to_string(),
    };
    format!("{}-{}", prefix, next)
}

/// Mint the next identifier for a typed collection.
pub fn next_id<R: Record>(prefix: &str, records: &[R]) -> String {
    next_id_from(prefix, records.iter().map(|r| r.id()))
}
