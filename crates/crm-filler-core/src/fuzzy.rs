//! Fuzzy name matching.
//!
//! Names are compared with a token-set ratio: both strings are split into
//! word sets and scored on their overlap, so word order and repeated words
//! do not matter. Scores run from 0 (nothing in common) to 100 (one token
//! set contains the other).
//!
//! # Thresholds
//!
//! | Lookup | Accepts |
//! |--------|---------|
//! | [`best_match`] (companies) | score `>= 80` |
//! | [`find_contacts`] | score `> 80`, or same company |

use std::collections::{BTreeSet, HashSet};

use crate::models::{Contact, Record};

/// Minimum token-set score for a name to count as a match.
pub const MATCH_THRESHOLD: f64 = 80.0;

/// Maximum number of contacts returned by [`find_contacts`].
pub const MAX_CONTACTS: usize = 3;

/// Token-set similarity between two strings, on a 0–100 scale.
///
/// The strings are compared as given; callers lowercase them first.
///
/// ```rust
/// use crm_filler_core::fuzzy::token_set_ratio;
///
/// assert_eq!(token_set_ratio("mercury consulting", "consulting mercury"), 100.0);
/// assert!(token_set_ratio("mercury consulting", "mercury consultants") >= 80.0);
/// assert_eq!(token_set_ratio("", "mercury"), 0.0);
/// ```
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let diff_ab: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let diff_ba: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    // BTreeSet iteration is already sorted.
    let sect_joined = sect.join(" ");
    let ab_joined = diff_ab.join(" ");
    let ba_joined = diff_ba.join(" ");

    let sect_len = sect_joined.chars().count();
    let ab_len = ab_joined.chars().count();
    let ba_len = ba_joined.chars().count();
    let separator = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + separator + ab_len;
    let sect_ba_len = sect_len + separator + ba_len;

    // "sect ab" vs "sect ba" share their prefix, so only the tails differ.
    let dist = indel_distance(&ab_joined, &ba_joined);
    let mut best = normalized_similarity(dist, sect_ab_len + sect_ba_len);

    if sect_len != 0 {
        let sect_ab = normalized_similarity(separator + ab_len, sect_len + sect_ab_len);
        let sect_ba = normalized_similarity(separator + ba_len, sect_len + sect_ba_len);
        best = best.max(sect_ab).max(sect_ba);
    }

    best
}

fn normalized_similarity(dist: usize, lensum: usize) -> f64 {
    if lensum == 0 {
        return 100.0;
    }
    100.0 * (1.0 - dist as f64 / lensum as f64)
}

/// Insertions plus deletions needed to turn `a` into `b`.
fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Score `query` against a candidate name, both lowercased.
pub fn name_score(query: &str, name: &str) -> f64 {
    token_set_ratio(&query.trim().to_lowercase(), &name.to_lowercase())
}

/// Returns the best-scoring candidate if it reaches [`MATCH_THRESHOLD`].
///
/// Ties go to the candidate that appears first.
pub fn best_match<'a, R: Record>(query: &str, candidates: &'a [R]) -> Option<&'a R> {
    let mut best: Option<&R> = None;
    let mut best_score = 0.0;

    for candidate in candidates {
        let score = name_score(query, candidate.name());
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }

    best.filter(|_| best_score >= MATCH_THRESHOLD)
}

/// Contacts relevant to a meeting: those belonging to `company_id`, plus
/// those whose name scores above [`MATCH_THRESHOLD`].
///
/// Duplicates are collapsed by contact id, keeping the first position. The
/// result is truncated to [`MAX_CONTACTS`] in that order, not by score.
pub fn find_contacts<'a>(
    query: &str,
    candidates: &'a [Contact],
    company_id: Option<&str>,
) -> Vec<&'a Contact> {
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for contact in candidates {
        let same_company =
            company_id.is_some_and(|id| contact.company_id.as_deref() == Some(id));
        let name_hit = name_score(query, &contact.name) > MATCH_THRESHOLD;
        if (same_company || name_hit) && seen.insert(contact.contact_id.as_str()) {
            results.push(contact);
        }
    }

    results.truncate(MAX_CONTACTS);
    results
}
