//! Fuzzy candidate ranking.
//!
//! Scores one mention against every catalog entry with a partial similarity
//! ratio: the best local alignment of the shorter string inside the longer,
//! normalized to 0-100. No pruning and no index; the scan is O(N) per
//! mention and parallelism lives a level up, across mentions.

use crate::catalog::EntityCatalog;

/// Best local alignment of the shorter string inside the longer, 0-100.
///
/// Slides a window the length of the shorter string across the longer one
/// and keeps the best normalized Levenshtein similarity. Comparison is over
/// chars, not bytes, so multi-byte names score correctly.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    if short.is_empty() {
        // Mirror the classic ratio convention: two empty strings are a
        // perfect match, an empty string against anything else is not.
        return if long.is_empty() { 100 } else { 0 };
    }

    let needle: String = short.iter().collect();
    let mut best = 0u32;
    for start in 0..=(long.len() - short.len()) {
        let window: String = long[start..start + short.len()].iter().collect();
        let score = (strsim::normalized_levenshtein(&needle, &window) * 100.0).round() as u32;
        if score > best {
            best = score;
            if best == 100 {
                break;
            }
        }
    }
    best
}

/// Score a mention against the full catalog and keep the top `k`.
///
/// Returns `(catalog index, score)` pairs sorted by non-increasing score;
/// equal scores keep original catalog order (the sort is stable over an
/// index-ordered input).
pub fn rank(mention: &str, catalog: &EntityCatalog, k: usize) -> Vec<(usize, u32)> {
    let mut scored: Vec<(usize, u32)> = catalog
        .records()
        .iter()
        .enumerate()
        .map(|(i, record)| (i, partial_ratio(mention, &record.canonical_name)))
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(k);
    scored
}
