//! Fuzzy scoring and stable filtering of candidate strings

use std::cmp::Ordering;

/// Score `candidate` against `query`, case-insensitively, in `[0, 1]`.
///
/// Bands, best first: exact match, prefix, interior substring, character
/// subsequence. Within a band, a query covering more of the candidate
/// scores higher. 0.0 means no match.
pub fn score(query: &str, candidate: &str) -> f64 {
    if query.is_empty() {
        return 1.0;
    }
    let q = query.to_lowercase();
    let c = candidate.to_lowercase();
    if c == q {
        return 1.0;
    }

    let coverage = q.chars().count() as f64 / c.chars().count().max(1) as f64;
    if c.starts_with(&q) {
        return 0.75 + 0.25 * coverage;
    }
    if c.contains(&q) {
        return 0.45 + 0.25 * coverage;
    }
    if is_subsequence(&q, &c) {
        return 0.2 + 0.2 * coverage;
    }
    0.0
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut haystack_chars = haystack.chars();
    needle
        .chars()
        .all(|n| haystack_chars.any(|h| h == n))
}

/// Filter and rank `items` by the fuzzy score of their key against `query`.
///
/// An empty query short-circuits to all items in input order. Items scoring
/// below `min_score` (or not matching at all) are dropped; the rest are
/// sorted descending by score with a stable sort, so ties keep input order.
pub fn filter_by<T, F>(query: &str, items: Vec<T>, key_fn: F, min_score: f64) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if query.is_empty() {
        return items;
    }

    let mut scored: Vec<(f64, T)> = items
        .into_iter()
        .filter_map(|item| {
            let s = score(query, key_fn(&item));
            (s > 0.0 && s >= min_score).then_some((s, item))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(_, item)| item).collect()
}
