//! Fuzzy matching utilities for near-miss hints
//!
//! Command matching is exact; these helpers only explain why a transcript
//! missed by pointing at the closest registered phrase.

use strsim::normalized_levenshtein;

/// Result of a fuzzy match with the matched value and score
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub value: String,
    pub score: f64,
}

/// Normalize a transcript: lowercase, trimmed, single-spaced
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find matches in a list of candidates
///
/// Returns up to `n` matches with scores at or above `cutoff`, best first.
pub fn find_matches<'a, I>(search_term: &str, candidates: I, n: usize, cutoff: f64) -> Vec<FuzzyMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let search = normalize_text(search_term);
    if search.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<FuzzyMatch> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = normalized_levenshtein(&search, &normalize_text(candidate));
            (score >= cutoff).then(|| FuzzyMatch {
                value: candidate.to_string(),
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(n);

    matches
}

/// Find the best match above a minimum score
///
/// Returns None if no match meets the cutoff
pub fn find_best_match<'a, I>(search_term: &str, candidates: I, cutoff: f64) -> Option<FuzzyMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    find_matches(search_term, candidates, 1, cutoff)
        .into_iter()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Turn   LEFT "), "turn left");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_find_best_match() {
        let candidates = ["move forward", "go back", "halt"];

        let best = find_best_match("move forwards", candidates, 0.6);
        assert_eq!(best.map(|m| m.value), Some("move forward".to_string()));
    }

    #[test]
    fn test_find_matches_orders_and_truncates() {
        let candidates = ["turn left", "turn right", "strafe left"];
        let matches = find_matches("turn lft", candidates, 2, 0.5);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].value, "turn left");
        assert!(matches[0].score >= matches[1].score);
    }

    #[test]
    fn test_empty_term_matches_nothing() {
        assert!(find_matches("   ", ["stop"], 5, 0.0).is_empty());
    }

    #[test]
    fn test_hint_cutoff_guardrail() {
        assert!(find_best_match("forwards", ["forward"], 0.8).is_some());
        assert!(find_best_match("halting", ["halt"], 0.6).is_none());
        assert!(find_best_match("pause", ["forward"], 0.5).is_none());
    }
}
