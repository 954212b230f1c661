//! Fuzzy matching for "did you mean" hints
//!
//! Used when a template references a filter that is not registered, so the
//! warning can point at the most likely intended name.

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Filters every engine starts with
pub const BUILTIN_FILTERS: &[&str] = &[
    // Report formatting
    "score",
    "metric",
    "size",
    "list",
    "prioritize",
    // General purpose
    "json",
    "upper",
    "lower",
    "default",
    "length",
    "first",
    "last",
    "join",
    "truncate",
    "round",
    // String helpers
    "trim",
    "capitalize",
    "replace",
    "indent",
    "keys",
    "reverse",
];

/// Suggestion result with confidence scoring
#[derive(Debug, Clone)]
pub struct Suggestion {
    /// The suggested correction
    pub text: String,
    /// Levenshtein distance (lower = better match)
    pub distance: usize,
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Find closest matches from a list of candidates
pub fn find_closest_matches(input: &str, candidates: &[&str], max_results: usize) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = levenshtein(input, candidate);
            if distance <= MAX_SUGGESTION_DISTANCE && distance > 0 {
                Some(Suggestion {
                    text: candidate.to_string(),
                    distance,
                })
            } else {
                None
            }
        })
        .collect();

    // Sort by distance (best matches first), ties alphabetically for stable output
    suggestions.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.text.cmp(&b.text)));
    suggestions.truncate(max_results);
    suggestions
}

/// Suggest corrections for an unknown filter among the registered names
pub fn suggest_unknown_filter(filter_name: &str, registered: &[&str]) -> Option<String> {
    let matches = find_closest_matches(filter_name, registered, 3);

    if matches.is_empty() {
        return None;
    }

    let suggestions: Vec<String> = matches.iter().map(|s| format!("`{}`", s.text)).collect();
    Some(format!("Did you mean {}?", suggestions.join(" or ")))
}
