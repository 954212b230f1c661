//! Output clean-up applied after rendering
//!
//! Directive tags leave behind trailing spaces and runs of empty lines; this
//! pass tidies them so reports read as hand-written markdown.

use once_cell::sync::Lazy;
use regex::Regex;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Normalize rendered text
///
/// Strips trailing whitespace from every line, collapses three or more
/// consecutive newlines into two, then trims the whole result. Applying it
/// twice gives the same text as applying it once.
pub fn normalize(text: &str) -> String {
    let stripped = text
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_RUNS.replace_all(&stripped, "\n\n").trim().to_string()
}
