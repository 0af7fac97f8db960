//! Pull request template stripping
//!
//! Descriptions written against a repository template carry its headings and
//! checklist text verbatim. Every non-trivial template line is removed from
//! the description before preprocessing.

use once_cell::sync::Lazy;
use regex::Regex;

static EDGE_NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\W+|\W+$").expect("valid edge regex"));

/// Trim leading and trailing non-word characters and surrounding whitespace
fn strip_line(line: &str) -> String {
    EDGE_NON_WORD.replace_all(line, "").trim().to_string()
}

/// Remove every template line from the description
pub fn remove_template(description: &str, template: &str) -> String {
    template
        .lines()
        .map(strip_line)
        .filter(|line| !line.is_empty())
        .fold(description.to_string(), |desc, line| desc.replace(&line, ""))
}
