//! Text preprocessing for pull request titles, descriptions and commit messages
//!
//! Deterministic string transforms applied before summarization and
//! classification:
//! - non-ASCII characters and `*` are dropped, text is lowercased
//! - sentences carrying PII or noise (emails, URLs, issue references,
//!   sign-off trailers, mentions) are removed from descriptions
//! - SHAs, version strings and bare numbers collapse to `sha`, `version`, `0`
//! - the result is word-tokenized

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))"#,
    )
    .expect("valid email regex")
});

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()!@:%_\+.~#?&/=]*)",
    )
    .expect("valid url regex")
});

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\d+").expect("valid reference regex"));

static SIGNATURE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(signed-off-by|co-authored-by|also-by):").expect("valid signature regex")
});

static AT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\S+").expect("valid mention regex"));

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(\.(0|[1-9]\d*))?(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?",
    )
    .expect("valid version regex")
});

static SHA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\dA-Fa-f-]{7,}$").expect("valid sha regex"));

static DIGIT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s|-|\.)\d+").expect("valid digit regex"));

static EMPTY_PARENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((,|\s)*\)").expect("valid parens regex"));

static WORD_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+(?:['\-]\w+)*|\.\.\.|[^\w\s]").expect("valid token regex")
});

/// Patterns whose presence removes a whole description sentence
fn noise_patterns() -> [&'static Lazy<Regex>; 5] {
    [
        &EMAIL_PATTERN,
        &URL_PATTERN,
        &REFERENCE_PATTERN,
        &SIGNATURE_PATTERN,
        &AT_PATTERN,
    ]
}

/// Clean and tokenize a pull request title
pub fn preprocess_title(s: &str) -> Vec<String> {
    let s = remove_non_ascii_and_asterisk(s);
    let s = remove_ref_and_mention(&s);
    let s = replace_words(&s);
    strip_and_tokenize(&s)
}

/// Clean and tokenize a description or a block of commit messages
pub fn preprocess_desc_and_commits(s: &str) -> Vec<String> {
    let s = remove_non_ascii_and_asterisk(s);
    let s = drop_noisy_sentences(&s);
    let s = replace_words(&s);
    strip_and_tokenize(&s)
}

fn remove_non_ascii_and_asterisk(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii() && *c != '*')
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Whether the text ends with sentence punctuation
pub fn sentence_end(text: &str) -> bool {
    text.ends_with(|c: char| matches!(c, '.' | '!' | '?'))
}

/// Split text into sentences at `.`, `!` or `?` followed by whitespace
pub fn sent_tokenize(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn drop_noisy_sentences(text: &str) -> String {
    let segments: Vec<String> = text
        .trim()
        .split('\n')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            if sentence_end(seg) {
                seg.to_string()
            } else {
                format!("{} .", seg)
            }
        })
        .collect();

    sent_tokenize(&segments.join(" "))
        .into_iter()
        .filter(|sentence| !noise_patterns().iter().any(|p| p.is_match(sentence)))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn remove_ref_and_mention(s: &str) -> String {
    let s = AT_PATTERN.replace_all(s, "");
    let s = REFERENCE_PATTERN.replace_all(&s, "");
    let s = URL_PATTERN.replace_all(&s, "");
    EMPTY_PARENS.replace_all(&s, "").trim().to_string()
}

/// Collapse SHAs, versions and bare numbers into placeholder words
pub fn replace_words(text: &str) -> String {
    let shas_replaced = text
        .split_whitespace()
        .map(|token| if SHA_TOKEN.is_match(token) { "sha" } else { token })
        .collect::<Vec<_>>()
        .join(" ");
    let versions_replaced = VERSION_PATTERN.replace_all(&shas_replaced, " version ");
    replace_digits(&versions_replaced)
}

/// Replace a run of digits preceded by whitespace, `-` or `.` and followed by whitespace
fn replace_digits(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in DIGIT_PATTERN.find_iter(text) {
        let followed_by_space = text[m.end()..]
            .chars()
            .next()
            .map_or(false, char::is_whitespace);
        if followed_by_space {
            out.push_str(&text[last..m.start()]);
            out.push_str(" 0 ");
            last = m.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

fn strip_and_tokenize(s: &str) -> Vec<String> {
    let mut s = s.replace('#', "");
    if s.ends_with('(') {
        s.pop();
    }
    let s = s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | ',' | '…'));
    word_tokenize(s)
}

/// Split text into word and punctuation tokens
pub fn word_tokenize(s: &str) -> Vec<String> {
    WORD_TOKEN
        .find_iter(s)
        .map(|m| m.as_str().to_string())
        .collect()
}
