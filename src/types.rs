//! Core data types for DeepRelease
//!
//! This module defines the entities that flow between the collector, the
//! summarizer, the classifier and the Markdown generator. The pull request
//! number is the identifier that ties an entry to its category.

use crate::collector::url::parse_pull_request_url;
use crate::error::Result;
use crate::preprocess::{preprocess_desc_and_commits, preprocess_title};
use serde::{Deserialize, Serialize};

/// Identifier shared by a pull request, its entry and its category
pub type EntryId = u64;

/// Release note category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// New functionality
    Features,

    /// Corrections of defects
    BugFixes,

    /// Documentation-only changes
    Documentation,

    /// Refactoring, build, CI, dependency and other non-functional changes
    NonFunctional,
}

impl Category {
    /// All categories in default rendering order
    pub const ALL: [Category; 4] = [
        Category::Features,
        Category::BugFixes,
        Category::Documentation,
        Category::NonFunctional,
    ];

    /// Parse a single-letter category code (F, B, D, N)
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'F' => Some(Category::Features),
            'B' => Some(Category::BugFixes),
            'D' => Some(Category::Documentation),
            'N' => Some(Category::NonFunctional),
            _ => None,
        }
    }

    /// Parse a classifier label: either a code letter or a category name
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        let mut chars = label.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::from_code(c.to_ascii_uppercase());
        }

        let normalized = label
            .to_lowercase()
            .replace(|c: char| c == '-' || c == '_' || c.is_whitespace(), "");
        match normalized.as_str() {
            "features" | "feature" => Some(Category::Features),
            "bugfixes" | "bugfix" => Some(Category::BugFixes),
            "documentation" | "docs" => Some(Category::Documentation),
            "nonfunctional" => Some(Category::NonFunctional),
            _ => None,
        }
    }

    /// Single-letter code
    pub fn code(&self) -> char {
        match self {
            Category::Features => 'F',
            Category::BugFixes => 'B',
            Category::Documentation => 'D',
            Category::NonFunctional => 'N',
        }
    }

    /// Section heading used in rendered release notes
    pub fn title(&self) -> &'static str {
        match self {
            Category::Features => "Features",
            Category::BugFixes => "Bug Fixes",
            Category::Documentation => "Documentation",
            Category::NonFunctional => "Non-Functional Changes",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// One generated change entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub body: String,
}

impl Entry {
    pub fn new(id: EntryId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
        }
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.body)
    }
}

/// Category assigned to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCategory {
    pub entry_id: EntryId,
    pub category: Category,
}

impl EntryCategory {
    pub fn new(entry_id: EntryId, category: Category) -> Self {
        Self { entry_id, category }
    }
}

/// Entries sharing one category, in rendering order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub category: Category,
    pub entries: Vec<Entry>,
}

impl Group {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            entries: Vec::new(),
        }
    }
}

/// Raw pull request fields as returned by the hosting API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub title: String,
    pub body_text: String,
    pub commit_messages: Vec<String>,
}

impl PullRequestInfo {
    /// Preprocessed summarizer input built straight from raw fields
    pub fn article(&self) -> String {
        preprocess_title(&self.title)
            .into_iter()
            .chain(preprocess_desc_and_commits(&self.body_text))
            .chain(preprocess_desc_and_commits(&self.commit_messages.join("\n")))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A merged pull request with preprocessed text fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub url: String,
    /// Merge commit oid on the default branch
    pub commit: String,
    pub owner: String,
    pub name: String,
    pub number: u64,

    /// Cleaned title tokens
    pub title: Vec<String>,

    /// Cleaned description tokens
    pub description: Vec<String>,

    /// Cleaned tokens of all commit messages, joined
    pub commit_messages: Vec<String>,
}

impl PullRequest {
    /// Create a pull request from its URL, without text fields
    pub fn new(url: &str, commit: &str) -> Result<Self> {
        let (owner, name, number) = parse_pull_request_url(url)?;
        Ok(Self {
            url: url.to_string(),
            commit: commit.to_string(),
            owner,
            name,
            number,
            title: Vec::new(),
            description: Vec::new(),
            commit_messages: Vec::new(),
        })
    }

    /// Fill text fields from raw API data, running the preprocessing pipeline
    pub fn set_data(&mut self, info: &PullRequestInfo) {
        self.title = preprocess_title(&info.title);
        self.description = preprocess_desc_and_commits(&info.body_text);
        self.commit_messages = preprocess_desc_and_commits(&info.commit_messages.join("\n"));
    }

    /// Identifier shared with the generated entry and category
    pub fn id(&self) -> EntryId {
        self.number
    }

    /// Title tokens joined for the classifier
    pub fn title_text(&self) -> String {
        self.title.join(" ")
    }

    /// Summarizer input: title, description and commit tokens in that order
    pub fn article(&self) -> String {
        self.title
            .iter()
            .chain(self.description.iter())
            .chain(self.commit_messages.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_codes_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_code(category.code()), Some(category));
        }
        assert_eq!(Category::from_code('X'), None);
    }

    #[test]
    fn test_category_from_label() {
        assert_eq!(Category::from_label("B"), Some(Category::BugFixes));
        assert_eq!(Category::from_label("f"), Some(Category::Features));
        assert_eq!(Category::from_label("Documentation"), Some(Category::Documentation));
        assert_eq!(Category::from_label("non-functional"), Some(Category::NonFunctional));
        assert_eq!(Category::from_label("chore"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_pull_request_from_url() {
        let pr = PullRequest::new("https://github.com/foo/bar/pull/1", "abc123").unwrap();
        assert_eq!(pr.owner, "foo");
        assert_eq!(pr.name, "bar");
        assert_eq!(pr.number, 1);
        assert_eq!(pr.id(), 1);
    }

    #[test]
    fn test_pull_request_set_data() {
        let mut pr = PullRequest::new("https://github.com/foo/bar/pull/1", "abc123").unwrap();
        pr.set_data(&PullRequestInfo {
            title: " test 测试 @test #55 ".to_string(),
            body_text: " test 测试\n @test test@test.com ### ".to_string(),
            commit_messages: vec![],
        });

        assert_eq!(pr.title, vec!["test"]);
        assert_eq!(pr.description, vec!["test", "."]);
        assert!(pr.commit_messages.is_empty());
    }

    #[test]
    fn test_info_article_matches_pull_request() {
        let info = PullRequestInfo {
            title: "Fix crash in parser".to_string(),
            body_text: "Handles empty input".to_string(),
            commit_messages: vec!["fix parser".to_string(), "add test".to_string()],
        };
        let mut pr = PullRequest::new("https://github.com/foo/bar/pull/3", "abc").unwrap();
        pr.set_data(&info);
        assert_eq!(info.article(), pr.article());
    }

    #[test]
    fn test_article_order() {
        let mut pr = PullRequest::new("https://github.com/foo/bar/pull/7", "abc").unwrap();
        pr.title = vec!["fix".into(), "crash".into()];
        pr.description = vec!["details".into(), ".".into()];
        pr.commit_messages = vec!["commit".into()];
        assert_eq!(pr.article(), "fix crash details . commit");
        assert_eq!(pr.title_text(), "fix crash");
    }
}
