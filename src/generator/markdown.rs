//! Markdown release notes

use crate::error::Result;
use crate::generator::merge;
use crate::types::{Entry, EntryCategory, Group};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Renders grouped entries as a Markdown document
#[derive(Debug, Clone, Default)]
pub struct MarkdownGenerator;

impl MarkdownGenerator {
    pub fn new() -> Self {
        Self
    }

    /// `## <title>` per group followed by `- <body> (#<id>)` lines
    pub fn generate_content(&self, groups: &[Group]) -> String {
        let mut lines = Vec::new();
        for group in groups {
            lines.push(format!("\n## {}\n", group.category.title()));
            for entry in &group.entries {
                lines.push(format!("- {} (#{})", entry.body, entry.id));
            }
        }
        lines.join("\n") + "\n"
    }

    /// Write `<dir>/<name>.md`, creating the directory if needed
    pub fn save(&self, content: &str, dir: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.md", name));
        fs::write(&path, content)?;
        info!("Release notes written to {}", path.display());
        Ok(path)
    }

    /// Merge, render and save in one go
    pub fn generate(
        &self,
        entries: &[Entry],
        categories: &[EntryCategory],
        order: &str,
        dir: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        let groups = merge(entries, categories, order)?;
        let content = self.generate_content(&groups);
        self.save(&content, dir, name)
    }
}
