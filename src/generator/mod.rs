//! Release note rendering
//!
//! Entries and categories are joined by identifier, bucketed per category in
//! a configurable order, and rendered as Markdown.

pub mod markdown;

pub use markdown::MarkdownGenerator;

use crate::error::{DeepReleaseError, Result};
use crate::types::{Category, Entry, EntryCategory, Group};
use std::collections::HashMap;

/// Bucket entries by category, emitting non-empty groups in `order`
///
/// Entry order inside a group follows the category list. A category whose id
/// has no entry is an alignment error.
pub fn merge(entries: &[Entry], categories: &[EntryCategory], order: &str) -> Result<Vec<Group>> {
    let by_id: HashMap<_, _> = entries.iter().map(|e| (e.id, e)).collect();

    let mut groups: HashMap<Category, Group> = HashMap::new();
    for c in categories {
        let entry = by_id.get(&c.entry_id).ok_or_else(|| {
            DeepReleaseError::Alignment(format!("category for #{} has no entry", c.entry_id))
        })?;
        groups
            .entry(c.category)
            .or_insert_with(|| Group::new(c.category))
            .entries
            .push((*entry).clone());
    }

    let mut ordered = Vec::new();
    for code in order.chars() {
        let category = Category::from_code(code).ok_or_else(|| {
            DeepReleaseError::Config(format!("unknown category code '{}' in order", code))
        })?;
        if let Some(group) = groups.remove(&category) {
            ordered.push(group);
        }
    }
    Ok(ordered)
}
