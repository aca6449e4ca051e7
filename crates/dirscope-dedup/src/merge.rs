use std::collections::HashSet;

use dirscope_core::{AdditionalFields, DirectoryItem, ItemPatch};
use serde::Serialize;

/// Fields a merge overwrites on the primary. Title, description and
/// category always stay the primary's own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub tags: Vec<String>,
    pub additional_fields: AdditionalFields,
}

impl MergeResult {
    pub fn into_patch(self) -> ItemPatch {
        ItemPatch {
            tags: Some(self.tags),
            additional_fields: Some(self.additional_fields),
            ..Default::default()
        }
    }
}

/// Fold `selected` into `primary`.
///
/// Tags are unioned in first-seen order. Additional fields start from the
/// primary's; a duplicate's non-null value fills a missing key, while a
/// conflicting value is kept under `alt_{key}_{n}` where `n` is the
/// duplicate's 1-based position in `selected`.
pub fn merge_records(primary: &DirectoryItem, selected: &[&DirectoryItem]) -> MergeResult {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tags = Vec::new();
    for tag in primary
        .tags
        .iter()
        .chain(selected.iter().flat_map(|d| d.tags.iter()))
    {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }

    let mut additional_fields = primary.additional_fields.clone();
    for (index, duplicate) in selected.iter().enumerate() {
        for (key, value) in &duplicate.additional_fields {
            if value.is_null() {
                continue;
            }
            match additional_fields.get(key) {
                None => {
                    additional_fields.insert(key.clone(), value.clone());
                }
                Some(existing) if existing.is_null() => {
                    additional_fields.insert(key.clone(), value.clone());
                }
                Some(existing) if existing != value => {
                    additional_fields.insert(format!("alt_{key}_{}", index + 1), value.clone());
                }
                Some(_) => {}
            }
        }
    }

    MergeResult {
        tags,
        additional_fields,
    }
}

/// The primary as it would look after merging `selected`. Nothing is persisted.
pub fn preview_merge(primary: &DirectoryItem, selected: &[&DirectoryItem]) -> DirectoryItem {
    let merged = merge_records(primary, selected);
    let mut candidate = primary.clone();
    candidate.tags = merged.tags;
    candidate.additional_fields = merged.additional_fields;
    candidate
}
