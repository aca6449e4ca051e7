use dirscope_core::{DirectoryItem, ItemStore};

use crate::batch::process_duplicates;
use crate::error::{DedupError, Result};
use crate::grouper::DuplicateFinder;
use crate::merge::preview_merge;
use crate::types::{DuplicateAction, DuplicateGroup, ProcessingResults};

/// State of one interactive review, owned by the caller.
///
/// Groups are rebuilt from scratch by every [`find_duplicates`](Self::find_duplicates)
/// and are never persisted; only [`process_all`](Self::process_all) writes.
#[derive(Debug, Clone, Default)]
pub struct DedupSession {
    finder: DuplicateFinder,
    default_action: DuplicateAction,
    groups: Vec<DuplicateGroup>,
    results: Option<ProcessingResults>,
}

impl DedupSession {
    pub fn new(finder: DuplicateFinder, default_action: DuplicateAction) -> Self {
        Self {
            finder,
            default_action,
            ..Default::default()
        }
    }

    /// Snapshot the store and regroup it.
    pub fn find_duplicates<S: ItemStore + ?Sized>(&mut self, store: &S) -> Result<&[DuplicateGroup]> {
        let items = store.list_all()?;
        Ok(self.load(&items))
    }

    /// Regroup an already fetched snapshot.
    pub fn load(&mut self, items: &[DirectoryItem]) -> &[DuplicateGroup] {
        self.groups = self
            .finder
            .find(items)
            .into_iter()
            .map(|group| DuplicateGroup::from_scored(group, self.default_action))
            .collect();
        self.results = None;
        &self.groups
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    pub fn results(&self) -> Option<&ProcessingResults> {
        self.results.as_ref()
    }

    /// Returns whether `duplicate_id` is selected afterwards.
    pub fn toggle_selection(&mut self, group_index: usize, duplicate_id: &str) -> Result<bool> {
        let group = self.group_mut(group_index)?;
        if !group.contains_duplicate(duplicate_id) {
            return Err(DedupError::NotADuplicate {
                group: group_index,
                id: duplicate_id.to_string(),
            });
        }
        Ok(group.toggle(duplicate_id))
    }

    pub fn set_action(&mut self, group_index: usize, action: DuplicateAction) -> Result<()> {
        self.group_mut(group_index)?.action = action;
        Ok(())
    }

    /// The group's primary with its currently selected duplicates merged in.
    pub fn preview_merge(&self, group_index: usize) -> Result<DirectoryItem> {
        let group = self.group(group_index)?;
        Ok(preview_merge(&group.primary_record, &group.selected_records()))
    }

    pub fn process_all<S: ItemStore + ?Sized>(&mut self, store: &S) -> &ProcessingResults {
        let results = process_duplicates(&self.groups, store);
        self.results.insert(results)
    }

    fn group(&self, index: usize) -> Result<&DuplicateGroup> {
        let len = self.groups.len();
        self.groups
            .get(index)
            .ok_or(DedupError::GroupOutOfRange { index, len })
    }

    fn group_mut(&mut self, index: usize) -> Result<&mut DuplicateGroup> {
        let len = self.groups.len();
        self.groups
            .get_mut(index)
            .ok_or(DedupError::GroupOutOfRange { index, len })
    }
}
