use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use dirscope_core::DirectoryItem;
use serde::{Deserialize, Serialize};

use crate::error::DedupError;

/// What to do with a group's selected duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateAction {
    /// Fold the duplicates' tags and fields into the primary.
    #[default]
    Merge,
    /// Mark each duplicate as a variant of the primary.
    Variant,
    /// Leave everything as it is.
    Keep,
}

impl fmt::Display for DuplicateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Merge => "merge",
            Self::Variant => "variant",
            Self::Keep => "keep",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DuplicateAction {
    type Err = DedupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "variant" => Ok(Self::Variant),
            "keep" => Ok(Self::Keep),
            other => Err(DedupError::UnknownAction(other.to_string())),
        }
    }
}

/// Grouper output: a primary and everything that scored above the threshold against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredGroup {
    pub primary: DirectoryItem,
    pub duplicates: Vec<DirectoryItem>,
    /// Highest similarity observed between the primary and any duplicate.
    pub similarity: f64,
}

/// A group under review. Lives only for the session that built it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub primary_record: DirectoryItem,
    pub duplicates: Vec<DirectoryItem>,
    pub selected_duplicates: BTreeSet<String>,
    pub action: DuplicateAction,
    pub similarity: f64,
}

impl DuplicateGroup {
    /// Every duplicate starts selected.
    pub fn from_scored(group: ScoredGroup, action: DuplicateAction) -> Self {
        let selected_duplicates = group.duplicates.iter().map(|d| d.id.clone()).collect();
        Self {
            primary_record: group.primary,
            duplicates: group.duplicates,
            selected_duplicates,
            action,
            similarity: group.similarity,
        }
    }

    pub fn contains_duplicate(&self, id: &str) -> bool {
        self.duplicates.iter().any(|d| d.id == id)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_duplicates.contains(id)
    }

    /// Flip selection of `id`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.selected_duplicates.remove(id) {
            false
        } else {
            self.selected_duplicates.insert(id.to_string());
            true
        }
    }

    /// Selected duplicates in `duplicates` order.
    pub fn selected_records(&self) -> Vec<&DirectoryItem> {
        self.duplicates
            .iter()
            .filter(|d| self.selected_duplicates.contains(&d.id))
            .collect()
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResults {
    pub processed: usize,
    pub merged: usize,
    pub variants: usize,
    pub kept: usize,
    pub errors: Vec<String>,
}

impl ProcessingResults {
    pub fn record(&mut self, action: DuplicateAction) {
        match action {
            DuplicateAction::Merge => self.merged += 1,
            DuplicateAction::Variant => self.variants += 1,
            DuplicateAction::Keep => self.kept += 1,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Unscored title+category grouping for manual review; primary is the oldest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewGroup {
    pub primary: DirectoryItem,
    pub duplicates: Vec<DirectoryItem>,
}

/// Outcome of deleting exact duplicates from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub identified: usize,
    pub removed: Vec<String>,
    pub errors: Vec<String>,
}
