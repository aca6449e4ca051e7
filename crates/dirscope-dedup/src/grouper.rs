use std::collections::HashSet;

use dirscope_core::DirectoryItem;

use crate::similarity::similarity;
use crate::types::ScoredGroup;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Greedy single-pass grouping of near-duplicate records.
///
/// Items are visited newest first; each unconsumed item absorbs every other
/// unconsumed item scoring strictly above the threshold against it. Groups
/// are not transitively closed: once `A` has absorbed `B`, a `C` similar
/// only to `B` stays out of `A`'s group.
#[derive(Debug, Clone)]
pub struct DuplicateFinder {
    threshold: f64,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl DuplicateFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to `[0, 1]`; a NaN or infinite value falls back to the default.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_SIMILARITY_THRESHOLD
        };
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// O(n²) in the number of items. Singletons are not reported.
    pub fn find(&self, items: &[DirectoryItem]) -> Vec<ScoredGroup> {
        let mut order: Vec<&DirectoryItem> = items.iter().collect();
        // Stable: equal timestamps keep input order.
        order.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut processed: HashSet<&str> = HashSet::new();
        let mut groups = Vec::new();

        for (i, primary) in order.iter().enumerate() {
            if processed.contains(primary.id.as_str()) {
                continue;
            }

            let mut duplicates = Vec::new();
            let mut max_similarity = 0.0f64;

            for (j, candidate) in order.iter().enumerate() {
                if i == j || processed.contains(candidate.id.as_str()) {
                    continue;
                }
                let score = similarity(primary, candidate);
                if score > self.threshold {
                    processed.insert(candidate.id.as_str());
                    duplicates.push((*candidate).clone());
                    max_similarity = max_similarity.max(score);
                }
            }

            if !duplicates.is_empty() {
                processed.insert(primary.id.as_str());
                tracing::debug!(
                    primary = %primary.id,
                    title = %primary.title,
                    duplicates = duplicates.len(),
                    similarity = max_similarity,
                    "duplicate group found"
                );
                groups.push(ScoredGroup {
                    primary: (*primary).clone(),
                    duplicates,
                    similarity: max_similarity,
                });
            }
        }

        groups
    }
}
