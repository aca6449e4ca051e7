//! Pairwise similarity between two directory records.
//!
//! The title dominates the score but only an exact match earns full
//! credit. Breeder/source and subcategory contribute only when both
//! records carry them, so a missing attribute never lowers the score.

use std::collections::HashSet;

use dirscope_core::DirectoryItem;

pub const TITLE_WEIGHT: f64 = 5.0;
pub const SOURCE_WEIGHT: f64 = 2.0;
pub const SUBCATEGORY_WEIGHT: f64 = 1.0;

/// Token overlap must exceed this for a non-identical title to earn anything.
pub const TITLE_OVERLAP_THRESHOLD: f64 = 0.9;
/// Credit for a near-identical (but not exact) title.
pub const TITLE_OVERLAP_POINTS: f64 = 1.0;

/// Words of this length or shorter are ignored by the token overlap.
const MIN_TOKEN_CHARS: usize = 2;

/// Score in `[0, 1]`; always `0` across categories.
pub fn similarity(a: &DirectoryItem, b: &DirectoryItem) -> f64 {
    if a.category != b.category {
        return 0.0;
    }

    let mut points = title_points(&a.title, &b.title);
    let mut total_points = TITLE_WEIGHT;

    if let (Some(source_a), Some(source_b)) = (a.source(), b.source()) {
        total_points += SOURCE_WEIGHT;
        if source_a.to_lowercase() == source_b.to_lowercase() {
            points += SOURCE_WEIGHT;
        }
    }

    if let (Some(sub_a), Some(sub_b)) = (a.subcategory(), b.subcategory()) {
        total_points += SUBCATEGORY_WEIGHT;
        if sub_a == sub_b {
            points += SUBCATEGORY_WEIGHT;
        }
    }

    if total_points > 0.0 {
        points / total_points
    } else {
        0.0
    }
}

fn title_points(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        TITLE_WEIGHT
    } else if token_overlap(&a, &b) > TITLE_OVERLAP_THRESHOLD {
        TITLE_OVERLAP_POINTS
    } else {
        0.0
    }
}

/// `min(overlap / |A|, overlap / |B|)` over the sets of words longer than
/// two characters; `0` when either set is empty.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a = significant_words(&a);
    let words_b = significant_words(&b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let overlap = words_a.intersection(&words_b).count() as f64;
    (overlap / words_a.len() as f64).min(overlap / words_b.len() as f64)
}

fn significant_words(text: &str) -> HashSet<&str> {
    text.split_whitespace()
        .filter(|word| word.chars().count() > MIN_TOKEN_CHARS)
        .collect()
}
