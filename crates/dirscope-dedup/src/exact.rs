//! Non-fuzzy pass: records matching on a fixed composite key.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use dirscope_core::{DirectoryItem, ItemStore};

use crate::error::Result;
use crate::types::{RemovalReport, ReviewGroup};

/// `title|category|subcategory|source`, lower-cased.
pub fn exact_key(item: &DirectoryItem) -> String {
    format!(
        "{}|{}|{}|{}",
        item.title.to_lowercase(),
        item.category.to_lowercase(),
        item.subcategory.as_deref().unwrap_or("").to_lowercase(),
        item.source().unwrap_or_default().to_lowercase(),
    )
}

/// Ids safe to delete outright. For each key the oldest record is kept;
/// on equal timestamps the first one seen wins.
pub fn identify_exact_duplicates(items: &[DirectoryItem]) -> Vec<String> {
    let mut kept: HashMap<String, &DirectoryItem> = HashMap::new();
    let mut discard = Vec::new();

    for item in items {
        match kept.entry(exact_key(item)) {
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
            Entry::Occupied(mut slot) => {
                if item.created_at < slot.get().created_at {
                    discard.push(slot.get().id.clone());
                    slot.insert(item);
                } else {
                    discard.push(item.id.clone());
                }
            }
        }
    }

    discard
}

/// Title+category buckets (case-insensitive) for manual review, in
/// first-seen order. Each bucket is sorted oldest first and the oldest
/// becomes the primary. Buckets of one are dropped.
pub fn group_duplicates_for_review(items: &[DirectoryItem]) -> Vec<ReviewGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Vec<&DirectoryItem>> = Vec::new();

    for item in items {
        let key = format!("{}|{}", item.title.to_lowercase(), item.category.to_lowercase());
        let slot = *index.entry(key).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(item);
    }

    buckets
        .into_iter()
        .filter(|bucket| bucket.len() > 1)
        .map(|mut bucket| {
            bucket.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            let primary = bucket[0].clone();
            let duplicates = bucket[1..].iter().map(|item| (*item).clone()).collect();
            ReviewGroup {
                primary,
                duplicates,
            }
        })
        .collect()
}

/// Identify exact duplicates in `store` and delete them one by one.
/// A failed delete is recorded and the rest still run.
pub fn remove_exact_duplicates<S: ItemStore + ?Sized>(store: &S) -> Result<RemovalReport> {
    let items = store.list_all()?;
    let ids = identify_exact_duplicates(&items);

    let mut report = RemovalReport {
        identified: ids.len(),
        ..Default::default()
    };

    for id in ids {
        match store.delete(&id) {
            Ok(()) => report.removed.push(id),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "failed to delete exact duplicate");
                report.errors.push(format!("Failed to delete {id}: {e}"));
            }
        }
    }

    tracing::info!(
        identified = report.identified,
        removed = report.removed.len(),
        failed = report.errors.len(),
        "exact duplicate cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use dirscope_core::{Database, DirscopeError, ItemPatch, NewItem, Result as CoreResult};
    use serde_json::json;

    /// Delegates to an in-memory database but refuses to delete `read_only` ids.
    struct ReadOnlyIds {
        inner: Database,
        read_only: Vec<String>,
    }

    impl ItemStore for ReadOnlyIds {
        fn list_all(&self) -> CoreResult<Vec<DirectoryItem>> {
            self.inner.list_all()
        }
        fn list_by_category(&self, category: &str) -> CoreResult<Vec<DirectoryItem>> {
            self.inner.list_by_category(category)
        }
        fn get(&self, id: &str) -> CoreResult<DirectoryItem> {
            self.inner.get(id)
        }
        fn create(&self, item: NewItem) -> CoreResult<DirectoryItem> {
            self.inner.create(item)
        }
        fn update(&self, id: &str, patch: &ItemPatch) -> CoreResult<DirectoryItem> {
            self.inner.update(id, patch)
        }
        fn delete(&self, id: &str) -> CoreResult<()> {
            if self.read_only.iter().any(|locked| locked == id) {
                return Err(DirscopeError::ValidationError("read-only".into()));
            }
            self.inner.delete(id)
        }
        fn count(&self) -> CoreResult<usize> {
            self.inner.count()
        }
    }

    fn build_item(id: &str, title: &str, created_at: &str) -> DirectoryItem {
        let mut item = DirectoryItem::new(title, "Strains");
        item.id = id.to_string();
        item.created_at = created_at.parse::<DateTime<Utc>>().unwrap();
        item
    }

    #[test]
    fn newer_exact_duplicate_is_discarded() {
        let older = build_item("old", "Blue Dream", "2023-01-01T00:00:00Z");
        let newer = build_item("new", "Blue Dream", "2023-02-01T00:00:00Z");

        assert_eq!(identify_exact_duplicates(&[older.clone(), newer.clone()]), vec!["new"]);
        assert_eq!(identify_exact_duplicates(&[newer, older]), vec!["new"]);
    }

    #[test]
    fn oldest_of_many_survives() {
        let items = vec![
            build_item("b", "Blue Dream", "2023-02-01T00:00:00Z"),
            build_item("c", "BLUE DREAM", "2023-03-01T00:00:00Z"),
            build_item("a", "blue dream", "2023-01-01T00:00:00Z"),
        ];
        let mut discarded = identify_exact_duplicates(&items);
        discarded.sort();
        assert_eq!(discarded, vec!["b", "c"]);
    }

    #[test]
    fn equal_timestamps_keep_first_seen() {
        let items = vec![
            build_item("first", "Blue Dream", "2023-01-01T00:00:00Z"),
            build_item("second", "Blue Dream", "2023-01-01T00:00:00Z"),
        ];
        assert_eq!(identify_exact_duplicates(&items), vec!["second"]);
    }

    #[test]
    fn key_includes_subcategory_and_source() {
        let plain = build_item("1", "Blue Dream", "2023-01-01T00:00:00Z");
        let mut hybrid = build_item("2", "Blue Dream", "2023-02-01T00:00:00Z");
        hybrid.subcategory = Some("Hybrid".into());
        let mut bred = build_item("3", "Blue Dream", "2023-03-01T00:00:00Z");
        bred.additional_fields.insert("breeder".into(), json!("DJ Short"));
        let mut bred_again = build_item("4", "Blue Dream", "2023-04-01T00:00:00Z");
        bred_again.additional_fields.insert("source".into(), json!("dj short"));

        assert_eq!(
            identify_exact_duplicates(&[plain, hybrid, bred, bred_again]),
            vec!["4"]
        );
    }

    #[test]
    fn review_groups_ignore_subcategory_and_put_oldest_first() {
        let mut newer = build_item("2", "Blue Dream", "2023-02-01T00:00:00Z");
        newer.subcategory = Some("Hybrid".into());
        let items = vec![
            build_item("3", "blue dream", "2023-03-01T00:00:00Z"),
            newer,
            build_item("x", "Sour Diesel", "2023-01-15T00:00:00Z"),
            build_item("1", "Blue Dream", "2023-01-01T00:00:00Z"),
        ];

        let groups = group_duplicates_for_review(&items);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].primary.id, "1");
        let ids: Vec<&str> = groups[0].duplicates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn remove_exact_duplicates_deletes_from_store() {
        let db = Database::open_in_memory().unwrap();
        let kept = db.create(NewItem::new("Blue Dream", "Strains")).unwrap();
        let copy = db.create(NewItem::new("blue dream", "Strains")).unwrap();
        db.create(NewItem::new("Sour Diesel", "Strains")).unwrap();

        let report = remove_exact_duplicates(&db).unwrap();

        assert_eq!(report.identified, 1);
        assert!(report.errors.is_empty());
        assert_eq!(db.count().unwrap(), 2);
        assert!(db.get(&kept.id).is_ok() ^ db.get(&copy.id).is_ok());
    }

    #[test]
    fn failed_delete_is_reported_not_raised() {
        let db = Database::open_in_memory().unwrap();
        db.create(NewItem::new("Blue Dream", "Strains")).unwrap();
        db.create(NewItem::new("Blue Dream", "Strains")).unwrap();
        let doomed = identify_exact_duplicates(&db.list_all().unwrap());
        let store = ReadOnlyIds {
            inner: db,
            read_only: doomed.clone(),
        };

        let report = remove_exact_duplicates(&store).unwrap();

        assert_eq!(report.identified, 1);
        assert!(report.removed.is_empty());
        assert_eq!(
            report.errors,
            vec![format!("Failed to delete {}: Validation error: read-only", doomed[0])]
        );
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn later_deletes_run_after_a_failure() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..3 {
            db.create(NewItem::new("Blue Dream", "Strains")).unwrap();
        }
        let doomed = identify_exact_duplicates(&db.list_all().unwrap());
        assert_eq!(doomed.len(), 2);
        let store = ReadOnlyIds {
            inner: db,
            read_only: vec![doomed[0].clone()],
        };

        let report = remove_exact_duplicates(&store).unwrap();

        assert_eq!(report.identified, 2);
        assert_eq!(report.removed, vec![doomed[1].clone()]);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with(&format!("Failed to delete {}:", doomed[0])));
        assert!(store.get(&doomed[1]).is_err());
        assert_eq!(store.count().unwrap(), 2);
    }
}
