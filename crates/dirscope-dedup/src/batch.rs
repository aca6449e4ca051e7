//! Applying the chosen action to every reviewed group.
//!
//! Each group is first turned into a [`GroupPlan`] (the store writes it
//! implies), then the writes are issued in order. A failing group is
//! recorded in [`ProcessingResults::errors`] and the batch moves on.

use dirscope_core::{ItemPatch, ItemStore, VARIANT_OF_KEY};
use serde_json::Value;

use crate::merge::merge_records;
use crate::types::{DuplicateAction, DuplicateGroup, ProcessingResults};

/// One pending `update(id, patch)` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub id: String,
    pub patch: ItemPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    /// Primary title, used in error messages.
    pub title: String,
    pub action: DuplicateAction,
    pub writes: Vec<PlannedWrite>,
}

/// `None` when the group has no selected duplicates and must be skipped.
pub fn plan_group(group: &DuplicateGroup) -> Option<GroupPlan> {
    let selected = group.selected_records();
    if selected.is_empty() {
        return None;
    }

    let primary = &group.primary_record;
    let writes = match group.action {
        DuplicateAction::Merge => vec![PlannedWrite {
            id: primary.id.clone(),
            patch: merge_records(primary, &selected).into_patch(),
        }],
        DuplicateAction::Variant => selected
            .iter()
            .map(|duplicate| {
                let mut fields = duplicate.additional_fields.clone();
                fields.insert(VARIANT_OF_KEY.to_string(), Value::String(primary.id.clone()));
                PlannedWrite {
                    id: duplicate.id.clone(),
                    patch: ItemPatch {
                        additional_fields: Some(fields),
                        ..Default::default()
                    },
                }
            })
            .collect(),
        DuplicateAction::Keep => Vec::new(),
    };

    Some(GroupPlan {
        title: primary.title.clone(),
        action: group.action,
        writes,
    })
}

fn failure_message(title: &str, error: &impl std::fmt::Display) -> String {
    format!("Failed to process {title}: {error}")
}

fn finish(results: &ProcessingResults) {
    tracing::info!(
        processed = results.processed,
        merged = results.merged,
        variants = results.variants,
        kept = results.kept,
        failed = results.errors.len(),
        "duplicate batch finished"
    );
}

/// Process `groups` strictly in order against `store`.
pub fn process_duplicates<S: ItemStore + ?Sized>(
    groups: &[DuplicateGroup],
    store: &S,
) -> ProcessingResults {
    let mut results = ProcessingResults::default();

    for plan in groups.iter().filter_map(plan_group) {
        results.processed += 1;

        let outcome = plan
            .writes
            .iter()
            .try_for_each(|write| store.update(&write.id, &write.patch).map(|_| ()));

        match outcome {
            Ok(()) => results.record(plan.action),
            Err(e) => {
                tracing::warn!(title = %plan.title, action = %plan.action, error = %e, "group failed");
                results.errors.push(failure_message(&plan.title, &e));
            }
        }
    }

    finish(&results);
    results
}

/// Async twin of [`process_duplicates`]; each store write is awaited before the next.
#[cfg(feature = "async")]
pub async fn process_duplicates_async<S: dirscope_core::AsyncItemStore + ?Sized>(
    groups: &[DuplicateGroup],
    store: &S,
) -> ProcessingResults {
    let mut results = ProcessingResults::default();

    for plan in groups.iter().filter_map(plan_group) {
        results.processed += 1;

        let mut failure = None;
        for write in &plan.writes {
            if let Err(e) = store.update(&write.id, &write.patch).await {
                failure = Some(e);
                break;
            }
        }

        match failure {
            None => results.record(plan.action),
            Some(e) => {
                tracing::warn!(title = %plan.title, action = %plan.action, error = %e, "group failed");
                results.errors.push(failure_message(&plan.title, &e));
            }
        }
    }

    finish(&results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredGroup;
    use dirscope_core::{
        Database, DirectoryItem, DirscopeError, ItemPatch, NewItem, Result as CoreResult,
    };
    use serde_json::json;

    /// Delegates to an in-memory database but refuses updates to one id.
    struct FlakyStore {
        inner: Database,
        fail_id: String,
    }

    impl ItemStore for FlakyStore {
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
            if id == self.fail_id {
                return Err(DirscopeError::ValidationError("store offline".into()));
            }
            self.inner.update(id, patch)
        }
        fn delete(&self, id: &str) -> CoreResult<()> {
            self.inner.delete(id)
        }
        fn count(&self) -> CoreResult<usize> {
            self.inner.count()
        }
    }

    fn create(db: &Database, title: &str, fields: serde_json::Value, tags: &[&str]) -> DirectoryItem {
        let mut new_item = NewItem::new(title, "Strains");
        if let serde_json::Value::Object(map) = fields {
            new_item.additional_fields = map;
        }
        new_item.tags = tags.iter().map(|t| t.to_string()).collect();
        db.create(new_item).unwrap()
    }

    fn group(
        primary: &DirectoryItem,
        duplicates: &[&DirectoryItem],
        action: DuplicateAction,
    ) -> DuplicateGroup {
        DuplicateGroup::from_scored(
            ScoredGroup {
                primary: primary.clone(),
                duplicates: duplicates.iter().map(|d| (*d).clone()).collect(),
                similarity: 1.0,
            },
            action,
        )
    }

    #[test]
    fn merge_updates_primary_only() {
        let db = Database::open_in_memory().unwrap();
        let primary = create(&db, "Blue Dream", json!({"color": "blue"}), &["hybrid"]);
        let duplicate = create(&db, "Blue Dream", json!({"color": "red", "thc": 21}), &["classic"]);

        let results = process_duplicates(&[group(&primary, &[&duplicate], DuplicateAction::Merge)], &db);

        assert_eq!(results.processed, 1);
        assert_eq!(results.merged, 1);
        assert!(results.errors.is_empty());

        let stored = db.get(&primary.id).unwrap();
        assert_eq!(stored.tags, vec!["hybrid", "classic"]);
        assert_eq!(stored.additional_fields["color"], json!("blue"));
        assert_eq!(stored.additional_fields["alt_color_1"], json!("red"));
        assert_eq!(stored.additional_fields["thc"], json!(21));
        assert_eq!(db.get(&duplicate.id).unwrap(), duplicate);
    }

    #[test]
    fn merge_uses_only_selected_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let primary = create(&db, "Blue Dream", json!({}), &[]);
        let chosen = create(&db, "Blue Dream", json!({"aroma": "berry"}), &[]);
        let skipped = create(&db, "Blue Dream", json!({"flavor": "pine"}), &[]);

        let mut g = group(&primary, &[&skipped, &chosen], DuplicateAction::Merge);
        g.toggle(&skipped.id);
        process_duplicates(&[g], &db);

        let stored = db.get(&primary.id).unwrap();
        assert_eq!(stored.additional_fields.get("aroma"), Some(&json!("berry")));
        assert_eq!(stored.additional_fields.get("flavor"), None);
    }

    #[test]
    fn variant_marks_each_selected_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let primary = create(&db, "Blue Dream", json!({}), &[]);
        let first = create(&db, "Blue Dream", json!({"breeder": "DJ Short"}), &[]);
        let second = create(&db, "Blue Dream", json!({}), &[]);

        let results =
            process_duplicates(&[group(&primary, &[&first, &second], DuplicateAction::Variant)], &db);

        assert_eq!(results.variants, 1);
        let first_stored = db.get(&first.id).unwrap();
        assert_eq!(first_stored.additional_fields[VARIANT_OF_KEY], json!(primary.id));
        assert_eq!(first_stored.additional_fields["breeder"], json!("DJ Short"));
        assert_eq!(
            db.get(&second.id).unwrap().additional_fields[VARIANT_OF_KEY],
            json!(primary.id)
        );
        assert_eq!(db.get(&primary.id).unwrap(), primary);
    }

    #[test]
    fn keep_counts_without_writing() {
        let plan = plan_group(&group(
            &DirectoryItem::new("Blue Dream", "Strains"),
            &[&DirectoryItem::new("Blue Dream", "Strains")],
            DuplicateAction::Keep,
        ))
        .unwrap();
        assert!(plan.writes.is_empty());

        let db = Database::open_in_memory().unwrap();
        let primary = create(&db, "Blue Dream", json!({}), &[]);
        let duplicate = create(&db, "Blue Dream", json!({}), &[]);
        let results = process_duplicates(&[group(&primary, &[&duplicate], DuplicateAction::Keep)], &db);
        assert_eq!(results.kept, 1);
        assert_eq!(results.processed, 1);
        assert_eq!(db.get(&primary.id).unwrap(), primary);
    }

    #[test]
    fn groups_without_selection_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let primary = create(&db, "Blue Dream", json!({}), &[]);
        let duplicate = create(&db, "Blue Dream", json!({}), &[]);
        let mut g = group(&primary, &[&duplicate], DuplicateAction::Merge);
        g.toggle(&duplicate.id);

        assert!(plan_group(&g).is_none());
        let results = process_duplicates(&[g], &db);
        assert_eq!(results, ProcessingResults::default());
    }

    #[test]
    fn failing_group_is_isolated() {
        let db = Database::open_in_memory().unwrap();
        let p1 = create(&db, "Blue Dream", json!({}), &[]);
        let d1 = create(&db, "Blue Dream", json!({}), &[]);
        let p2 = create(&db, "Sour Diesel", json!({}), &[]);
        let d2 = create(&db, "Sour Diesel", json!({}), &[]);
        let p3 = create(&db, "OG Kush", json!({}), &[]);
        let d3 = create(&db, "OG Kush", json!({}), &[]);
        let store = FlakyStore {
            inner: db,
            fail_id: p2.id.clone(),
        };

        let groups = vec![
            group(&p1, &[&d1], DuplicateAction::Merge),
            group(&p2, &[&d2], DuplicateAction::Merge),
            group(&p3, &[&d3], DuplicateAction::Variant),
        ];
        let results = process_duplicates(&groups, &store);

        assert_eq!(results.processed, 3);
        assert_eq!(results.merged, 1);
        assert_eq!(results.variants, 1);
        assert_eq!(
            results.errors,
            vec!["Failed to process Sour Diesel: Validation error: store offline".to_string()]
        );
        assert_eq!(
            store.get(&d3.id).unwrap().additional_fields[VARIANT_OF_KEY],
            json!(p3.id)
        );
    }

    #[test]
    fn missing_record_becomes_error_message() {
        let db = Database::open_in_memory().unwrap();
        let ghost = DirectoryItem::new("Ghost Train Haze", "Strains");
        let duplicate = create(&db, "Ghost Train Haze", json!({}), &[]);

        let results = process_duplicates(&[group(&ghost, &[&duplicate], DuplicateAction::Merge)], &db);

        assert_eq!(results.processed, 1);
        assert_eq!(results.merged, 0);
        assert_eq!(
            results.errors,
            vec![format!("Failed to process Ghost Train Haze: Item not found: {}", ghost.id)]
        );
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_executor_matches_sync_counters() {
        use dirscope_core::{AsyncDatabase, AsyncItemStore};

        let db = AsyncDatabase::open_in_memory().await.unwrap();
        let primary = AsyncItemStore::create(&db, NewItem::new("Blue Dream", "Strains")).await.unwrap();
        let duplicate = AsyncItemStore::create(&db, NewItem::new("Blue Dream", "Strains")).await.unwrap();
        let ghost = DirectoryItem::new("Ghost Train Haze", "Strains");

        let groups = vec![
            group(&primary, &[&duplicate], DuplicateAction::Variant),
            group(&ghost, &[&duplicate], DuplicateAction::Merge),
            group(&primary, &[&duplicate], DuplicateAction::Keep),
        ];
        let results = process_duplicates_async(&groups, &db).await;

        assert_eq!(results.processed, 3);
        assert_eq!(results.variants, 1);
        assert_eq!(results.kept, 1);
        assert_eq!(results.errors.len(), 1);
        let stored = AsyncItemStore::get(&db, &duplicate.id).await.unwrap();
        assert_eq!(stored.additional_fields[VARIANT_OF_KEY], json!(primary.id));
    }
}
