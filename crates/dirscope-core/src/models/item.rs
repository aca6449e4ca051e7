use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{DirscopeError, Result};

/// Open key/value bag for domain-specific attributes (`breeder`, `source`, ...).
/// Insertion order is preserved.
pub type AdditionalFields = serde_json::Map<String, Value>;

/// Keys consulted, in order, when looking for an item's breeder/source.
pub const SOURCE_KEYS: [&str; 4] = ["breeder", "source", "breedBy", "producedBy"];

/// Key written onto a duplicate when it is marked as a variant of a primary.
pub const VARIANT_OF_KEY: &str = "isVariantOf";

// ─── DirectoryItem ─────────────────────────────────────────

/// A single directory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryItem {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub additional_fields: AdditionalFields,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DirectoryItem {
    /// Create an item with a fresh id and the minimal required fields.
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            description: String::new(),
            category: category.into(),
            subcategory: None,
            tags: Vec::new(),
            additional_fields: AdditionalFields::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Materialize a create payload into a stored item.
    pub fn from_new(new_item: NewItem, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new_item.title,
            description: new_item.description,
            category: new_item.category,
            subcategory: new_item.subcategory.filter(|s| !s.trim().is_empty()),
            tags: new_item.tags,
            additional_fields: new_item.additional_fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Breeder/source attribute, see [`source_value`].
    pub fn source(&self) -> Option<String> {
        source_value(&self.additional_fields)
    }

    /// Non-empty subcategory, if any.
    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref().filter(|s| !s.is_empty())
    }
}

/// First non-null value among [`SOURCE_KEYS`], rendered as text.
pub fn source_value(fields: &AdditionalFields) -> Option<String> {
    SOURCE_KEYS
        .iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
        .map(value_to_text)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─── NewItem ───────────────────────────────────────────────

/// Create payload; the store assigns `id` and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub category: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub additional_fields: AdditionalFields,
}

impl NewItem {
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        require_non_empty("category", &self.category)
    }
}

// ─── ItemPatch ─────────────────────────────────────────────

/// Partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// `Some(None)` clears the subcategory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_fields: Option<AdditionalFields>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.tags.is_none()
            && self.additional_fields.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        if let Some(category) = &self.category {
            require_non_empty("category", category)?;
        }
        Ok(())
    }

    /// Apply onto `item`, bumping `updated_at` when anything was set.
    pub fn apply_to(&self, item: &mut DirectoryItem, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
        if let Some(subcategory) = &self.subcategory {
            item.subcategory = subcategory.clone().filter(|s| !s.trim().is_empty());
        }
        if let Some(tags) = &self.tags {
            item.tags = tags.clone();
        }
        if let Some(fields) = &self.additional_fields {
            item.additional_fields = fields.clone();
        }
        item.updated_at = now;
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DirscopeError::ValidationError(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}
