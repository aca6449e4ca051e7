use std::ops::Deref;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::error::{DirscopeError, Result};
use crate::models::{AdditionalFields, DirectoryItem, ItemPatch, NewItem};

use super::Repository;

const ITEM_COLUMNS: &str = "id, title, description, category, subcategory, tags,
                            additional_fields, created_at, updated_at";

pub trait ItemRepository: Repository<Entity = DirectoryItem, Id = str> {
    fn list_all(&self) -> Result<Vec<DirectoryItem>>;
    fn list_by_category(&self, category: &str) -> Result<Vec<DirectoryItem>>;
    fn count(&self) -> Result<usize>;
}

/// Item queries over any locked connection handle (std or tokio guard).
pub struct SqliteItemRepository<C> {
    conn: C,
}

impl<C: Deref<Target = Connection>> SqliteItemRepository<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: &str) -> Result<DirectoryItem> {
        self.find_by_id(id)?
            .ok_or_else(|| DirscopeError::ItemNotFound(id.to_string()))
    }

    /// Validate and insert a new item under a fresh UUIDv7 id.
    pub fn create(&self, new_item: NewItem) -> Result<DirectoryItem> {
        new_item.validate()?;
        let item = DirectoryItem::from_new(new_item, Uuid::now_v7().to_string(), Utc::now());
        self.save(&item)?;
        tracing::debug!(id = %item.id, title = %item.title, "item created");
        Ok(item)
    }

    /// Apply `patch` to the stored item; last write wins.
    pub fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem> {
        patch.validate()?;
        let mut item = self.get(id)?;
        if patch.is_empty() {
            return Ok(item);
        }
        patch.apply_to(&mut item, Utc::now());
        self.save(&item)?;
        tracing::debug!(id = %item.id, "item updated");
        Ok(item)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        if !self.delete(id)? {
            return Err(DirscopeError::ItemNotFound(id.to_string()));
        }
        tracing::debug!(id, "item deleted");
        Ok(())
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<DirectoryItem> {
        let tags_str: String = row.get(5)?;
        let fields_str: String = row.get(6)?;
        let created_str: String = row.get(7)?;
        let updated_str: String = row.get(8)?;

        let tags: Vec<String> = serde_json::from_str(&tags_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
        let additional_fields: AdditionalFields = serde_json::from_str(&fields_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        Ok(DirectoryItem {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            tags,
            additional_fields,
            created_at: parse_timestamp(7, &created_str)?,
            updated_at: parse_timestamp(8, &updated_str)?,
        })
    }

    fn query_items(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<DirectoryItem>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Fixed-width UTC form so lexical order in SQLite matches time order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(col: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(e)))
}

impl<C: Deref<Target = Connection>> Repository for SqliteItemRepository<C> {
    type Entity = DirectoryItem;
    type Id = str;

    fn find_by_id(&self, id: &str) -> Result<Option<DirectoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1");
        let mut items = self.query_items(&sql, params![id])?;
        Ok(items.pop())
    }

    fn save(&self, item: &DirectoryItem) -> Result<()> {
        let tags_json = serde_json::to_string(&item.tags)?;
        let fields_json = serde_json::to_string(&item.additional_fields)?;

        self.conn.execute(
            "INSERT OR REPLACE INTO items
                (id, title, description, category, subcategory, tags,
                 additional_fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                item.title,
                item.description,
                item.category,
                item.subcategory,
                tags_json,
                fields_json,
                format_timestamp(&item.created_at),
                format_timestamp(&item.updated_at),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

impl<C: Deref<Target = Connection>> ItemRepository for SqliteItemRepository<C> {
    fn list_all(&self) -> Result<Vec<DirectoryItem>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at ASC, id ASC");
        self.query_items(&sql, params![])
    }

    fn list_by_category(&self, category: &str) -> Result<Vec<DirectoryItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE category = ?1
             ORDER BY created_at ASC, id ASC"
        );
        self.query_items(&sql, params![category])
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
