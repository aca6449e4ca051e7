use crate::error::Result;
use crate::models::{DirectoryItem, ItemPatch, NewItem};

/// The persistent item store as seen by deduplication and its callers.
pub trait ItemStore {
    fn list_all(&self) -> Result<Vec<DirectoryItem>>;
    fn list_by_category(&self, category: &str) -> Result<Vec<DirectoryItem>>;
    fn get(&self, id: &str) -> Result<DirectoryItem>;
    fn create(&self, item: NewItem) -> Result<DirectoryItem>;
    fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem>;
    fn delete(&self, id: &str) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

impl<S: ItemStore + ?Sized> ItemStore for &S {
    fn list_all(&self) -> Result<Vec<DirectoryItem>> {
        (**self).list_all()
    }

    fn list_by_category(&self, category: &str) -> Result<Vec<DirectoryItem>> {
        (**self).list_by_category(category)
    }

    fn get(&self, id: &str) -> Result<DirectoryItem> {
        (**self).get(id)
    }

    fn create(&self, item: NewItem) -> Result<DirectoryItem> {
        (**self).create(item)
    }

    fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem> {
        (**self).update(id, patch)
    }

    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }

    fn count(&self) -> Result<usize> {
        (**self).count()
    }
}

#[cfg(feature = "async")]
#[async_trait::async_trait]
pub trait AsyncItemStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<DirectoryItem>>;
    async fn get(&self, id: &str) -> Result<DirectoryItem>;
    async fn create(&self, item: NewItem) -> Result<DirectoryItem>;
    async fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem>;
    async fn delete(&self, id: &str) -> Result<()>;
}
