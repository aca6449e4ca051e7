mod connection;
mod error;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use error::DatabaseError;
pub use migrations::{Migration, get_applied_versions, run_migrations};
pub use schema::SCHEMA_VERSION;

use std::path::Path;

use crate::error::Result;
use crate::models::{DirectoryItem, ItemPatch, NewItem};

use super::repositories::{ItemRepository, SqliteItemRepository};
use super::store::ItemStore;

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// SQLite-backed item store.
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    pub fn schema_versions(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        get_applied_versions(&conn)
    }

    fn repo(&self) -> SqliteItemRepository<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        SqliteItemRepository::new(self.pool.get_connection())
    }
}

impl ItemStore for Database {
    fn list_all(&self) -> Result<Vec<DirectoryItem>> {
        self.repo().list_all()
    }

    fn list_by_category(&self, category: &str) -> Result<Vec<DirectoryItem>> {
        self.repo().list_by_category(category)
    }

    fn get(&self, id: &str) -> Result<DirectoryItem> {
        self.repo().get(id)
    }

    fn create(&self, item: NewItem) -> Result<DirectoryItem> {
        self.repo().create(item)
    }

    fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem> {
        self.repo().update(id, patch)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.repo().remove(id)
    }

    fn count(&self) -> Result<usize> {
        self.repo().count()
    }
}

#[cfg(feature = "async")]
pub mod async_db {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use rusqlite::Connection;
    use tokio::sync::Mutex;

    use super::migrations;
    use super::schema::apply_pragmas;
    use super::DatabaseError;
    use crate::error::Result;
    use crate::models::{DirectoryItem, ItemPatch, NewItem};
    use crate::storage::repositories::{ItemRepository, SqliteItemRepository};
    use crate::storage::store::AsyncItemStore;

    /// Item store whose connection is shared behind a `tokio` mutex.
    #[derive(Clone)]
    pub struct AsyncDatabase {
        conn: Arc<Mutex<Connection>>,
    }

    impl AsyncDatabase {
        pub async fn open(path: &Path) -> Result<Self> {
            let conn = Connection::open(path).map_err(DatabaseError::Connection)?;
            Self::from_connection(conn)
        }

        pub async fn open_in_memory() -> Result<Self> {
            let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
            Self::from_connection(conn)
        }

        fn from_connection(conn: Connection) -> Result<Self> {
            apply_pragmas(&conn)?;
            migrations::run_migrations(&conn)?;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }
    }

    #[async_trait]
    impl AsyncItemStore for AsyncDatabase {
        async fn list_all(&self) -> Result<Vec<DirectoryItem>> {
            let conn = self.conn.lock().await;
            SqliteItemRepository::new(conn).list_all()
        }

        async fn get(&self, id: &str) -> Result<DirectoryItem> {
            let conn = self.conn.lock().await;
            SqliteItemRepository::new(conn).get(id)
        }

        async fn create(&self, item: NewItem) -> Result<DirectoryItem> {
            let conn = self.conn.lock().await;
            SqliteItemRepository::new(conn).create(item)
        }

        async fn update(&self, id: &str, patch: &ItemPatch) -> Result<DirectoryItem> {
            let conn = self.conn.lock().await;
            SqliteItemRepository::new(conn).update(id, patch)
        }

        async fn delete(&self, id: &str) -> Result<()> {
            let conn = self.conn.lock().await;
            SqliteItemRepository::new(conn).remove(id)
        }
    }
}
