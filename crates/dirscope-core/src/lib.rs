pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{AppConfig, CoreConfig, DedupConfig};
pub use error::{DirscopeError, ExitCode, Result};
pub use models::*;

pub use storage::database::{ConnectionPool, Database, DatabaseError, open_database, open_in_memory};
pub use storage::repositories::{ItemRepository, Repository, SqliteItemRepository};
pub use storage::store::ItemStore;

#[cfg(feature = "async")]
pub use storage::database::async_db::AsyncDatabase;
#[cfg(feature = "async")]
pub use storage::store::AsyncItemStore;
