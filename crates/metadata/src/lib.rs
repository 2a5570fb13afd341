//! Relational metadata persistence for Armory.
//!
//! This crate persists artifact and tag rows and enforces the cascade
//! invariant between them. Two implementations of [`MetadataStore`] are
//! provided: SQLite (tests, single node) and PostgreSQL (production).

pub mod error;
pub mod models;
pub mod postgres;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ArtifactRecord, ArtifactRow, TagRow};
pub use postgres::PostgresStore;
pub use store::{MetadataStore, SqliteStore};

use armory_core::DatabaseConfig;
use std::sync::Arc;

/// Create a metadata store from configuration and run migrations.
pub async fn from_config(config: &DatabaseConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        DatabaseConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
        DatabaseConfig::Postgres {
            host,
            port,
            username,
            password,
            database,
            sslmode,
        } => {
            let store =
                PostgresStore::from_params(host, *port, username, password, database, sslmode)
                    .await?;
            Ok(Arc::new(store))
        }
    }
}
