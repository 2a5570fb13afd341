//! Metadata store trait and SQLite implementation.

use crate::error::{translate, MetadataError, MetadataResult};
use crate::models::{ArtifactRecord, ArtifactRow, TagRow};
use armory_core::{ArtifactQuery, QualifiedName, VersionHash};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Relational persistence for artifact and tag rows.
///
/// Every mutation runs in a single transaction. Implementations must keep
/// the cascade invariant: deleting an artifact removes every tag that points
/// at it.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create or upgrade the schema.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Fetch an artifact row with its tag set preloaded.
    async fn get_artifact_by_hash(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<ArtifactRecord>;

    /// Resolve the tag row for `(name, tag)`, then fetch the artifact it
    /// points at.
    async fn get_artifact_by_tag(
        &self,
        name: &QualifiedName,
        tag: &str,
    ) -> MetadataResult<ArtifactRecord>;

    /// Return every artifact matching the supplied name components. An empty
    /// result is a success, not an error.
    async fn query_artifacts(&self, query: &ArtifactQuery) -> MetadataResult<Vec<ArtifactRecord>>;

    /// Insert an artifact row and its initial tags atomically.
    ///
    /// Re-inserting an identical artifact is a no-op for the row itself;
    /// the supplied tags are still applied, moving any that currently point
    /// at a different hash.
    async fn create_artifact(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
        tags: &[String],
    ) -> MetadataResult<()>;

    /// Delete an artifact row; its tags are removed by the cascade.
    async fn delete_artifact(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()>;

    /// Point `(name, tag)` at `hash`, replacing any existing mapping for the
    /// same tag. Fails with NotFound when the artifact does not exist.
    async fn add_tag(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
        tag: &str,
    ) -> MetadataResult<()>;

    /// Remove the tag row for `(name, tag)`; NotFound when absent.
    async fn remove_tag(&self, name: &QualifiedName, tag: &str) -> MetadataResult<()>;

    /// Increment the pull counter by one. Best-effort contract: callers are
    /// expected to log and swallow failures.
    async fn increment_pulls(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()>;
}

/// Reject empty tag names before they reach the database.
pub(crate) fn require_tag(tag: &str) -> MetadataResult<()> {
    if tag.is_empty() {
        return Err(MetadataError::BadInput("tag cannot be empty".to_string()));
    }
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    source TEXT NOT NULL,
    author TEXT NOT NULL,
    name TEXT NOT NULL,
    version_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    pulls_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (source, author, name, version_hash)
);

CREATE TABLE IF NOT EXISTS tags (
    source TEXT NOT NULL,
    author TEXT NOT NULL,
    name TEXT NOT NULL,
    tag_name TEXT NOT NULL,
    version_hash TEXT NOT NULL,
    PRIMARY KEY (source, author, name, tag_name),
    FOREIGN KEY (source, author, name, version_hash)
        REFERENCES artifacts (source, author, name, version_hash)
        ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tags_artifact
    ON tags (source, author, name, version_hash);
"#;

/// SQLite-based metadata store.
///
/// Suitable for tests and single-node deployments; multi-node deployments
/// should use [`PostgresStore`](crate::postgres::PostgresStore).
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store backed by a database file.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::BadInput(format!("cannot create {parent:?}: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        Self::connect(opts).await
    }

    /// Create an in-memory store (testing).
    pub async fn in_memory() -> MetadataResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        Self::connect(opts).await
    }

    async fn connect(opts: SqliteConnectOptions) -> MetadataResult<Self> {
        // SQLite permits limited write concurrency; a single connection avoids
        // persistent "database is locked" failures under server concurrency.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn load_tags(
        &self,
        name: &QualifiedName,
        version_hash: &str,
    ) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT tag_name FROM tags WHERE source = ? AND author = ? AND name = ? AND version_hash = ? ORDER BY tag_name",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(version_hash)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_artifact_by_hash(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<ArtifactRecord> {
        let hex = hash.to_hex();
        let artifact = sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM artifacts WHERE source = ? AND author = ? AND name = ? AND version_hash = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(&hex)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::NotFound(format!("artifact {name} {hex}")))?;

        let tags = self.load_tags(name, &hex).await?;
        Ok(ArtifactRecord { artifact, tags })
    }

    async fn get_artifact_by_tag(
        &self,
        name: &QualifiedName,
        tag: &str,
    ) -> MetadataResult<ArtifactRecord> {
        require_tag(tag)?;

        let tag_row = sqlx::query_as::<_, TagRow>(
            "SELECT * FROM tags WHERE source = ? AND author = ? AND name = ? AND tag_name = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| MetadataError::NotFound(format!("tag {name}:{tag}")))?;

        let hash = VersionHash::from_hex(&tag_row.version_hash)
            .map_err(|e| MetadataError::BadInput(e.to_string()))?;
        self.get_artifact_by_hash(name, &hash).await
    }

    async fn query_artifacts(&self, query: &ArtifactQuery) -> MetadataResult<Vec<ArtifactRecord>> {
        let mut sql = String::from("SELECT * FROM artifacts");
        let mut clauses = Vec::new();
        if query.source.is_some() {
            clauses.push("source = ?");
        }
        if query.author.is_some() {
            clauses.push("author = ?");
        }
        if query.name.is_some() {
            clauses.push("name = ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY source, author, name, created_at");

        let mut q = sqlx::query_as::<_, ArtifactRow>(&sql);
        if let Some(source) = &query.source {
            q = q.bind(source);
        }
        if let Some(author) = &query.author {
            q = q.bind(author);
        }
        if let Some(name) = &query.name {
            q = q.bind(name);
        }

        let artifacts = q.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let name = QualifiedName::new(&artifact.source, &artifact.author, &artifact.name)
                .map_err(|e| MetadataError::BadInput(e.to_string()))?;
            let tags = self.load_tags(&name, &artifact.version_hash).await?;
            records.push(ArtifactRecord { artifact, tags });
        }
        Ok(records)
    }

    async fn create_artifact(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
        tags: &[String],
    ) -> MetadataResult<()> {
        for tag in tags {
            require_tag(tag)?;
        }

        let hex = hash.to_hex();
        let now = OffsetDateTime::now_utc();
        let mut tx = self.pool.begin().await?;

        // Re-uploading identical content collapses to a no-op on the row;
        // the tag upserts below still apply.
        sqlx::query(
            r#"
            INSERT INTO artifacts (source, author, name, version_hash, created_at, pulls_count)
            VALUES (?, ?, ?, ?, ?, 0)
            ON CONFLICT (source, author, name, version_hash) DO NOTHING
            "#,
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(&hex)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate(e, "create artifact"))?;

        for tag in tags {
            sqlx::query(
                r#"
                INSERT INTO tags (source, author, name, tag_name, version_hash)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (source, author, name, tag_name)
                    DO UPDATE SET version_hash = excluded.version_hash
                "#,
            )
            .bind(name.source())
            .bind(name.author())
            .bind(name.name())
            .bind(tag)
            .bind(&hex)
            .execute(&mut *tx)
            .await
            .map_err(|e| translate(e, "create initial tag"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_artifact(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()> {
        let hex = hash.to_hex();
        let result = sqlx::query(
            "DELETE FROM artifacts WHERE source = ? AND author = ? AND name = ? AND version_hash = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(&hex)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("artifact {name} {hex}")));
        }
        Ok(())
    }

    async fn add_tag(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
        tag: &str,
    ) -> MetadataResult<()> {
        require_tag(tag)?;

        let hex = hash.to_hex();
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM artifacts WHERE source = ? AND author = ? AND name = ? AND version_hash = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(&hex)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(MetadataError::NotFound(format!("artifact {name} {hex}")));
        }

        sqlx::query(
            r#"
            INSERT INTO tags (source, author, name, tag_name, version_hash)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (source, author, name, tag_name)
                DO UPDATE SET version_hash = excluded.version_hash
            "#,
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(tag)
        .bind(&hex)
        .execute(&mut *tx)
        .await
        .map_err(|e| translate(e, "add tag"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_tag(&self, name: &QualifiedName, tag: &str) -> MetadataResult<()> {
        require_tag(tag)?;

        let result = sqlx::query(
            "DELETE FROM tags WHERE source = ? AND author = ? AND name = ? AND tag_name = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(tag)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("tag {name}:{tag}")));
        }
        Ok(())
    }

    async fn increment_pulls(
        &self,
        name: &QualifiedName,
        hash: &VersionHash,
    ) -> MetadataResult<()> {
        let hex = hash.to_hex();
        let result = sqlx::query(
            "UPDATE artifacts SET pulls_count = pulls_count + 1 WHERE source = ? AND author = ? AND name = ? AND version_hash = ?",
        )
        .bind(name.source())
        .bind(name.author())
        .bind(name.name())
        .bind(&hex)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("artifact {name} {hex}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_name() -> QualifiedName {
        QualifiedName::new("github", "alice", "app").unwrap()
    }

    fn hash_of(data: &[u8]) -> VersionHash {
        VersionHash::compute(data)
    }

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.expect("in-memory store")
    }

    #[tokio::test]
    async fn test_create_and_get_with_tags() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"v1");

        store
            .create_artifact(&name, &hash, &["v1.0.0".to_string(), "latest".to_string()])
            .await
            .unwrap();

        let record = store.get_artifact_by_hash(&name, &hash).await.unwrap();
        assert_eq!(record.artifact.version_hash, hash.to_hex());
        assert_eq!(record.artifact.pulls_count, 0);
        assert_eq!(record.tags, vec!["latest".to_string(), "v1.0.0".to_string()]);

        let by_tag = store.get_artifact_by_tag(&name, "latest").await.unwrap();
        assert_eq!(by_tag.artifact.version_hash, hash.to_hex());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = store().await;
        let name = test_name();

        assert!(matches!(
            store.get_artifact_by_hash(&name, &hash_of(b"nope")).await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            store.get_artifact_by_tag(&name, "missing").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"content");

        store
            .create_artifact(&name, &hash, &["v1".to_string()])
            .await
            .unwrap();
        store
            .create_artifact(&name, &hash, &["v1".to_string(), "stable".to_string()])
            .await
            .unwrap();

        let all = store.query_artifacts(&ArtifactQuery::any()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].tags,
            vec!["stable".to_string(), "v1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tag_moves_between_hashes() {
        let store = store().await;
        let name = test_name();
        let hash_a = hash_of(b"version a");
        let hash_b = hash_of(b"version b");

        store.create_artifact(&name, &hash_a, &[]).await.unwrap();
        store.create_artifact(&name, &hash_b, &[]).await.unwrap();

        store.add_tag(&name, &hash_a, "latest").await.unwrap();
        let record = store.get_artifact_by_tag(&name, "latest").await.unwrap();
        assert_eq!(record.artifact.version_hash, hash_a.to_hex());

        store.add_tag(&name, &hash_b, "latest").await.unwrap();
        let record = store.get_artifact_by_tag(&name, "latest").await.unwrap();
        assert_eq!(record.artifact.version_hash, hash_b.to_hex());

        // Exactly one tag row for (name, latest); the old artifact no longer
        // carries the tag.
        let a = store.get_artifact_by_hash(&name, &hash_a).await.unwrap();
        assert!(a.tags.is_empty());
        let b = store.get_artifact_by_hash(&name, &hash_b).await.unwrap();
        assert_eq!(b.tags, vec!["latest".to_string()]);
    }

    #[tokio::test]
    async fn test_readd_same_tag_is_noop() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"content");

        store.create_artifact(&name, &hash, &[]).await.unwrap();
        store.add_tag(&name, &hash, "stable").await.unwrap();
        store.add_tag(&name, &hash, "stable").await.unwrap();

        let record = store.get_artifact_by_hash(&name, &hash).await.unwrap();
        assert_eq!(record.tags, vec!["stable".to_string()]);
    }

    #[tokio::test]
    async fn test_add_tag_requires_artifact() {
        let store = store().await;
        let name = test_name();

        assert!(matches!(
            store.add_tag(&name, &hash_of(b"ghost"), "v1").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_tags() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"doomed");

        store
            .create_artifact(&name, &hash, &["v1.0.0".to_string(), "deleteme".to_string()])
            .await
            .unwrap();

        store.delete_artifact(&name, &hash).await.unwrap();

        assert!(matches!(
            store.get_artifact_by_hash(&name, &hash).await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            store.get_artifact_by_tag(&name, "v1.0.0").await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            store.get_artifact_by_tag(&name, "deleteme").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = store().await;
        let name = test_name();

        assert!(matches!(
            store.delete_artifact(&name, &hash_of(b"ghost")).await,
            Err(MetadataError::NotFound(_))
        ));
        assert!(matches!(
            store.remove_tag(&name, "ghost").await,
            Err(MetadataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_by_partial_name() {
        let store = store().await;
        let names = [
            ("bitbucket", "u1", "app1"),
            ("bitbucket", "u1", "app2"),
            ("bitbucket", "u2", "app1"),
            ("gitlab", "u1", "app1"),
        ];
        for (i, (s, a, n)) in names.iter().enumerate() {
            let name = QualifiedName::new(*s, *a, *n).unwrap();
            store
                .create_artifact(&name, &hash_of(format!("content {i}").as_bytes()), &[])
                .await
                .unwrap();
        }

        let by_source = store
            .query_artifacts(&ArtifactQuery {
                source: Some("bitbucket".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_source.len(), 3);

        let by_author = store
            .query_artifacts(&ArtifactQuery {
                author: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_author.len(), 3);

        let exact = store
            .query_artifacts(&ArtifactQuery {
                source: Some("bitbucket".to_string()),
                author: Some("u1".to_string()),
                name: Some("app1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);

        let none = store
            .query_artifacts(&ArtifactQuery {
                source: Some("sourcehut".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_increment_pulls() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"popular");

        store.create_artifact(&name, &hash, &[]).await.unwrap();
        store.increment_pulls(&name, &hash).await.unwrap();
        store.increment_pulls(&name, &hash).await.unwrap();

        let record = store.get_artifact_by_hash(&name, &hash).await.unwrap();
        assert_eq!(record.artifact.pulls_count, 2);
    }

    #[tokio::test]
    async fn test_empty_tag_is_bad_input() {
        let store = store().await;
        let name = test_name();
        let hash = hash_of(b"content");

        store.create_artifact(&name, &hash, &[]).await.unwrap();
        assert!(matches!(
            store.add_tag(&name, &hash, "").await,
            Err(MetadataError::BadInput(_))
        ));
        assert!(matches!(
            store.create_artifact(&name, &hash, &["".to_string()]).await,
            Err(MetadataError::BadInput(_))
        ));
    }

    #[tokio::test]
    async fn test_same_content_under_two_names_is_stored_twice() {
        let store = store().await;
        let first = QualifiedName::new("github", "alice", "app").unwrap();
        let second = QualifiedName::new("github", "bob", "app").unwrap();
        let hash = hash_of(b"shared content");

        store.create_artifact(&first, &hash, &[]).await.unwrap();
        store.create_artifact(&second, &hash, &[]).await.unwrap();

        let all = store.query_artifacts(&ArtifactQuery::any()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
