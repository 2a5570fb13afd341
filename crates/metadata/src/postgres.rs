//! PostgreSQL-based metadata store implementation.

use crate::error::{translate, MetadataError, MetadataResult};
use crate::models::{ArtifactRecord, ArtifactRow, TagRow};
use crate::store::{require_tag, MetadataStore};
use armory_core::{ArtifactQuery, QualifiedName, VersionHash};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    source TEXT NOT NULL,
    author TEXT NOT NULL,
    name TEXT NOT NULL,
    version_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    pulls_count BIGINT NOT NULL DEFAULT 0,
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

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Credentials are passed separately so secrets can come from the
    /// environment rather than a connection URL.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        database: &str,
        sslmode: &str,
    ) -> MetadataResult<Self> {
        let ssl_mode = PgSslMode::from_str(sslmode)
            .map_err(|_| MetadataError::BadInput(format!("invalid sslmode: {sslmode}")))?;

        let opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .username(username)
            .password(password)
            .database(database)
            .ssl_mode(ssl_mode);

        tracing::info!(
            host,
            port,
            database,
            username,
            sslmode,
            "connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    async fn load_tags(
        &self,
        name: &QualifiedName,
        version_hash: &str,
    ) -> MetadataResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT tag_name FROM tags WHERE source = $1 AND author = $2 AND name = $3 AND version_hash = $4 ORDER BY tag_name",
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
impl MetadataStore for PostgresStore {
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
            "SELECT * FROM artifacts WHERE source = $1 AND author = $2 AND name = $3 AND version_hash = $4",
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
            "SELECT * FROM tags WHERE source = $1 AND author = $2 AND name = $3 AND tag_name = $4",
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
        let mut placeholder = 1;
        if query.source.is_some() {
            clauses.push(format!("source = ${placeholder}"));
            placeholder += 1;
        }
        if query.author.is_some() {
            clauses.push(format!("author = ${placeholder}"));
            placeholder += 1;
        }
        if query.name.is_some() {
            clauses.push(format!("name = ${placeholder}"));
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

        sqlx::query(
            r#"
            INSERT INTO artifacts (source, author, name, version_hash, created_at, pulls_count)
            VALUES ($1, $2, $3, $4, $5, 0)
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
                VALUES ($1, $2, $3, $4, $5)
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
            "DELETE FROM artifacts WHERE source = $1 AND author = $2 AND name = $3 AND version_hash = $4",
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
            "SELECT 1 FROM artifacts WHERE source = $1 AND author = $2 AND name = $3 AND version_hash = $4",
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
            VALUES ($1, $2, $3, $4, $5)
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
            "DELETE FROM tags WHERE source = $1 AND author = $2 AND name = $3 AND tag_name = $4",
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
            "UPDATE artifacts SET pulls_count = pulls_count + 1 WHERE source = $1 AND author = $2 AND name = $3 AND version_hash = $4",
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
