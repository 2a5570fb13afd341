//! Row types for the metadata store.

use sqlx::FromRow;
use time::OffsetDateTime;

/// A row in the `artifacts` table.
///
/// Keyed by `(source, author, name, version_hash)`. Immutable after commit
/// except for `pulls_count`.
#[derive(Clone, Debug, FromRow)]
pub struct ArtifactRow {
    pub source: String,
    pub author: String,
    pub name: String,
    pub version_hash: String,
    pub created_at: OffsetDateTime,
    pub pulls_count: i64,
}

/// A row in the `tags` table.
///
/// Keyed by `(source, author, name, tag_name)` — the hash is deliberately not
/// part of the key, which is what makes tags movable pointers.
#[derive(Clone, Debug, FromRow)]
pub struct TagRow {
    pub source: String,
    pub author: String,
    pub name: String,
    pub tag_name: String,
    pub version_hash: String,
}

/// An artifact row together with its current tag set.
#[derive(Clone, Debug)]
pub struct ArtifactRecord {
    pub artifact: ArtifactRow,
    pub tags: Vec<String>,
}
