//! Core domain types and shared logic for the Armory artifact registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Fully-qualified artifact names and their validation rules
//! - Content version hashes
//! - Artifact queries
//! - Configuration types

pub mod config;
pub mod error;
pub mod hash;
pub mod name;

pub use config::{AppConfig, DatabaseConfig, PersistenceConfig, S3Config};
pub use error::{Error, Result};
pub use hash::{VersionHash, VersionHasher};
pub use name::{ArtifactQuery, QualifiedName};

/// Chunk size for streamed artifact downloads: 3 MiB.
///
/// The last chunk of a pull is allowed to be short; every other chunk is
/// exactly this size.
pub const PULL_CHUNK_SIZE: usize = 3 * 1024 * 1024;

/// Maximum byte length of a single qualified-name component.
pub const MAX_NAME_COMPONENT_LEN: usize = 255;
