//! Fully-qualified artifact names.

use crate::hash::VersionHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fully-qualified artifact name: `(source, author, name)`.
///
/// Each component is a non-empty UTF-8 string of at most 255 bytes with no
/// path separators. Equality is byte-wise. The triple names an artifact
/// family; a concrete artifact is addressed by the pair of a qualified name
/// and a [`VersionHash`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    source: String,
    author: String,
    name: String,
}

impl QualifiedName {
    /// Create a qualified name, validating every component.
    pub fn new(
        source: impl Into<String>,
        author: impl Into<String>,
        name: impl Into<String>,
    ) -> crate::Result<Self> {
        let source = source.into();
        let author = author.into();
        let name = name.into();

        validate_component("source", &source)?;
        validate_component("author", &author)?;
        validate_component("name", &name)?;

        Ok(Self {
            source,
            author,
            name,
        })
    }

    /// Get the source component.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the author component.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Get the name component.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the blob storage key for a concrete version of this artifact.
    ///
    /// The key is `source/author/name/<hex_sha256>.wasm`. The `.wasm` suffix
    /// is kept for wire compatibility with existing stores.
    pub fn blob_key(&self, hash: &VersionHash) -> String {
        format!(
            "{}/{}/{}/{}.wasm",
            self.source,
            self.author,
            self.name,
            hash.to_hex()
        )
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedName({self})")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.author, self.name)
    }
}

fn validate_component(field: &'static str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(crate::Error::InvalidName {
            field,
            reason: "cannot be empty".to_string(),
        });
    }
    if value.len() > crate::MAX_NAME_COMPONENT_LEN {
        return Err(crate::Error::InvalidName {
            field,
            reason: format!(
                "must be at most {} bytes, got {}",
                crate::MAX_NAME_COMPONENT_LEN,
                value.len()
            ),
        });
    }
    if value.contains('/') || value.contains('\\') {
        return Err(crate::Error::InvalidName {
            field,
            reason: "cannot contain path separators".to_string(),
        });
    }
    Ok(())
}

/// A partial qualified name used to enumerate artifacts.
///
/// Any subset of the components may be supplied; absent components match
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactQuery {
    pub source: Option<String>,
    pub author: Option<String>,
    pub name: Option<String>,
}

impl ArtifactQuery {
    /// Query matching every artifact.
    pub fn any() -> Self {
        Self::default()
    }
}
