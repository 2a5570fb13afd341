//! Request validation and identifier parsing.

use crate::error::ApiError;
use crate::proto;
use armory_core::{QualifiedName, VersionHash};

/// A validated artifact identifier: exactly one of hash or tag.
#[derive(Clone, Debug)]
pub enum Identifier {
    Hash(VersionHash),
    Tag(String),
}

/// Validate a fully-qualified name message.
pub fn parse_fqn(fqn: Option<&proto::FullyQualifiedName>) -> Result<QualifiedName, ApiError> {
    let fqn = fqn.ok_or_else(|| {
        ApiError::InvalidArgument("fully-qualified name is required".to_string())
    })?;
    QualifiedName::new(&fqn.source, &fqn.author, &fqn.name)
        .map_err(|e| ApiError::InvalidArgument(e.to_string()))
}

/// Validate an artifact identifier: FQN plus exactly one non-empty
/// identifier arm.
pub fn parse_identifier(
    id: &proto::ArtifactIdentifier,
) -> Result<(QualifiedName, Identifier), ApiError> {
    let name = parse_fqn(id.fqn.as_ref())?;

    let identifier = match &id.identifier {
        Some(proto::artifact_identifier::Identifier::VersionHash(hash)) => {
            if hash.is_empty() {
                return Err(ApiError::InvalidArgument(
                    "version_hash cannot be empty".to_string(),
                ));
            }
            Identifier::Hash(parse_hash(hash)?)
        }
        Some(proto::artifact_identifier::Identifier::Tag(tag)) => {
            if tag.is_empty() {
                return Err(ApiError::InvalidArgument("tag cannot be empty".to_string()));
            }
            Identifier::Tag(tag.clone())
        }
        None => {
            return Err(ApiError::InvalidArgument(
                "no artifact identifier provided".to_string(),
            ));
        }
    };

    Ok((name, identifier))
}

/// Validate an add/remove tag request: FQN plus non-empty hash and tag.
pub fn parse_tag_request(
    req: &proto::AddRemoveTagRequest,
) -> Result<(QualifiedName, VersionHash, String), ApiError> {
    let name = parse_fqn(req.fqn.as_ref())?;

    if req.tag.is_empty() {
        return Err(ApiError::InvalidArgument("tag cannot be empty".to_string()));
    }
    if req.version_hash.is_empty() {
        return Err(ApiError::InvalidArgument(
            "version_hash cannot be empty".to_string(),
        ));
    }

    Ok((name, parse_hash(&req.version_hash)?, req.tag.clone()))
}

fn parse_hash(hash: &str) -> Result<VersionHash, ApiError> {
    VersionHash::from_hex(hash).map_err(|e| ApiError::InvalidArgument(e.to_string()))
}
