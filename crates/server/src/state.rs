//! Application state shared across RPC handlers.

use crate::error::ApiError;
use armory_metadata::MetadataStore;
use armory_storage::ArtifactStore;
use std::sync::Arc;

/// Shared handles injected at service construction.
#[derive(Clone)]
pub struct AppState {
    /// Blob backend. Optional so the service can come up without one and
    /// answer with Unavailable instead of refusing to start.
    pub storage: Option<Arc<dyn ArtifactStore>>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    /// Create new application state.
    pub fn new(storage: Option<Arc<dyn ArtifactStore>>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { storage, metadata }
    }

    /// Get the storage backend or fail with Unavailable.
    pub fn storage(&self, operation: &str) -> Result<&Arc<dyn ArtifactStore>, ApiError> {
        self.storage
            .as_ref()
            .ok_or_else(|| ApiError::Unavailable(format!("no storage backend for {operation}")))
    }
}
