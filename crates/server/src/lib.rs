//! Armory registry server.
//!
//! Exposes the registry RPC surface over tonic and wires validation, the
//! upload/download pipelines and error translation around the injected
//! storage and metadata backends.

pub mod download;
pub mod error;
pub mod service;
pub mod state;
pub mod upload;
pub mod validate;

/// Generated protobuf types for the registry RPC surface.
pub mod proto {
    tonic::include_proto!("armory.v1");
}

pub use error::{ApiError, ApiResult};
pub use service::RegistryApi;
pub use state::AppState;
