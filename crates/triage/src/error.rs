//! Error types for the JSON-backed stores

use std::path::PathBuf;

/// Failure to persist a store
///
/// Reads never produce this: an unreadable or malformed store is treated as
/// empty. Only writes report errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
