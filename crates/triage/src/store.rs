//! Whole-file JSON persistence shared by the stores
//!
//! Every mutation loads the entire document, changes it, and writes the
//! entire document back. There is no locking: concurrent writers race and the
//! last write wins.

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Load a JSON document, falling back to `T::default()`
///
/// A missing file is normal (first run). An unreadable or malformed file is
/// logged and also treated as empty, which discards whatever it held on the
/// next write.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        debug!("{} does not exist yet, starting empty", path.display());
        return T::default();
    }

    match config::load_json_file(path) {
        Ok(value) => value,
        Err(e) => {
            warn!("Treating {} as empty: {:#}", path.display(), e);
            T::default()
        }
    }
}

/// Write a JSON document (pretty-printed, 2-space indent), creating parent directories
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    config::save_json_file(path, value).map_err(|e| {
        let path = path.to_path_buf();
        match e.downcast::<serde_json::Error>() {
            Ok(source) => StoreError::Serialize { path, source },
            Err(e) => match e.downcast::<io::Error>() {
                Ok(source) => StoreError::StorageUnavailable { path, source },
                Err(e) => StoreError::StorageUnavailable {
                    path,
                    source: io::Error::other(format!("{e:#}")),
                },
            },
        }
    })
}
