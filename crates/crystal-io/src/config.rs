//! JSON configuration files.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::IoError;

/// Read and deserialize a JSON file.
///
/// Config types use `#[serde(default)]`, so a file may name only the
/// fields it changes. Validation is left to the caller.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be read or
/// [`IoError::Json`] if it does not parse as `T`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let text = std::fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}
