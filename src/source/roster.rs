//! Representative roster loading.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::SourceError;
use crate::representative::Representative;

/// Reads a JSON array of representatives.
///
/// # Errors
/// `Unavailable` if the file cannot be read, `Decode` if it is not a roster.
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<Representative>, SourceError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| SourceError::Unavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let roster: Vec<Representative> =
        serde_json::from_str(&raw).map_err(|e| SourceError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    debug!(path = %path.display(), records = roster.len(), "roster loaded");
    Ok(roster)
}
