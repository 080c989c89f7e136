//! File-based settings sources: the `.env` override file and a secrets directory.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::env_config::strip_prefix;
use crate::error::SourceError;

/// Default location of the override file, relative to the working directory.
pub const DEFAULT_OVERRIDE_FILE: &str = ".env";

/// Read `KEY=value` lines from the override file at `path`.
///
/// A missing file yields no values. Keys are lowercased and filtered by
/// `prefix` the same way environment variables are.
pub fn load_override_file(path: &Path, prefix: &str) -> Result<HashMap<String, String>, SourceError> {
    if !path.is_file() {
        debug!(path = %path.display(), "no override file");
        return Ok(HashMap::new());
    }

    let override_error = |e: dotenv::Error| SourceError::OverrideFile {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut values = HashMap::new();
    for entry in dotenv::from_path_iter(path).map_err(override_error)? {
        let (key, value) = entry.map_err(override_error)?;
        if let Some(key) = strip_prefix(&key, prefix) {
            values.insert(key, value);
        }
    }
    debug!(path = %path.display(), count = values.len(), "loaded override file");
    Ok(values)
}

/// Read one value per file from the secrets directory `dir`.
///
/// Each regular file's name is the key and its trimmed contents the value. A
/// missing directory yields no values.
pub fn load_secrets_dir(dir: &Path, prefix: &str) -> Result<HashMap<String, String>, SourceError> {
    if !dir.is_dir() {
        warn!(path = %dir.display(), "secrets directory does not exist");
        return Ok(HashMap::new());
    }

    let dir_error = |source: std::io::Error| SourceError::SecretsDir {
        path: dir.display().to_string(),
        source,
    };

    let mut values = HashMap::new();
    for entry in fs::read_dir(dir).map_err(dir_error)? {
        let entry = entry.map_err(dir_error)?;
        if !entry.file_type().map_err(dir_error)?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(key) = strip_prefix(&name, prefix) else {
            continue;
        };
        let content = fs::read_to_string(entry.path()).map_err(dir_error)?;
        values.insert(key, content.trim().to_string());
    }
    Ok(values)
}
