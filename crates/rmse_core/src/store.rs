use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::Value;

use crate::core_api::{CoreError, CoreErrorCode};

/// String key-value store persisted as one JSON object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStore {
    /// Opens the store at `path`. A missing file is an empty store; non-string
    /// values are ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no store at {}, starting empty", path.display());
                return Ok(Self {
                    path,
                    entries: BTreeMap::new(),
                });
            }
            Err(e) => return Err(CoreError::io(CoreErrorCode::Io, &path, e)),
        };

        let parsed: Value = serde_json::from_str(&text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::JsonParseFailed,
                format!("{}: {e}", path.display()),
            )
        })?;
        let Value::Object(map) = parsed else {
            return Err(CoreError::new(
                CoreErrorCode::JsonParseFailed,
                format!("{}: store is not a JSON object", path.display()),
            ));
        };

        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match value {
                Value::String(value) => {
                    entries.insert(key, value);
                }
                other => warn!("ignoring non-string store entry '{key}': {other}"),
            }
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), CoreError> {
        self.entries.insert(key.into(), value.into());
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<bool, CoreError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| CoreError::io(CoreErrorCode::WriteFailed, parent, e))?;
        }
        let text = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            CoreError::new(
                CoreErrorCode::WriteFailed,
                format!("{}: {e}", self.path.display()),
            )
        })?;
        write_atomically(&self.path, &text)
    }
}

/// Writes `contents` to a sibling temporary file and renames it over `path`,
/// so readers never observe a partial file.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<(), CoreError> {
    let file_name = path.file_name().ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::WriteFailed,
            format!("{} does not name a file", path.display()),
        )
    })?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(format!(".rmse-{}.tmp", std::process::id()));
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, contents)
        .map_err(|e| CoreError::io(CoreErrorCode::WriteFailed, &temp_path, e))?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(CoreError::io(CoreErrorCode::WriteFailed, path, e));
    }
    Ok(())
}
