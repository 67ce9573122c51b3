use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    RootNotFound,
    CodecIndeterminate,
    CodecConstructionFailed,
    DecodeFailed,
    JsonParseFailed,
    MetadataFileMissing,
    WriteFailed,
    NoDestination,
    UnknownField,
    InvalidEdit,
}

impl CoreErrorCode {
    /// Diagnostics with these codes never abort a load.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::CodecIndeterminate | Self::MetadataFileMissing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn io(code: CoreErrorCode, path: &Path, err: std::io::Error) -> Self {
        Self::new(code, format!("{}: {err}", path.display()))
    }
}
