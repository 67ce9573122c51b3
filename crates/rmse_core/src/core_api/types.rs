use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::{Codec, CodecKind};
use crate::context::MetadataContext;

use super::error::CoreError;

/// Everything a load produces before the JSON is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSave {
    pub savefile: PathBuf,
    pub rm_root: PathBuf,
    pub json_txt: String,
    pub context: MetadataContext,
    pub codec: Codec,
    /// Recoverable problems met while loading.
    pub diagnostics: Vec<CoreError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeReport {
    pub savefile: PathBuf,
    pub rm_root: PathBuf,
    pub codec: CodecKind,
    pub library: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub metadata_files: Vec<String>,
    pub diagnostics: Vec<String>,
}
