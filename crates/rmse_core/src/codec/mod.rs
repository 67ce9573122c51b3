mod lz_string;
mod zlib;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::core_api::{CoreError, CoreErrorCode};

pub use lz_string::{compress_to_base64, decompress_from_base64};
pub use zlib::{deflate_binary_string, inflate_binary_string};

/// Extension of saves that are stored as plain JSON.
pub const PLAIN_JSON_EXTENSION: &str = "json";

/// Support library whose presence marks zlib-compressed saves (MZ).
pub const PAKO_LIBRARY: [&str; 3] = ["js", "libs", "pako.min.js"];
/// Support library whose presence marks lz-string saves (MV).
pub const LZ_STRING_LIBRARY: [&str; 4] = ["www", "js", "libs", "lz-string.js"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecKind {
    Identity,
    Zlib,
    LzString,
}

impl CodecKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Identity => "identity",
            Self::Zlib => "zlib",
            Self::LzString => "lz-string",
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reversible transform between a save file on disk and its JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Codec {
    Identity,
    Zlib { library: PathBuf },
    LzString { library: PathBuf },
}

impl Codec {
    pub fn kind(&self) -> CodecKind {
        match self {
            Self::Identity => CodecKind::Identity,
            Self::Zlib { .. } => CodecKind::Zlib,
            Self::LzString { .. } => CodecKind::LzString,
        }
    }

    /// Support library the codec was constructed from, if any.
    pub fn library(&self) -> Option<&Path> {
        match self {
            Self::Identity => None,
            Self::Zlib { library } | Self::LzString { library } => Some(library.as_path()),
        }
    }

    pub fn decode(&self, path: &Path) -> Result<String, CoreError> {
        let text = fs::read_to_string(path)
            .map_err(|e| CoreError::io(CoreErrorCode::DecodeFailed, path, e))?;
        self.decode_text(&text).map_err(|message| {
            CoreError::new(
                CoreErrorCode::DecodeFailed,
                format!("{}: {} decode failed: {message}", path.display(), self.kind()),
            )
        })
    }

    pub fn decode_text(&self, text: &str) -> Result<String, String> {
        match self {
            Self::Identity => Ok(text.to_owned()),
            Self::Zlib { .. } => inflate_binary_string(text),
            Self::LzString { .. } => decompress_from_base64(text)
                .ok_or_else(|| "input is not a valid lz-string base64 stream".to_string()),
        }
    }

    pub fn encode(&self, json: &str) -> Result<String, CoreError> {
        match self {
            Self::Identity => Ok(json.to_owned()),
            Self::Zlib { .. } => deflate_binary_string(json)
                .map_err(|message| CoreError::new(CoreErrorCode::WriteFailed, message)),
            Self::LzString { .. } => Ok(compress_to_base64(json)),
        }
    }

    fn construct(kind: CodecKind, library: PathBuf) -> Result<Self, CoreError> {
        let metadata = fs::metadata(&library)
            .map_err(|e| CoreError::io(CoreErrorCode::CodecConstructionFailed, &library, e))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(CoreError::new(
                CoreErrorCode::CodecConstructionFailed,
                format!(
                    "{}: {kind} support library is not a non-empty file",
                    library.display()
                ),
            ));
        }

        Ok(match kind {
            CodecKind::Identity => Self::Identity,
            CodecKind::Zlib => Self::Zlib { library },
            CodecKind::LzString => Self::LzString { library },
        })
    }
}

/// Outcome of [`select_codec`]: the codec plus a diagnostic when the choice
/// was a fallback rather than a positive detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSelection {
    pub codec: Codec,
    pub diagnostic: Option<CoreError>,
}

pub fn select_codec(file_path: &Path, root: &Path) -> Result<CodecSelection, CoreError> {
    if file_path
        .extension()
        .is_some_and(|ext| ext == PLAIN_JSON_EXTENSION)
    {
        return Ok(CodecSelection {
            codec: Codec::Identity,
            diagnostic: None,
        });
    }

    let candidates = [
        (CodecKind::Zlib, join_all(root, &PAKO_LIBRARY)),
        (CodecKind::LzString, join_all(root, &LZ_STRING_LIBRARY)),
    ];
    for (kind, library) in candidates {
        if probe(&library) {
            debug!("{}: using {kind} codec from {}", file_path.display(), library.display());
            return Ok(CodecSelection {
                codec: Codec::construct(kind, library)?,
                diagnostic: None,
            });
        }
    }

    let diagnostic = CoreError::new(
        CoreErrorCode::CodecIndeterminate,
        format!(
            "no pako or lz-string library under {}; assuming {} is uncompressed",
            root.display(),
            file_path.display()
        ),
    );
    warn!("{diagnostic}");
    Ok(CodecSelection {
        codec: Codec::Identity,
        diagnostic: Some(diagnostic),
    })
}

fn join_all(base: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(base.to_path_buf(), |path, part| path.join(part))
}

fn probe(path: &Path) -> bool {
    path.try_exists().unwrap_or_else(|e| {
        debug!("treating {} as absent: {e}", path.display());
        false
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{Codec, CodecKind, LZ_STRING_LIBRARY, PAKO_LIBRARY, join_all, select_codec};
    use crate::core_api::CoreErrorCode;
    use crate::test_support::temp_test_dir;

    #[test]
    fn json_extension_is_identity_regardless_of_root() {
        let root = temp_test_dir("codec_json");
        write_library(&root, &PAKO_LIBRARY);
        write_library(&root, &LZ_STRING_LIBRARY);

        let selection = select_codec(&root.join("save").join("global.json"), &root)
            .expect("selection should succeed");
        assert_eq!(selection.codec, Codec::Identity);
        assert!(selection.diagnostic.is_none());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn pako_wins_over_lz_string() {
        let root = temp_test_dir("codec_priority");
        write_library(&root, &PAKO_LIBRARY);
        write_library(&root, &LZ_STRING_LIBRARY);

        let selection = select_codec(&root.join("save").join("file1.rmmzsave"), &root)
            .expect("selection should succeed");
        assert_eq!(selection.codec.kind(), CodecKind::Zlib);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn libraries_outside_root_are_ignored() {
        let outer = temp_test_dir("codec_outside");
        let root = outer.join("game");
        write_library(&root, &PAKO_LIBRARY);
        // lz-string sits next to the root, not under it
        write_library(&outer, &LZ_STRING_LIBRARY);

        let selection = select_codec(&root.join("save").join("file1.rmmzsave"), &root)
            .expect("selection should succeed");
        assert_eq!(selection.codec.kind(), CodecKind::Zlib);

        let _ = fs::remove_dir_all(&outer);
    }

    #[test]
    fn missing_libraries_fall_back_to_identity_with_diagnostic() {
        let root = temp_test_dir("codec_fallback");
        fs::create_dir_all(&root).expect("failed to create root");

        let selection = select_codec(&root.join("www").join("save").join("file1.rpgsave"), &root)
            .expect("fallback should not fail");
        assert_eq!(selection.codec, Codec::Identity);
        assert_eq!(
            selection.diagnostic.map(|d| d.code),
            Some(CoreErrorCode::CodecIndeterminate)
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn empty_support_library_fails_construction() {
        let root = temp_test_dir("codec_empty_lib");
        let library = join_all(&root, &LZ_STRING_LIBRARY);
        fs::create_dir_all(library.parent().expect("library has a parent"))
            .expect("failed to create library dir");
        fs::write(&library, b"").expect("failed to write library");

        let err = select_codec(&root.join("www").join("save").join("file1.rpgsave"), &root)
            .expect_err("empty library should fail");
        assert_eq!(err.code, CoreErrorCode::CodecConstructionFailed);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn every_codec_round_trips() {
        let codecs = [
            Codec::Identity,
            Codec::Zlib {
                library: PathBuf::from("pako.min.js"),
            },
            Codec::LzString {
                library: PathBuf::from("lz-string.js"),
            },
        ];
        for codec in codecs {
            for text in ["", "{}", "{\"name\":\"ハロルド\",\"gold\":9999}"] {
                let encoded = codec.encode(text).expect("encode should work");
                assert_eq!(
                    codec.decode_text(&encoded).as_deref(),
                    Ok(text),
                    "{} round trip",
                    codec.kind()
                );
            }
        }
    }

    #[test]
    fn decode_reports_corrupt_file() {
        let root = temp_test_dir("codec_corrupt");
        fs::create_dir_all(&root).expect("failed to create root");
        let path = root.join("file1.rpgsave");
        fs::write(&path, "this is not lz-string!").expect("failed to write save");

        let codec = Codec::LzString {
            library: PathBuf::from("lz-string.js"),
        };
        let err = codec.decode(&path).expect_err("corrupt input should fail");
        assert_eq!(err.code, CoreErrorCode::DecodeFailed);

        let _ = fs::remove_dir_all(&root);
    }

    fn write_library(root: &Path, parts: &[&str]) {
        let library = join_all(root, parts);
        fs::create_dir_all(library.parent().expect("library has a parent"))
            .expect("failed to create library dir");
        fs::write(&library, b"/* library */").expect("failed to write library");
    }
}
