//! pako-compatible "binary string" zlib transform used by RPG Maker MZ.
//!
//! MZ deflates the JSON text (UTF-8) and stores the compressed bytes as a
//! string with one char per byte, which is then written to disk as UTF-8.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

pub fn inflate_binary_string(packed: &str) -> Result<String, String> {
    let bytes = packed
        .chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| format!("char U+{:04X} is not a byte", u32::from(c))))
        .collect::<Result<Vec<u8>, String>>()?;

    let mut inflated = Vec::with_capacity(bytes.len() * 4);
    ZlibDecoder::new(bytes.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| format!("zlib inflate failed: {e}"))?;

    String::from_utf8(inflated).map_err(|e| format!("inflated data is not UTF-8: {e}"))
}

/// Deflates at level 1, the level the engine itself writes with.
pub fn deflate_binary_string(text: &str) -> Result<String, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| format!("zlib deflate failed: {e}"))?;
    let packed = encoder
        .finish()
        .map_err(|e| format!("zlib deflate failed: {e}"))?;

    Ok(packed.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{deflate_binary_string, inflate_binary_string};
    use crate::codec::Codec;

    #[test]
    fn packed_text_only_uses_byte_chars() {
        let packed = deflate_binary_string(r#"{"party":{"_gold":100}}"#).expect("deflate should work");
        assert!(packed.chars().all(|c| u32::from(c) <= 0xFF));
        // zlib header for the fastest level
        assert_eq!(packed.chars().next(), Some('\u{78}'));
    }

    #[test]
    fn inflates_level_one_streams_from_the_engine() {
        let vectors = [
            (
                "x\u{1}\u{ab}V*H,*\u{a9}T\u{b2}\u{aa}V\u{8a}O\u{cf}\u{cf}IQ\u{b2}240\u{a8}\u{ad}\u{5}\u{0}_\u{9e}\u{7}\u{b3}",
                r#"{"party":{"_gold":100}}"#,
            ),
            (
                "x\u{1}\u{ab}VJL.\u{c9}/*V\u{b2}\u{aa}V\u{8a}OI,I\u{4}1\u{1c}\u{80}dt^iN\u{8e}\u{e}P0/17U\u{c9}J\u{e9}iw\u{fb}\u{8b}\u{86}V%\u{1d}\u{a5}\u{f8}\u{8c}\u{2}%+\u{13}S\u{83}\u{da}\u{d8}\u{da}\u{da}Z\u{0}\u{bb}|\u{16}@",
                "{\"actors\":{\"_data\":{\"@a\":[null,{\"_name\":\"\u{52c7}\u{8005}\",\"_hp\":450}]}}}",
            ),
        ];
        for (packed, text) in vectors {
            assert_eq!(inflate_binary_string(packed).as_deref(), Ok(text));
            let codec = Codec::Zlib {
                library: PathBuf::from("pako.min.js"),
            };
            assert_eq!(codec.decode_text(packed).as_deref(), Ok(text));
        }
    }

    #[test]
    fn round_trips_unicode() {
        for text in ["", "Héros", "勇者の剣", "{\"a\":[1,2,3]}"] {
            let packed = deflate_binary_string(text).expect("deflate should work");
            assert_eq!(inflate_binary_string(&packed).as_deref(), Ok(text));
        }
    }

    #[test]
    fn rejects_wide_chars_and_corrupt_streams() {
        assert!(inflate_binary_string("\u{3042}").is_err());
        assert!(inflate_binary_string("xyz").is_err());
    }
}
