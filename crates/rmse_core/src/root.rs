use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

/// Entries whose presence marks a directory as the game installation root.
pub const ROOT_SENTINELS: [&str; 4] = ["Game", "nw", "Game.exe", "nw.exe"];

/// Walks up from the directory containing `save_path` until a directory holding
/// one of [`ROOT_SENTINELS`] is found.
///
/// The path is walked as given first and then in canonical form, so relative
/// paths and symlinked save folders both resolve. Probe errors count as a
/// missing sentinel.
pub fn locate_root(save_path: &Path) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(parent) = save_path.parent() {
        candidates.extend(parent.ancestors().map(Path::to_path_buf));
    }
    if let Ok(canonical) = fs::canonicalize(save_path)
        && let Some(parent) = canonical.parent()
    {
        candidates.extend(parent.ancestors().map(Path::to_path_buf));
    }

    let mut seen = BTreeSet::new();
    for candidate in candidates {
        if !seen.insert(candidate.clone()) {
            continue;
        }
        if is_root_candidate(&candidate) {
            debug!("found game root at {}", candidate.display());
            return Some(candidate);
        }
    }
    None
}

fn is_root_candidate(dir: &Path) -> bool {
    // `Path::new("")` is the parent of a bare file name; probe the working directory.
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    ROOT_SENTINELS.iter().any(|name| {
        let probe = dir.join(name);
        match probe.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                debug!("treating {} as absent: {e}", probe.display());
                false
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::locate_root;
    use crate::test_support::temp_test_dir;

    #[test]
    fn finds_game_exe_three_levels_up() {
        let root = temp_test_dir("root_game_exe");
        let save_path = root.join("www").join("save").join("slots").join("file1.rpgsave");
        fs::create_dir_all(save_path.parent().expect("save path has a parent"))
            .expect("failed to create save directories");
        fs::write(root.join("Game.exe"), b"MZ").expect("failed to write sentinel");
        fs::write(&save_path, b"").expect("failed to write save");

        let located = locate_root(&save_path).expect("root should be found");
        assert_eq!(
            fs::canonicalize(located).expect("located root should exist"),
            fs::canonicalize(&root).expect("temp root should exist")
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn sentinel_directory_counts() {
        let root = temp_test_dir("root_nw_dir");
        let save_path = root.join("save").join("file1.rmmzsave");
        fs::create_dir_all(root.join("nw")).expect("failed to create nw dir");
        fs::create_dir_all(save_path.parent().expect("save path has a parent"))
            .expect("failed to create save dir");

        assert_eq!(locate_root(&save_path).as_deref(), Some(root.as_path()));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn nearest_sentinel_wins() {
        let root = temp_test_dir("root_nearest");
        let inner = root.join("inner");
        let save_path = inner.join("save").join("file1.rpgsave");
        fs::create_dir_all(save_path.parent().expect("save path has a parent"))
            .expect("failed to create save dir");
        fs::write(root.join("Game.exe"), b"").expect("failed to write outer sentinel");
        fs::write(inner.join("nw.exe"), b"").expect("failed to write inner sentinel");

        assert_eq!(locate_root(&save_path).as_deref(), Some(inner.as_path()));

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn tree_without_sentinel_is_not_found() {
        let root = temp_test_dir("root_missing");
        let save_path = root.join("a").join("b").join("file1.rpgsave");
        fs::create_dir_all(save_path.parent().expect("save path has a parent"))
            .expect("failed to create save dir");

        // Unique temp dirs live under the system temp dir, which never holds a
        // `Game`/`nw` entry on a sane machine.
        assert_eq!(locate_root(&save_path), None);

        let _ = fs::remove_dir_all(&root);
    }
}
