use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique, not yet created directory under the system temp dir.
pub(crate) fn temp_test_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "rmse_{}_{}_{}",
        prefix,
        std::process::id(),
        nanos
    ))
}
