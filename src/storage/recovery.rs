//! Crash-save file naming

use std::path::{Path, PathBuf};

const CRASH_SAVE_STEM: &str = "page-reader_crash-save";

/// First unused `page-reader_crash-save[_N].<ext>` path in `dir`
pub fn next_crash_save_path(dir: &Path, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", CRASH_SAVE_STEM, extension));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.{}", CRASH_SAVE_STEM, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}
