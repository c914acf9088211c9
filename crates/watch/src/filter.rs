//! Archive filename filter.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Suffix marking a file the producer is still writing.
pub const IN_PROGRESS_SUFFIX: &str = ".tmp";

/// Accepted archive names: `*.zip`, `*.rar`, `*.7z`, `*.tar`, `*.tar.<ext>`,
/// each optionally followed by a three-digit split-part suffix (`.001`).
static ARCHIVE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\.zip|\.rar|\.7z|\.tar(\.\w+)?)(\.\d{3})?$").expect("archive name pattern")
});

/// Returns whether `path` names a finished archive eligible for delivery.
///
/// The in-progress suffix dominates: `archive.zip.tmp` is rejected even
/// though the rest of the name matches.
pub fn is_archive_name(path: &Path) -> bool {
    let Some(name) = path.to_str() else {
        return false;
    };
    !name.ends_with(IN_PROGRESS_SUFFIX) && ARCHIVE_NAME.is_match(name)
}
