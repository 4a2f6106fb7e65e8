//! Filesystem-safe file names derived from task titles.

use std::path::{Path, PathBuf};

/// Longest stem kept from a title, in characters.
pub const MAX_STEM_CHARS: usize = 120;

const FALLBACK_STEM: &str = "Untitled";

/// Turn a title into a file stem safe on every common filesystem.
///
/// Path separators, reserved punctuation and control characters become
/// `_`; leading dots are dropped so the file is never hidden.
#[must_use]
pub fn sanitize_stem(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_start_matches('.').trim();
    let truncated: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    let truncated = truncated.trim_end_matches([' ', '.']);

    if truncated.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        truncated.to_string()
    }
}

/// First free `<stem>.<ext>`, `<stem> 2.<ext>`, `<stem> 3.<ext>`, ... in `dir`.
pub fn unique_path(
    dir: &Path,
    stem: &str,
    extension: &str,
    taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let first = dir.join(format!("{stem}.{extension}"));
    if !taken(&first) {
        return first;
    }
    (2u64..)
        .map(|n| dir.join(format!("{stem} {n}.{extension}")))
        .find(|candidate| !taken(candidate))
        .unwrap_or(first)
}
