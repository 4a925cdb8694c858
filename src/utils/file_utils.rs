//! File system utilities

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::models::AppResult;

const PARTIAL_SUFFIXES: [&str; 2] = [".part", ".ytdl"];

/// Map free text onto a safe single path segment.
///
/// Keeps alphanumerics, space, `-`, `_`, `(` and `)`; everything else becomes
/// `_`. Surrounding whitespace is trimmed afterwards.
pub fn sanitize_path_segment(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() => c,
            ' ' | '-' | '_' | '(' | ')' => c,
            _ => '_',
        })
        .collect();
    mapped.trim().to_string()
}

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> AppResult<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

pub fn has_mp3_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false)
}

/// Modification times of the `.mp3` files directly inside a directory
pub type Mp3Snapshot = HashMap<PathBuf, SystemTime>;

fn mp3_entries(dir: &Path) -> AppResult<Vec<(PathBuf, SystemTime)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !has_mp3_extension(&path) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((path, modified));
    }
    Ok(found)
}

/// Record which MP3s a directory holds before a run; missing dir is empty
pub fn snapshot_mp3s(dir: &Path) -> AppResult<Mp3Snapshot> {
    if !dir.exists() {
        return Ok(Mp3Snapshot::new());
    }
    Ok(mp3_entries(dir)?.into_iter().collect())
}

/// Most recently modified `.mp3` inside `dir` that is absent from `before`
/// or has been rewritten since it was taken
pub fn find_latest_mp3(dir: &Path, before: &Mp3Snapshot) -> AppResult<Option<PathBuf>> {
    let newest = mp3_entries(dir)?
        .into_iter()
        .filter(|(path, modified)| before.get(path).map_or(true, |seen| modified > seen))
        .max_by_key(|(_, modified)| *modified);

    Ok(newest.map(|(path, _)| path))
}

/// Delete `.part`/`.ytdl` leftovers of an interrupted run. Returns how many
/// files were removed.
pub fn remove_partial_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
            && fs::remove_file(entry.path()).is_ok()
        {
            removed += 1;
        }
    }
    removed
}
