//! Numbered backups: `notes.txt` → `notes.~01~.txt`, `notes.~01~.txt` →
//! `notes.~02~.txt`, and so on.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::Result;

/// Rotate existing copies of `path` out of the way and return `path`, which is
/// then free to be written.
///
/// Missing parent directories are created.
pub fn versioned_path(path: &Path) -> Result<PathBuf> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let pattern = Regex::new(&format!(
        r"^{}\.~(\d+)~{}$",
        regex::escape(&stem),
        regex::escape(&ext)
    ))
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    // Backups may be unpadded (`~1~`); rename from the name on disk.
    let mut versions: Vec<(u32, PathBuf)> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let version = pattern
                .captures(&name)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())?;
            Some((version, entry.path()))
        })
        .collect();
    versions.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let backup = |n: u32| dir.join(format!("{stem}.~{n:02}~{ext}"));
    for (version, existing) in versions {
        std::fs::rename(&existing, backup(version + 1))?;
    }

    let target = dir.join(format!("{stem}{ext}"));
    if target.exists() {
        debug!(path = %target.display(), "rotating existing file");
        std::fs::rename(&target, backup(1))?;
    }
    Ok(target)
}
