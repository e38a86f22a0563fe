// API path <-> filesystem path mapping

use std::fs;
use std::io;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

/// Convert a `/`-separated API path to a filesystem path under `root`.
///
/// Duplicate and surrounding slashes are dropped. `root` must already be a
/// filesystem path; an empty root yields a relative path.
pub fn to_os_path(api_path: &str, root: &str) -> PathBuf {
    let mut path = PathBuf::from(root);
    for part in api_path.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path
}

/// Convert a filesystem path to a `/`-separated API path relative to `root`.
///
/// The root is removed as a textual prefix. Duplicate separators are dropped.
pub fn to_api_path(os_path: &str, root: &str) -> String {
    let relative = os_path.strip_prefix(root).unwrap_or(os_path);
    relative
        .split(MAIN_SEPARATOR)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Case-insensitive path comparison backed by equal file metadata.
///
/// Only meaningful where device and inode numbers are unavailable.
pub fn samefile_simple(path: &Path, other_path: &Path) -> io::Result<bool> {
    let meta = fs::metadata(path)?;
    let other = fs::metadata(other_path)?;

    let names_match =
        path.to_string_lossy().to_lowercase() == other_path.to_string_lossy().to_lowercase();
    let stats_match = meta.len() == other.len()
        && meta.file_type() == other.file_type()
        && meta.permissions() == other.permissions()
        && meta.modified().ok() == other.modified().ok();

    Ok(names_match && stats_match)
}
