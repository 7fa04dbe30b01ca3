//! Utility functions

use crate::error::{ResolveError, ResolveIoError, Result};
use cfg_if::cfg_if;
use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};
use walkdir::WalkDir;

/// Canonicalize the path, returning an error with the path attached.
///
/// On windows this will ensure the path only consists of `\` separators and no
/// UNC prefix, everywhere else this is `fs::canonicalize`.
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    cfg_if! {
        if #[cfg(windows)] {
            let res = dunce::canonicalize(path);
        } else {
            let res = fs::canonicalize(path);
        }
    }
    res.map_err(|err| ResolveError::io(err, path))
}

/// Returns the same path but with a canonicalized prefix where possible,
/// leaving the path untouched if canonicalization fails (e.g. the file does
/// not exist yet).
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    canonicalize(&path).unwrap_or(path)
}

/// Reads the last-write time of the file as milliseconds since the unix epoch.
pub fn last_write_time(path: impl AsRef<Path>) -> Result<i64> {
    let path = path.as_ref();
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|err| ResolveError::io(err, path))?;
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => Ok(d.as_millis() as i64),
        // pre-epoch timestamps encode as negative offsets
        Err(err) => Ok(-(err.duration().as_millis() as i64)),
    }
}

/// Lists the entries of `dir` non-recursively, sorted case-insensitively by
/// file name so candidate enumeration is deterministic across filesystems.
pub fn sorted_dir_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(|e| e.into_path())
        .collect();
    entries.sort_by_key(|p| {
        p.file_name().map(|s| s.to_string_lossy().to_lowercase()).unwrap_or_default()
    });
    entries
}

/// Returns the file name of `path` as a `&str`, if it is valid UTF-8.
pub fn file_name_str(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()
}

/// Returns `true` if `path`'s name case-insensitively ends with any of the
/// given `.`-prefixed extensions.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = file_name_str(path) else { return false };
    extensions.iter().any(|ext| {
        name.len() > ext.len() && name[name.len() - ext.len()..].eq_ignore_ascii_case(ext)
    })
}

/// Replaces the `.`-prefixed extension of a file name.
pub fn with_extension(name: &str, ext: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}{}", &name[..dot], ext),
        None => format!("{name}{ext}"),
    }
}

/// Creates the parent directory of `file` and all of its ancestors.
pub fn create_parent_dir_all(file: impl AsRef<Path>) -> Result<()> {
    let file = file.as_ref();
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|err| ResolveIoError::new(err, parent))?;
    }
    Ok(())
}
