//! Splitting and validation of `/`-rooted paths.

use crate::fs::FsError;
use crate::sb::{MAX_NAME_LEN, MAX_PATH_LEN};

pub const SEPARATOR: char = '/';

/// Checks that `path` is rooted and within the length limit.
pub fn validate(path: &str) -> Result<(), FsError> {
    if !path.starts_with(SEPARATOR) {
        return Err(FsError::InvalidPath(format!(
            "path \"{}\" must start with \"/\"",
            path
        )));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(FsError::InvalidPath(format!(
            "path is {} bytes, limit is {}",
            path.len(),
            MAX_PATH_LEN
        )));
    }
    Ok(())
}

/// Iterates the non-empty segments of a path. Leading, trailing and repeated
/// separators produce no segments, so `/` yields nothing.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|segment| !segment.is_empty())
}

/// Splits `path` at its last separator into the parent path and final name.
/// A parent of `""` is the root.
pub fn split_parent(path: &str) -> Result<(&str, &str), FsError> {
    let trimmed = path.trim_end_matches(SEPARATOR);
    let at = trimmed.rfind(SEPARATOR).ok_or_else(|| {
        FsError::InvalidPath(format!("path \"{}\" names no parent directory", path))
    })?;
    let parent = &trimmed[..at];
    let name = &trimmed[at + 1..];
    Ok((if parent.is_empty() { "/" } else { parent }, name))
}

/// Checks that `name` can be stored as a directory entry name.
pub fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::InvalidPath(format!(
            "\"{}\" is not a valid entry name",
            name
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong(name.len()));
    }
    Ok(())
}
