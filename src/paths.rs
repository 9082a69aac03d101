//! Search-path expansion and writable folder resolution.
//!
//! Path strings come from configuration in the usual list notation (entries
//! joined by the platform separator) and may contain `~` and `${name}`
//! placeholders. Expansion happens before splitting so a variable may itself
//! hold several entries.

use crate::config::ConfigProvider;
use crate::error::{DataError, WritableDirError};
use std::env;
use std::path::{Path, PathBuf};

/// Expand `~` and `${name}` placeholders in a configured path string.
///
/// `${name}` is looked up in the provider's variable table first, then in the
/// process environment. An unknown variable is an error rather than an empty
/// substitution so a typo cannot silently point a search path at `/`.
pub fn expand_path(raw: &str, config: &dyn ConfigProvider) -> Result<String, DataError> {
    let home = dirs::home_dir().map(|dir| dir.to_string_lossy().into_owned());
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(ch) = rest.chars().next() {
        if ch == '~' {
            if let Some(home) = home.as_deref() {
                expanded.push_str(home);
                rest = &rest[1..];
                continue;
            }
        }

        if let Some(after) = rest.strip_prefix("${") {
            if let Some(end) = after.find('}') {
                let token = &after[..end];
                let value = config
                    .variable(token)
                    .or_else(|| env::var(token).ok())
                    .ok_or_else(|| DataError::Expand {
                        token: token.to_string(),
                    })?;
                expanded.push_str(&value);
                rest = &after[end + 1..];
                continue;
            }
        }

        expanded.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    Ok(expanded)
}

/// Split an already expanded path string into directories.
///
/// Order is preserved, empty segments are dropped and a directory listed
/// twice keeps only its first position.
pub fn parse_path_list(expanded: &str) -> Vec<PathBuf> {
    if expanded.trim().is_empty() {
        return Vec::new();
    }
    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in env::split_paths(expanded) {
        if dir.as_os_str().is_empty() || dirs.contains(&dir) {
            continue;
        }
        dirs.push(dir);
    }
    dirs
}

/// Expand then split a configured path string; `None` or empty input yields
/// an empty list.
pub fn expand_and_parse(
    raw: Option<&str>,
    config: &dyn ConfigProvider,
) -> Result<Vec<PathBuf>, DataError> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(parse_path_list(&expand_path(raw, config)?)),
        _ => Ok(Vec::new()),
    }
}

/// Pick the folder new data should be written to.
///
/// Walks `writable` in order and returns the first entry that is also listed
/// in `full` and exists as a directory. Configuration drift gets a specific
/// error: an empty writable list, a writable list that shares nothing with the
/// search path, or matching folders that are all missing on disk.
pub fn resolve_writable_dir(
    full: &[PathBuf],
    writable: &[PathBuf],
) -> Result<PathBuf, WritableDirError> {
    if writable.is_empty() {
        return Err(WritableDirError::NotConfigured);
    }

    let mut missing: Option<&PathBuf> = None;
    for candidate in writable {
        let Some(found) = full.iter().find(|dir| *dir == candidate) else {
            continue;
        };
        if found.is_dir() {
            return Ok(found.clone());
        }
        tracing::debug!("writable folder {} does not exist", found.display());
        missing = Some(found);
    }

    match missing {
        Some(dir) => Err(WritableDirError::Missing(dir.clone())),
        None => Err(WritableDirError::NotInSearchPath),
    }
}

/// Whether `dir` lies inside one of the writable folders.
pub fn is_dir_writable(dir: &Path, writable: &[PathBuf]) -> bool {
    writable.iter().any(|root| dir.starts_with(root))
}
