//! Plugin discovery - locate shared libraries on disk

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};

use crate::config::LibraryEntry;

/// Build profile the host was compiled with, matching the staging layout
#[must_use]
pub const fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

/// Platform file name for a plugin package
///
/// Cargo replaces `-` with `_` in library artifact names, e.g.
/// `web-interface` becomes `libweb_interface.so` on Linux.
#[must_use]
pub fn library_file_name(package: &str) -> String {
    format!("{DLL_PREFIX}{}{DLL_SUFFIX}", package.replace('-', "_"))
}

/// Default plugin directory below `base`: `plugins/<profile>`
#[must_use]
pub fn default_plugin_dir(base: &Path) -> PathBuf {
    base.join("plugins").join(build_profile())
}

/// Library path for a configured entry
///
/// An explicit path wins; otherwise the conventional file name inside
/// `plugin_dir` is used.
#[must_use]
pub fn resolve_library_path(entry: &LibraryEntry, plugin_dir: &Path) -> PathBuf {
    entry
        .path
        .clone()
        .unwrap_or_else(|| plugin_dir.join(library_file_name(&entry.name)))
}

/// Scan a directory for shared libraries
///
/// Returns paths sorted by file name so load order is stable across runs.
#[must_use]
pub fn discover_libraries(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::debug!(path = %dir.display(), "plugin directory does not exist, skipping");
        return Vec::new();
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(path = %dir.display(), "failed to read plugin directory");
        return Vec::new();
    };

    let mut libraries: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_library(path))
        .collect();
    libraries.sort();

    tracing::debug!(
        path = %dir.display(),
        count = libraries.len(),
        "discovered plugin libraries"
    );

    libraries
}

fn is_library(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(DLL_PREFIX) && name.ends_with(DLL_SUFFIX))
}
