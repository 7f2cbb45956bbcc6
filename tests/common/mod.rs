//! Shared test utilities
//!
//! Plugin fixtures under `tests/fixtures` are compiled once per test binary
//! with `rustc` and copied into a fresh directory for each test, so every
//! test gets its own library instance and state.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use kiss_runtime::plugins::library_file_name;
use tempfile::TempDir;

/// Plugin fixtures: (plugin name, source file)
const FIXTURES: &[(&str, &str)] = &[
    ("calc", "calc_service.rs"),
    ("echo", "echo_skill.rs"),
    ("watch", "watch_service.rs"),
    ("wide", "wide_skill.rs"),
];

static BUILD_DIR: OnceLock<TempDir> = OnceLock::new();

/// Directory holding the compiled fixtures
fn build_dir() -> &'static Path {
    BUILD_DIR
        .get_or_init(|| {
            let dir = tempfile::tempdir().expect("failed to create build dir");
            let sources = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
            let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

            for (name, source) in FIXTURES {
                let status = Command::new(&rustc)
                    .args(["--crate-type", "cdylib", "--edition", "2021", "-O"])
                    .args(["--crate-name", name])
                    .arg("-o")
                    .arg(dir.path().join(library_file_name(name)))
                    .arg(sources.join(source))
                    .status()
                    .expect("failed to run rustc");
                assert!(status.success(), "failed to compile fixture {source}");
            }

            dir
        })
        .path()
}

/// Copy the named fixtures into a new plugin directory
pub fn plugin_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().expect("failed to create plugin dir");
    for name in names {
        stage(dir.path(), name);
    }
    dir
}

/// Copy one fixture into `dir`, returning its path
pub fn stage(dir: &Path, name: &str) -> PathBuf {
    let file = library_file_name(name);
    let target = dir.join(&file);
    std::fs::copy(build_dir().join(&file), &target).expect("failed to stage fixture");
    target
}
