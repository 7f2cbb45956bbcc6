//! Configuration management for the Kiss runtime

pub mod file;

use std::path::{Path, PathBuf};

pub use file::{LibraryEntry, RuntimeConfigFile};

use crate::Result;
use crate::plugins::default_plugin_dir;

/// Environment variable overriding the plugin directory
pub const PLUGIN_DIR_ENV: &str = "KISS_PLUGIN_DIR";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the configuration file this was loaded from
    pub config_path: PathBuf,

    /// Directory searched for plugin libraries
    pub plugin_dir: PathBuf,

    /// Libraries to load, in order; empty means everything in `plugin_dir`
    pub libraries: Vec<LibraryEntry>,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Priority for the plugin directory: `KISS_PLUGIN_DIR` → file → default
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        let env_plugin_dir = std::env::var_os(PLUGIN_DIR_ENV).map(PathBuf::from);

        Ok(Self::resolve(path, fc, env_plugin_dir))
    }

    /// Resolve a parsed file against its location and an optional override
    ///
    /// Relative paths in the file are taken relative to the file's directory.
    #[must_use]
    pub fn resolve(
        path: &Path,
        fc: RuntimeConfigFile,
        env_plugin_dir: Option<PathBuf>,
    ) -> Self {
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let plugin_dir = env_plugin_dir
            .or_else(|| fc.plugin_dir.map(|dir| base.join(dir)))
            .unwrap_or_else(|| default_plugin_dir(base));

        let libraries = fc
            .libraries
            .into_iter()
            .map(|mut entry| {
                entry.path = entry.path.map(|p| base.join(p));
                entry
            })
            .collect();

        tracing::debug!(
            config = %path.display(),
            plugin_dir = %plugin_dir.display(),
            "resolved configuration"
        );

        Self {
            config_path: path.to_path_buf(),
            plugin_dir,
            libraries,
        }
    }
}
