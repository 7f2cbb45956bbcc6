//! JSON runtime configuration file
//!
//! The host is started with the path of a JSON document listing the plugin
//! libraries to load, in order:
//!
//! ```json
//! {
//!     "plugin_dir": "plugins/debug",
//!     "libraries": [
//!         { "name": "blackboard" },
//!         { "name": "webinterface", "attributes": { "port": 8080 } }
//!     ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level configuration file schema
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RuntimeConfigFile {
    /// Directory holding plugin libraries, relative to the config file
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    /// Libraries to load, in load order
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
}

/// One plugin library to load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Package name; used to derive the library file name
    pub name: String,

    /// Explicit library path, overriding the conventional file name
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Free-form attributes handed to the plugin as JSON
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

/// Read and parse a configuration file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid JSON
pub fn load_config_file(path: &Path) -> Result<RuntimeConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: RuntimeConfigFile = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    tracing::info!(
        path = %path.display(),
        libraries = config.libraries.len(),
        "loaded config file"
    );

    Ok(config)
}

/// Return the default config file path: `~/.config/kiss/runtime.json`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("kiss").join("runtime.json"))
}
