//! Error types for the Kiss runtime

use thiserror::Error;

use crate::capability::RegistryError;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while hosting plugins
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Capability registry error
    #[error("capability error: {0}")]
    Registry(#[from] RegistryError),

    /// Dynamic loader error (open, symbol lookup, close)
    #[error("library error: {0}")]
    Library(#[from] libloading::Error),

    /// Plugin manifest is missing or malformed
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Plugin entry point reported a failure
    #[error("plugin error: {0}")]
    Plugin(String),

    /// A plugin with the same manifest name is already loaded
    #[error("plugin already loaded: {0}")]
    PluginAlreadyLoaded(String),

    /// Unload refused because handles to the plugin are still held
    #[error("plugin '{name}' is still in use ({handles} outstanding handles)")]
    PluginInUse {
        /// Plugin name
        name: String,
        /// Handles held outside the manager
        handles: usize,
    },

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
