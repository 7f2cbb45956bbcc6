//! Plugin system for the Kiss runtime
//!
//! Plugins are shared libraries exporting a JSON manifest through
//! `summary()` plus the entry symbols named in it. Services are started once
//! and stopped on unload; skills run on demand. Each plugin receives the
//! capabilities of the plugins it requires as a C capability table.

pub mod discovery;
pub mod library;
pub mod loader;
pub mod manifest;

pub use discovery::{
    build_profile, default_plugin_dir, discover_libraries, library_file_name,
    resolve_library_path,
};
pub use library::PluginLibrary;
pub use loader::{CapabilityInfo, HostCapabilities, PluginHandle, PluginManager};
pub use manifest::{PluginKind, PluginManifest, ProvidedCapability};
