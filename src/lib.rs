//! Kiss runtime - host for dynamically loaded plugins
//!
//! This library provides the core of the Kiss plugin host:
//! - A fixed-capacity capability registry mapping names to entry points
//! - The C capability table exchanged with plugins
//! - Loading, starting and unloading plugin libraries
//! - JSON configuration of the libraries to load
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Plugins                          │
//! │  blackboard  │  webinterface  │  skills  │  ...     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ summary / start / stop / run
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Plugin Manager                       │
//! │   Discovery  │  Manifests  │  Lifecycle             │
//! └────────────────────┬────────────────────────────────┘
//!                      │ RawCapabilities
//! ┌────────────────────▼────────────────────────────────┐
//! │               Capability Registry                    │
//! │   name → entry point (+ signature tag)              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod plugins;

pub use capability::{
    Capability, CapabilityRegistry, EntryPoint, Function, RawCapabilities, RegistryError,
};
pub use config::Config;
pub use error::{Error, Result};
pub use plugins::{HostCapabilities, PluginKind, PluginLibrary, PluginManager, PluginManifest};
