//! A loaded plugin library and its entry symbols
//!
//! Every plugin exports these C symbols:
//!
//! | Symbol    | Signature                                                   | Kind    |
//! |-----------|-------------------------------------------------------------|---------|
//! | `summary` | `fn() -> *const c_char` (NUL-terminated JSON manifest)      | all     |
//! | `start`   | `fn(*const RawCapabilities, *const c_char) -> c_int`        | service |
//! | `stop`    | `fn() -> c_int`                                             | service |
//! | `run`     | `fn(*const RawCapabilities, *const c_char) -> c_int`        | skill   |
//!
//! The second argument of `start`/`run` is the plugin's configured attributes
//! as a JSON object. Negative return codes signal failure.

#![allow(unsafe_code)]

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use libloading::{Library, Symbol};

use super::manifest::{PluginKind, PluginManifest};
use crate::capability::{Capability, CapabilityRegistry, RawCapabilities};
use crate::{Error, Result};

/// Symbol returning the plugin manifest
pub const SUMMARY_SYMBOL: &str = "summary";
/// Symbol starting a service
pub const START_SYMBOL: &str = "start";
/// Symbol stopping a service
pub const STOP_SYMBOL: &str = "stop";
/// Symbol running a skill
pub const RUN_SYMBOL: &str = "run";

type SummaryFn = unsafe extern "C" fn() -> *const c_char;
type EntryFn = unsafe extern "C" fn(*const RawCapabilities, *const c_char) -> c_int;
type StopFn = unsafe extern "C" fn() -> c_int;

/// A plugin library together with the capabilities it exports
///
/// The registry holds addresses inside `library`; the library is the last
/// field so it is unloaded only after everything pointing into it is gone.
#[derive(Debug)]
pub struct PluginLibrary {
    manifest: PluginManifest,
    path: PathBuf,
    attributes: CString,
    capabilities: CapabilityRegistry,
    started: AtomicBool,
    library: Library,
}

impl PluginLibrary {
    /// Load a library, read its manifest and resolve its capabilities
    ///
    /// # Errors
    ///
    /// Returns error if the library cannot be opened, has no valid manifest,
    /// lacks a declared entry symbol, or declares more capabilities than a
    /// registry holds
    pub fn open(path: &Path, attributes: Option<&serde_json::Value>) -> Result<Self> {
        // SAFETY: opening runs the library's initialisers. Plugin directories
        // are part of the host's trusted installation.
        let library = unsafe { Library::new(path) }?;
        let manifest = read_manifest(&library)?;
        let capabilities = collect_capabilities(&library, &manifest)?;
        let attributes = encode_attributes(attributes)?;

        tracing::info!(
            plugin = %manifest.name,
            version = %manifest.version,
            kind = %manifest.kind,
            capabilities = capabilities.len(),
            path = %path.display(),
            "loaded plugin library"
        );

        Ok(Self {
            manifest,
            path: path.to_path_buf(),
            attributes,
            capabilities,
            started: AtomicBool::new(false),
            library,
        })
    }

    /// Plugin name from the manifest
    #[must_use]
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Plugin version from the manifest
    #[must_use]
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Service or skill
    #[must_use]
    pub const fn kind(&self) -> PluginKind {
        self.manifest.kind
    }

    /// Names of the plugins this one requires
    #[must_use]
    pub fn requires(&self) -> &[String] {
        &self.manifest.requires
    }

    /// Full manifest
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Path the library was loaded from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Capabilities exported by this library
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Whether the service has been started and not yet stopped
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Start a service plugin with the capabilities it requires
    ///
    /// # Errors
    ///
    /// Returns error if the plugin is not a service, is already started, or
    /// its `start` symbol is missing or fails
    pub fn start(&self, capabilities: &CapabilityRegistry) -> Result<i32> {
        if self.kind() != PluginKind::Service {
            return Err(Error::Plugin(format!("'{}' is not a service", self.name())));
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Plugin(format!("'{}' is already started", self.name())));
        }

        let result = self.call_entry(START_SYMBOL, capabilities);
        if result.is_err() {
            self.started.store(false, Ordering::SeqCst);
        } else {
            tracing::info!(plugin = %self.name(), "service started");
        }
        result
    }

    /// Run a skill plugin once
    ///
    /// # Errors
    ///
    /// Returns error if the plugin is not a skill or its `run` symbol is
    /// missing or fails
    pub fn run(&self, capabilities: &CapabilityRegistry) -> Result<i32> {
        if self.kind() != PluginKind::Skill {
            return Err(Error::Plugin(format!("'{}' is not a skill", self.name())));
        }
        self.call_entry(RUN_SYMBOL, capabilities)
    }

    /// Stop a started service; a no-op otherwise
    ///
    /// # Errors
    ///
    /// Returns error if the `stop` symbol is missing or fails
    pub fn stop(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // SAFETY: `stop` has a fixed signature in the plugin ABI
        let code = unsafe {
            let stop: Symbol<StopFn> = self.library.get(STOP_SYMBOL.as_bytes())?;
            stop()
        };
        if code < 0 {
            return Err(Error::Plugin(format!(
                "'{STOP_SYMBOL}' of '{}' failed with code {code}",
                self.name()
            )));
        }

        tracing::info!(plugin = %self.name(), "service stopped");
        Ok(())
    }

    fn call_entry(&self, symbol: &str, capabilities: &CapabilityRegistry) -> Result<i32> {
        let table = capabilities.to_raw()?;

        tracing::debug!(
            plugin = %self.name(),
            symbol,
            capabilities = capabilities.len(),
            "calling plugin entry"
        );

        // SAFETY: `start`/`run` have a fixed signature in the plugin ABI; the
        // table and attribute string outlive the call.
        let code = unsafe {
            let entry: Symbol<EntryFn> = self.library.get(symbol.as_bytes())?;
            entry(&raw const *table, self.attributes.as_ptr())
        };

        if code < 0 {
            return Err(Error::Plugin(format!(
                "'{symbol}' of '{}' failed with code {code}",
                self.name()
            )));
        }
        Ok(code)
    }
}

impl Drop for PluginLibrary {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(plugin = %self.name(), error = %e, "service stop failed");
        }
        tracing::debug!(plugin = %self.name(), "unloading plugin library");
    }
}

/// Call `summary()` and parse the manifest it returns
fn read_manifest(library: &Library) -> Result<PluginManifest> {
    // SAFETY: `summary` has a fixed signature in the plugin ABI and returns a
    // pointer to static data inside the library, which is still loaded here.
    let json = unsafe {
        let summary: Symbol<SummaryFn> = library.get(SUMMARY_SYMBOL.as_bytes())?;
        let ptr = summary();
        if ptr.is_null() {
            return Err(Error::Manifest(format!("'{SUMMARY_SYMBOL}' returned null")));
        }
        CStr::from_ptr(ptr)
            .to_str()
            .map_err(|e| Error::Manifest(format!("manifest is not UTF-8: {e}")))?
            .to_string()
    };

    PluginManifest::from_json(&json)
}

/// Resolve every declared entry symbol into a registry
fn collect_capabilities(library: &Library, manifest: &PluginManifest) -> Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();

    for provided in &manifest.provides {
        // SAFETY: the address is only stored, never dereferenced here
        let address: *const c_void = unsafe {
            let symbol: Symbol<*const c_void> =
                library.get(provided.entry.as_bytes()).map_err(|e| {
                    Error::Plugin(format!(
                        "entry '{}' of capability '{}' not found in '{}': {e}",
                        provided.entry, provided.capability, manifest.name
                    ))
                })?;
            *symbol
        };

        let capability =
            Capability::new(&provided.capability, address, provided.signature.as_deref())?;
        registry.insert(capability)?;

        tracing::trace!(
            plugin = %manifest.name,
            capability = %provided.capability,
            entry = %provided.entry,
            "resolved capability"
        );
    }

    Ok(registry)
}

/// Serialize configured attributes into the string handed to plugins
fn encode_attributes(attributes: Option<&serde_json::Value>) -> Result<CString> {
    let json = attributes.map_or_else(|| Ok("{}".to_string()), serde_json::to_string)?;
    CString::new(json).map_err(|e| Error::Config(format!("attributes contain NUL: {e}")))
}
