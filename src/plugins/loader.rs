//! Plugin loader and lifecycle manager

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::discovery::{discover_libraries, resolve_library_path};
use super::library::PluginLibrary;
use super::manifest::PluginKind;
use crate::capability::{CapabilityRegistry, RegistryError};
use crate::config::LibraryEntry;
use crate::{Error, Result};

/// Reference-counted handle to a loaded plugin
///
/// While any handle is alive the manager refuses to unload the plugin.
pub type PluginHandle = Arc<PluginLibrary>;

/// Capabilities gathered from several plugins
///
/// Keeps a handle to every contributing plugin, so the entry points stay
/// valid for as long as this value lives.
#[derive(Debug, Default)]
pub struct HostCapabilities {
    registry: CapabilityRegistry,
    providers: Vec<PluginHandle>,
}

impl HostCapabilities {
    /// Aggregated registry
    #[must_use]
    pub const fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Names of the plugins that contributed capabilities
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    /// Copy a provider's capabilities into the aggregate
    ///
    /// The first provider of a name wins; clashes and overflow are logged and
    /// skipped. Returns the number of capabilities taken.
    fn absorb(&mut self, plugin: &str, capabilities: &CapabilityRegistry) -> usize {
        let mut taken = 0;

        for capability in capabilities {
            match self.registry.insert(capability.clone()) {
                Ok(()) => taken += 1,
                Err(RegistryError::DuplicateName(name)) => {
                    tracing::warn!(
                        plugin = %plugin,
                        capability = %name,
                        "capability already provided, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        plugin = %plugin,
                        capability = %capability.name(),
                        error = %e,
                        "capability dropped"
                    );
                }
            }
        }

        taken
    }

    /// Number of handles this aggregate holds on `plugin`
    fn holds(&self, plugin: &PluginHandle) -> usize {
        self.providers
            .iter()
            .filter(|p| Arc::ptr_eq(p, plugin))
            .count()
    }
}

impl Deref for HostCapabilities {
    type Target = CapabilityRegistry;

    fn deref(&self) -> &CapabilityRegistry {
        &self.registry
    }
}

/// One row of a capability listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CapabilityInfo {
    /// Plugin providing the capability
    pub plugin: String,
    /// Capability name
    pub capability: String,
    /// Declared signature, if any
    pub signature: Option<String>,
}

/// A service started by the manager and the capabilities it was given
///
/// Services may keep entry points from their table, so the providers stay
/// pinned until the service is stopped.
#[derive(Debug)]
struct RunningService {
    plugin: PluginHandle,
    capabilities: HostCapabilities,
}

impl RunningService {
    /// Handles this entry holds on `plugin`
    fn holds(&self, plugin: &PluginHandle) -> usize {
        usize::from(Arc::ptr_eq(&self.plugin, plugin)) + self.capabilities.holds(plugin)
    }
}

/// Manage loaded plugin libraries
///
/// Plugins are kept in load order. Dropping the manager stops running
/// services in reverse start order, then releases plugins in reverse load
/// order.
#[derive(Debug, Default)]
pub struct PluginManager {
    plugins: Vec<PluginHandle>,
    running: Vec<RunningService>,
}

impl PluginManager {
    /// Create a new empty plugin manager
    #[must_use]
    pub const fn new() -> Self {
        Self {
            plugins: Vec::new(),
            running: Vec::new(),
        }
    }

    /// Load one library
    ///
    /// Returns the plugin name from its manifest
    ///
    /// # Errors
    ///
    /// Returns error if the library fails to load or a plugin with the same
    /// name is already loaded
    pub fn load(&mut self, path: &Path, attributes: Option<&serde_json::Value>) -> Result<String> {
        let library = PluginLibrary::open(path, attributes)?;
        let name = library.name().to_string();

        if self.get(&name).is_some() {
            return Err(Error::PluginAlreadyLoaded(name));
        }

        self.plugins.push(Arc::new(library));
        Ok(name)
    }

    /// Load configured libraries in order
    ///
    /// Failures and duplicates are logged and skipped. Returns the names of
    /// all newly loaded plugins.
    pub fn load_all(&mut self, entries: &[LibraryEntry], plugin_dir: &Path) -> Vec<String> {
        let mut loaded = Vec::new();

        for entry in entries {
            let path = resolve_library_path(entry, plugin_dir);
            tracing::debug!(
                library = %entry.name,
                path = %path.display(),
                "loading library"
            );

            match self.load(&path, entry.attributes.as_ref()) {
                Ok(name) => loaded.push(name),
                Err(Error::PluginAlreadyLoaded(name)) => {
                    tracing::warn!(plugin = %name, "plugin already loaded, skipping");
                }
                Err(e) => {
                    tracing::warn!(
                        library = %entry.name,
                        path = %path.display(),
                        error = %e,
                        "failed to load library"
                    );
                }
            }
        }

        loaded
    }

    /// Load every library found in a directory
    ///
    /// Returns the names of all newly loaded plugins.
    pub fn load_dir(&mut self, dir: &Path) -> Vec<String> {
        let entries: Vec<LibraryEntry> = discover_libraries(dir)
            .into_iter()
            .map(|path| LibraryEntry {
                name: library_stem(&path),
                path: Some(path),
                attributes: None,
            })
            .collect();

        self.load_all(&entries, dir)
    }

    /// Get a handle to a plugin by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<PluginHandle> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    /// List loaded plugins in load order
    #[must_use]
    pub fn list(&self) -> Vec<&PluginLibrary> {
        self.plugins.iter().map(AsRef::as_ref).collect()
    }

    /// Collect capabilities of the required plugins into one registry
    ///
    /// Missing plugins, name clashes and overflow are logged and skipped.
    #[must_use]
    pub fn capabilities_for(&self, requires: &[String]) -> HostCapabilities {
        let mut host = HostCapabilities::default();

        for required in requires {
            let Some(plugin) = self.get(required) else {
                tracing::warn!(plugin = %required, "required plugin not loaded");
                continue;
            };

            host.absorb(plugin.name(), plugin.capabilities());

            if !host.providers.iter().any(|p| Arc::ptr_eq(p, &plugin)) {
                host.providers.push(plugin);
            }
        }

        host
    }

    /// Start every service plugin in load order
    ///
    /// Each service's required plugins stay pinned until it is stopped.
    /// Returns the number of services started
    ///
    /// # Errors
    ///
    /// Returns the first service failure; services started before it keep
    /// running
    pub fn start_services(&mut self) -> Result<usize> {
        let mut started = 0;

        for index in 0..self.plugins.len() {
            let plugin = Arc::clone(&self.plugins[index]);
            if plugin.kind() != PluginKind::Service || plugin.is_started() {
                continue;
            }

            let capabilities = self.capabilities_for(plugin.requires());
            plugin.start(&capabilities)?;
            self.running.push(RunningService {
                plugin,
                capabilities,
            });
            started += 1;
        }

        Ok(started)
    }

    /// Run a skill plugin once with the capabilities it requires
    ///
    /// # Errors
    ///
    /// Returns error if the plugin is not loaded, is not a skill, or fails
    pub fn run_skill(&self, name: &str) -> Result<i32> {
        let plugin = self
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("plugin '{name}'")))?;

        let capabilities = self.capabilities_for(plugin.requires());
        plugin.run(&capabilities)
    }

    /// Unload a plugin, stopping it first if it is a running service
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no plugin has this name, `PluginInUse` while
    /// other handles to it exist (including running services that require
    /// it), or the service's stop failure, in which case the plugin stays
    /// loaded
    pub fn unload(&mut self, name: &str) -> Result<()> {
        let index = self
            .plugins
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| Error::NotFound(format!("plugin '{name}'")))?;
        let plugin = Arc::clone(&self.plugins[index]);

        // Services stopped through their own handle release their providers
        self.running.retain(|s| s.plugin.is_started());

        // Its own running entry does not count; the local clone and the
        // manager's slot are the two subtracted below
        let own = self
            .running
            .iter()
            .filter(|s| Arc::ptr_eq(&s.plugin, &plugin))
            .map(|s| s.holds(&plugin))
            .sum::<usize>();
        let handles = Arc::strong_count(&plugin) - 2 - own;
        if handles > 0 {
            return Err(Error::PluginInUse {
                name: name.to_string(),
                handles,
            });
        }

        plugin.stop()?;
        self.running.retain(|s| !Arc::ptr_eq(&s.plugin, &plugin));
        self.plugins.remove(index);
        tracing::info!(plugin = %name, "plugin unloaded");

        Ok(())
    }

    /// Every capability of every loaded plugin, in load order
    #[must_use]
    pub fn capability_infos(&self) -> Vec<CapabilityInfo> {
        self.plugins
            .iter()
            .flat_map(|p| {
                p.capabilities().iter().map(move |cap| CapabilityInfo {
                    plugin: p.name().to_string(),
                    capability: cap.name().to_string(),
                    signature: cap.signature().map(ToString::to_string),
                })
            })
            .collect()
    }

    /// Number of loaded plugins
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        while let Some(service) = self.running.pop() {
            if let Err(e) = service.plugin.stop() {
                tracing::warn!(plugin = %service.plugin.name(), error = %e, "service stop failed");
            }
        }
        while let Some(plugin) = self.plugins.pop() {
            tracing::debug!(plugin = %plugin.name(), "releasing plugin");
        }
    }
}

/// Package-ish name for a library path, used in log messages
fn library_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_prefix(std::env::consts::DLL_PREFIX)
        .filter(|s| !s.is_empty())
        .unwrap_or(stem)
        .to_string()
}
