//! Plugin manifest format
//!
//! Every plugin library exports `summary()`, returning a NUL-terminated JSON
//! document that describes the plugin and the capabilities it provides.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::capability::{ABI_VERSION, CapabilityName, RegistryError, Signature};
use crate::{Error, Result};

/// Plugin manifest describing a library's metadata and capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name (e.g. "blackboard")
    pub name: String,
    /// Semver version string
    pub version: String,
    /// Short description
    #[serde(default, alias = "summary")]
    pub description: Option<String>,
    /// What kind of plugin this is
    #[serde(default, alias = "library_type")]
    pub kind: PluginKind,
    /// Capability table layout the plugin was built against
    #[serde(default = "default_abi_version")]
    pub abi_version: u32,
    /// Capabilities exported by the library
    #[serde(default)]
    pub provides: Vec<ProvidedCapability>,
    /// Plugins whose capabilities this one needs at start
    #[serde(default)]
    pub requires: Vec<String>,
}

const fn default_abi_version() -> u32 {
    ABI_VERSION
}

/// Plugin category
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Long-running background service with `start`/`stop`
    #[serde(alias = "Service")]
    Service,
    /// One-shot unit of work invoked through `run`
    #[default]
    #[serde(alias = "Skill")]
    Skill,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service => write!(f, "service"),
            Self::Skill => write!(f, "skill"),
        }
    }
}

/// Capability declared in a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvidedCapability {
    /// Capability name exposed to the host
    pub capability: String,
    /// Exported symbol implementing it
    pub entry: String,
    /// Declared calling convention, e.g. `fn(*const c_char) -> c_int`
    #[serde(default)]
    pub signature: Option<String>,
}

impl PluginManifest {
    /// Parse and validate a manifest
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the manifest is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| Error::Manifest(format!("failed to parse manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the manifest against the host's ABI and naming rules
    ///
    /// # Errors
    ///
    /// Returns error on an empty name, a foreign ABI version (`AbiMismatch`),
    /// an invalid capability name or signature, or a capability declared twice
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Manifest("plugin name is empty".to_string()));
        }

        if self.abi_version != ABI_VERSION {
            return Err(RegistryError::AbiMismatch {
                expected: ABI_VERSION,
                found: self.abi_version,
            }
            .into());
        }

        let mut seen = HashSet::new();
        for provided in &self.provides {
            CapabilityName::new(&provided.capability)?;
            if let Some(signature) = &provided.signature {
                Signature::new(signature)?;
            }
            if provided.entry.is_empty() {
                return Err(Error::Manifest(format!(
                    "capability '{}' has no entry symbol",
                    provided.capability
                )));
            }
            if !seen.insert(provided.capability.as_str()) {
                return Err(Error::Manifest(format!(
                    "capability '{}' declared twice in '{}'",
                    provided.capability, self.name
                )));
            }
        }

        Ok(())
    }
}
