//! C layout of a capability registry
//!
//! This is the binary contract between the host and plugin modules. The host
//! passes a `*const RawCapabilities` to a plugin's `start`/`run` symbol; the
//! pointer is only valid for the duration of that call.
//!
//! Equivalent C declaration:
//!
//! ```c
//! #define CAPABILITY_NAME_LEN        257  /* 256 bytes + NUL */
//! #define CAPABILITY_SIGNATURE_LEN   65   /* 64 bytes + NUL */
//! #define CAPABILITY_TABLE_LEN       20
//!
//! typedef struct {
//!     char name[CAPABILITY_NAME_LEN];
//!     char signature[CAPABILITY_SIGNATURE_LEN];  /* empty when untagged */
//!     const void* function;
//! } Capability;
//!
//! typedef struct {
//!     uint32_t abi_version;
//!     Capability capability[CAPABILITY_TABLE_LEN];
//!     int n_capabilities;
//! } Capabilities;
//! ```

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_void};

use super::registry::CapabilityRegistry;
use super::types::{Capability, RegistryError};
use super::{ABI_VERSION, DEFAULT_CAPACITY, MAX_NAME_LEN, MAX_SIGNATURE_LEN};

/// Name buffer length, including the NUL terminator
pub const RAW_NAME_LEN: usize = MAX_NAME_LEN + 1;

/// Signature buffer length, including the NUL terminator
pub const RAW_SIGNATURE_LEN: usize = MAX_SIGNATURE_LEN + 1;

/// Number of slots in a C table
pub const RAW_CAPACITY: usize = DEFAULT_CAPACITY;

/// One slot of the C table
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawCapability {
    /// NUL-terminated name
    pub name: [c_char; RAW_NAME_LEN],
    /// NUL-terminated signature tag, empty when untagged
    pub signature: [c_char; RAW_SIGNATURE_LEN],
    /// Entry point
    pub function: *const c_void,
}

impl RawCapability {
    /// Unoccupied slot
    pub const EMPTY: Self = Self {
        name: [0; RAW_NAME_LEN],
        signature: [0; RAW_SIGNATURE_LEN],
        function: std::ptr::null(),
    };

    fn from_capability(capability: &Capability) -> Self {
        let mut raw = Self::EMPTY;
        write_c_str(&mut raw.name, capability.name());
        if let Some(signature) = capability.signature() {
            write_c_str(&mut raw.signature, signature.as_str());
        }
        raw.function = capability.entry_point().as_ptr();
        raw
    }
}

/// C table handed to plugins
#[repr(C)]
pub struct RawCapabilities {
    /// Layout version, always [`ABI_VERSION`] when written by this crate
    pub abi_version: u32,
    /// Slots; only the first `n_capabilities` are occupied
    pub capability: [RawCapability; RAW_CAPACITY],
    /// Number of occupied slots
    pub n_capabilities: c_int,
}

impl RawCapabilities {
    /// Allocate an empty table
    #[must_use]
    pub fn empty() -> Box<Self> {
        Box::new(Self {
            abi_version: ABI_VERSION,
            capability: [RawCapability::EMPTY; RAW_CAPACITY],
            n_capabilities: 0,
        })
    }
}

/// Copy `value` into a zeroed buffer, leaving room for the terminator
///
/// Callers only pass validated names and tags, which always fit.
fn write_c_str(buf: &mut [c_char], value: &str) {
    debug_assert!(value.len() < buf.len());
    for (slot, byte) in buf.iter_mut().zip(value.bytes()) {
        *slot = byte as c_char;
    }
}

/// Read a NUL-terminated string out of a fixed buffer
fn read_c_str(buf: &[c_char], field: &str, slot: usize) -> Result<String, RegistryError> {
    let end = buf.iter().position(|&c| c == 0).ok_or_else(|| {
        RegistryError::CorruptTable(format!("{field} in slot {slot} is not NUL-terminated"))
    })?;
    let bytes: Vec<u8> = buf[..end].iter().map(|&c| c as u8).collect();

    String::from_utf8(bytes).map_err(|_| {
        RegistryError::CorruptTable(format!("{field} in slot {slot} is not valid UTF-8"))
    })
}

impl<const N: usize> CapabilityRegistry<N> {
    /// Write the registry into a C table
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if the registry holds more entries than a C
    /// table has slots
    pub fn to_raw(&self) -> Result<Box<RawCapabilities>, RegistryError> {
        if self.len() > RAW_CAPACITY {
            return Err(RegistryError::CapacityExceeded {
                capacity: RAW_CAPACITY,
            });
        }

        let mut raw = RawCapabilities::empty();
        for (slot, capability) in raw.capability.iter_mut().zip(self.iter()) {
            *slot = RawCapability::from_capability(capability);
        }
        // Bounded by RAW_CAPACITY above
        raw.n_capabilities = c_int::try_from(self.len()).unwrap_or(c_int::MAX);

        Ok(raw)
    }

    /// Rebuild a registry from a C table
    ///
    /// Every occupied slot goes through normal registration, so null entry
    /// points and duplicate names are rejected as they would be in Rust.
    ///
    /// # Errors
    ///
    /// Returns `CorruptTable` for a null table, an out-of-range count or an
    /// unreadable string, `AbiMismatch` for a foreign layout version, and any
    /// registration error raised by the occupied slots
    ///
    /// # Safety
    ///
    /// `raw` must be null or point to a readable `RawCapabilities`
    pub unsafe fn from_raw(raw: *const RawCapabilities) -> Result<Self, RegistryError> {
        // SAFETY: caller guarantees `raw` is null or valid for reads
        let Some(raw) = (unsafe { raw.as_ref() }) else {
            return Err(RegistryError::CorruptTable("table pointer is null".to_string()));
        };

        if raw.abi_version != ABI_VERSION {
            return Err(RegistryError::AbiMismatch {
                expected: ABI_VERSION,
                found: raw.abi_version,
            });
        }

        let count = usize::try_from(raw.n_capabilities)
            .ok()
            .filter(|&n| n <= RAW_CAPACITY)
            .ok_or_else(|| {
                RegistryError::CorruptTable(format!(
                    "capability count {} outside 0..={RAW_CAPACITY}",
                    raw.n_capabilities
                ))
            })?;

        let mut registry = Self::new();
        for (slot, entry) in raw.capability[..count].iter().enumerate() {
            let name = read_c_str(&entry.name, "name", slot)?;
            let signature = read_c_str(&entry.signature, "signature", slot)?;
            let signature = (!signature.is_empty()).then_some(signature.as_str());

            registry.insert(Capability::new(&name, entry.function, signature)?)?;
        }

        Ok(registry)
    }
}
