//! Capability value types and registry errors

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use serde::Serialize;
use thiserror::Error;

use super::{MAX_NAME_LEN, MAX_SIGNATURE_LEN};

/// Errors produced by capability registration, lookup and table exchange
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Registry already holds its maximum number of entries
    #[error("registry is full ({capacity} capabilities)")]
    CapacityExceeded {
        /// Registry capacity
        capacity: usize,
    },

    /// A capability with this name is already registered
    #[error("capability '{0}' is already registered")]
    DuplicateName(String),

    /// Name is empty, too long or not representable in the C table
    #[error("invalid capability name: {0}")]
    InvalidName(String),

    /// Signature tag is empty, too long or not representable in the C table
    #[error("invalid signature tag: {0}")]
    InvalidSignature(String),

    /// Entry point is null
    #[error("capability '{0}' has a null entry point")]
    InvalidEntryPoint(String),

    /// No capability with this name
    #[error("capability '{0}' not found")]
    NotFound(String),

    /// Caller expects a different calling convention than the one declared
    #[error("capability '{name}' is declared as `{declared}`, caller expects `{expected}`")]
    SignatureMismatch {
        /// Capability name
        name: String,
        /// Signature the caller asked for
        expected: String,
        /// Signature declared at registration
        declared: String,
    },

    /// Table or manifest was produced for another ABI version
    #[error("ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch {
        /// Version this host speaks
        expected: u32,
        /// Version found
        found: u32,
    },

    /// C table violates its own invariants
    #[error("corrupt capability table: {0}")]
    CorruptTable(String),
}

/// Validate a bounded identifier shared by names and signature tags
fn check_bounded(kind: &str, value: &str, max: usize) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} is empty"));
    }
    if value.len() > max {
        return Err(format!("{kind} is {} bytes, maximum is {max}", value.len()));
    }
    if value.as_bytes().contains(&0) {
        return Err(format!("{kind} contains a NUL byte"));
    }
    Ok(())
}

/// Validated capability name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CapabilityName(String);

impl CapabilityName {
    /// Validate and wrap a capability name
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if the name is empty, longer than
    /// [`MAX_NAME_LEN`] bytes or contains a NUL byte
    pub fn new(name: &str) -> Result<Self, RegistryError> {
        check_bounded("name", name, MAX_NAME_LEN).map_err(RegistryError::InvalidName)?;
        Ok(Self(name.to_string()))
    }

    /// Name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared calling convention of a capability, e.g. `fn(u32) -> u32`
///
/// Tags are compared byte for byte. They are a naming convention shared by
/// the plugin and its callers, not a parsed type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Validate and wrap a signature tag
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` if the tag is empty, longer than
    /// [`MAX_SIGNATURE_LEN`] bytes or contains a NUL byte
    pub fn new(tag: &str) -> Result<Self, RegistryError> {
        check_bounded("signature", tag, MAX_SIGNATURE_LEN)
            .map_err(RegistryError::InvalidSignature)?;
        Ok(Self(tag.to_string()))
    }

    /// Tag as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-null address of code exported by a plugin module
///
/// The registry does not own the code. An entry point is valid only while the
/// module that defines it stays loaded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryPoint(NonNull<c_void>);

// SAFETY: an entry point is the address of immutable code. Sharing the address
// between threads is sound; calling through it is governed by `Function`.
#[allow(unsafe_code)]
unsafe impl Send for EntryPoint {}
#[allow(unsafe_code)]
unsafe impl Sync for EntryPoint {}

impl EntryPoint {
    /// Wrap a code address, returning `None` for null
    #[must_use]
    pub fn new(ptr: *const c_void) -> Option<Self> {
        NonNull::new(ptr.cast_mut()).map(Self)
    }

    /// Raw address
    #[must_use]
    pub const fn as_ptr(self) -> *const c_void {
        self.0.as_ptr().cast_const()
    }

    /// Reinterpret the address as a function pointer type `F`
    ///
    /// # Safety
    ///
    /// `F` must be the exact function pointer type the code was compiled
    /// with, and the defining module must remain loaded while the returned
    /// value is used.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn cast<F: Copy>(self) -> F {
        const {
            assert!(
                size_of::<F>() == size_of::<*const c_void>(),
                "capability functions must be pointer-sized"
            );
        }
        // SAFETY: sizes match (checked above); the caller guarantees `F` is
        // the function pointer type behind this address.
        unsafe { std::mem::transmute_copy::<NonNull<c_void>, F>(&self.0) }
    }
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryPoint({:p})", self.0)
    }
}

/// A named entry point with an optional declared signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    name: CapabilityName,
    entry: EntryPoint,
    signature: Option<Signature>,
}

impl Capability {
    /// Build a capability, validating every part
    ///
    /// # Errors
    ///
    /// Returns `InvalidName`, `InvalidSignature` or `InvalidEntryPoint`
    pub fn new(
        name: &str,
        entry: *const c_void,
        signature: Option<&str>,
    ) -> Result<Self, RegistryError> {
        let name = CapabilityName::new(name)?;
        let signature = signature.map(Signature::new).transpose()?;
        let entry = EntryPoint::new(entry)
            .ok_or_else(|| RegistryError::InvalidEntryPoint(name.to_string()))?;

        Ok(Self {
            name,
            entry,
            signature,
        })
    }

    /// Capability name
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Entry point
    #[must_use]
    pub const fn entry_point(&self) -> EntryPoint {
        self.entry
    }

    /// Declared signature, if any
    #[must_use]
    pub const fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Check a caller's expected signature against the declared one
    ///
    /// Untagged capabilities accept any expectation.
    ///
    /// # Errors
    ///
    /// Returns `SignatureMismatch` when a declared tag differs from `expected`
    pub fn check_signature(&self, expected: &str) -> Result<(), RegistryError> {
        match &self.signature {
            Some(declared) if declared.as_str() != expected => {
                Err(RegistryError::SignatureMismatch {
                    name: self.name.to_string(),
                    expected: expected.to_string(),
                    declared: declared.to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                tracing::trace!(
                    capability = %self.name,
                    expected,
                    "capability has no declared signature, trusting caller"
                );
                Ok(())
            }
        }
    }
}
