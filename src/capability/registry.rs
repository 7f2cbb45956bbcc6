//! Bounded, insertion-ordered capability table

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ops::Deref;

use super::types::{Capability, RegistryError};
use super::DEFAULT_CAPACITY;

/// Typed view of a capability's entry point
///
/// Borrows the registry it was resolved from. The function pointer it derefs
/// to is `Copy` and is not tied to that borrow; keeping the defining module
/// loaded is up to the owner of the plugin handle.
#[derive(Debug, Clone, Copy)]
pub struct Function<'a, F> {
    inner: F,
    _registry: PhantomData<&'a ()>,
}

impl<F> Deref for Function<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.inner
    }
}

/// Fixed-capacity table of capabilities
///
/// Entries keep insertion order, names are unique, and at most `N` entries
/// are ever stored. Storage is reserved up front and never reallocated.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry<const N: usize = DEFAULT_CAPACITY> {
    entries: Vec<Capability>,
}

impl<const N: usize> Default for CapabilityRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CapabilityRegistry<N> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(N),
        }
    }

    /// Maximum number of entries
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of registered capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no capability is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether another registration would exceed capacity
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= N
    }

    /// Register an untagged capability
    ///
    /// # Errors
    ///
    /// Returns `InvalidName`, `InvalidEntryPoint`, `CapacityExceeded` or
    /// `DuplicateName`; the registry is unchanged on error
    pub fn register(&mut self, name: &str, entry: *const c_void) -> Result<(), RegistryError> {
        self.insert(Capability::new(name, entry, None)?)
    }

    /// Register a capability with a declared signature tag
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register), plus `InvalidSignature`
    pub fn register_with_signature(
        &mut self,
        name: &str,
        entry: *const c_void,
        signature: &str,
    ) -> Result<(), RegistryError> {
        self.insert(Capability::new(name, entry, Some(signature))?)
    }

    /// Append an already validated capability
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` when full, `DuplicateName` when the name is
    /// already present; the registry is unchanged on error
    pub fn insert(&mut self, capability: Capability) -> Result<(), RegistryError> {
        if self.is_full() {
            return Err(RegistryError::CapacityExceeded { capacity: N });
        }
        if self.contains(capability.name()) {
            return Err(RegistryError::DuplicateName(capability.name().to_string()));
        }

        tracing::trace!(
            capability = %capability.name(),
            slot = self.entries.len(),
            "registered capability"
        );
        self.entries.push(capability);
        debug_assert!(self.entries.len() <= N);

        Ok(())
    }

    /// Find a capability by exact name
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entry has this name
    pub fn lookup(&self, name: &str) -> Result<&Capability, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Find a capability by exact name, if present
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.iter().find(|cap| cap.name() == name)
    }

    /// Whether a capability with this name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over registered capabilities in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Capability> {
        self.entries.iter()
    }

    /// Iterate over registered names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Capability::name)
    }

    /// Resolve a capability as function pointer type `F`
    ///
    /// `signature` is the calling convention the caller intends to use. It
    /// is compared with the tag declared at registration, if one was.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `SignatureMismatch`
    ///
    /// # Safety
    ///
    /// `F` must match the function's real type. A matching tag is a
    /// convention, not a proof.
    #[allow(unsafe_code)]
    pub unsafe fn function<F: Copy>(
        &self,
        name: &str,
        signature: &str,
    ) -> Result<Function<'_, F>, RegistryError> {
        let capability = self.lookup(name)?;
        capability.check_signature(signature)?;

        // SAFETY: forwarded to the caller
        let inner = unsafe { capability.entry_point().cast::<F>() };
        Ok(Function {
            inner,
            _registry: PhantomData,
        })
    }

    /// Resolve a capability and call it through `call`
    ///
    /// ```rust,ignore
    /// let len = unsafe {
    ///     registry.invoke("text.len", "fn(*const c_char) -> c_int",
    ///         |f: unsafe extern "C" fn(*const c_char) -> c_int| f(text.as_ptr()))?
    /// };
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `SignatureMismatch`; `call` is not run then
    ///
    /// # Safety
    ///
    /// Same contract as [`function`](Self::function)
    #[allow(unsafe_code)]
    pub unsafe fn invoke<F: Copy, R>(
        &self,
        name: &str,
        signature: &str,
        call: impl FnOnce(F) -> R,
    ) -> Result<R, RegistryError> {
        // SAFETY: forwarded to the caller
        let function = unsafe { self.function::<F>(name, signature)? };
        Ok(call(*function))
    }
}

impl<'a, const N: usize> IntoIterator for &'a CapabilityRegistry<N> {
    type Item = &'a Capability;
    type IntoIter = std::slice::Iter<'a, Capability>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
