//! Capability registry shared between the host and its plugins
//!
//! A capability is a named entry point exported by a plugin module. Each
//! loaded module contributes a bounded [`CapabilityRegistry`]; the host
//! aggregates registries and hands them back to plugins in the C layout
//! defined in [`ffi`].
//!
//! The registry stores code addresses, not types. Callers agree on the
//! calling convention of each capability by name, optionally backed by a
//! declared [`Signature`] tag that is checked on every typed access.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiss_runtime::capability::CapabilityRegistry;
//!
//! extern "C" fn add(a: i32, b: i32) -> i32 { a + b }
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register_with_signature("math.add", add as *const _, "fn(i32, i32) -> i32")?;
//!
//! let sum = unsafe {
//!     registry.invoke("math.add", "fn(i32, i32) -> i32", |f: extern "C" fn(i32, i32) -> i32| f(40, 2))?
//! };
//! assert_eq!(sum, 42);
//! ```

pub mod ffi;
mod registry;
mod types;

pub use ffi::{RawCapabilities, RawCapability};
pub use registry::{CapabilityRegistry, Function};
pub use types::{Capability, CapabilityName, EntryPoint, RegistryError, Signature};

/// Number of slots in a registry unless a capacity is chosen explicitly
///
/// This is also the slot count of the C table exchanged with plugins.
pub const DEFAULT_CAPACITY: usize = 20;

/// Maximum capability name length in bytes
pub const MAX_NAME_LEN: usize = 256;

/// Maximum signature tag length in bytes
pub const MAX_SIGNATURE_LEN: usize = 64;

/// Version of the C table layout and of the plugin entry symbols
pub const ABI_VERSION: u32 = 1;
