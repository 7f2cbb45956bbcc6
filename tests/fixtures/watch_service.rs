//! Test plugin: a service that keeps an entry point of `calc` while running
//!
//! Built as a cdylib by the integration tests.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::sync::atomic::{AtomicPtr, Ordering};

static ADD: AtomicPtr<c_void> = AtomicPtr::new(std::ptr::null_mut());

const SUMMARY: &str = concat!(
    r#"{
    "name": "watch",
    "version": "0.1.0",
    "kind": "service",
    "requires": ["calc"],
    "provides": [
        { "capability": "watch_sum", "entry": "watch_sum", "signature": "fn() -> i32" }
    ]
}"#,
    "\0"
);

#[repr(C)]
pub struct RawCapability {
    name: [c_char; 257],
    signature: [c_char; 65],
    function: *const c_void,
}

#[repr(C)]
pub struct RawCapabilities {
    abi_version: u32,
    capability: [RawCapability; 20],
    n_capabilities: c_int,
}

type AddFn = extern "C" fn(i32, i32) -> i32;

#[no_mangle]
pub extern "C" fn summary() -> *const c_char {
    SUMMARY.as_ptr().cast()
}

/// Keep `calc_add` for later calls; -2 when it is not in the table
#[no_mangle]
pub unsafe extern "C" fn start(table: *const RawCapabilities, _attributes: *const c_char) -> c_int {
    if table.is_null() {
        return -1;
    }

    let table = &*table;
    let count = usize::try_from(table.n_capabilities).unwrap_or(0).min(20);
    for slot in &table.capability[..count] {
        if CStr::from_ptr(slot.name.as_ptr()).to_bytes() == b"calc_add" {
            ADD.store(slot.function.cast_mut(), Ordering::SeqCst);
            return 0;
        }
    }

    -2
}

#[no_mangle]
pub extern "C" fn stop() -> c_int {
    ADD.store(std::ptr::null_mut(), Ordering::SeqCst);
    0
}

/// `calc_add(20, 22)` through the kept pointer, -1 when stopped
#[no_mangle]
pub extern "C" fn watch_sum() -> i32 {
    let add = ADD.load(Ordering::SeqCst);
    if add.is_null() {
        return -1;
    }
    let add: AddFn = unsafe { std::mem::transmute(add) };
    add(20, 22)
}
