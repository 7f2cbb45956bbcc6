//! Test plugin: a service exporting arithmetic capabilities
//!
//! Built as a cdylib by the integration tests.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static RUNNING: AtomicBool = AtomicBool::new(false);
static RECEIVED: AtomicI32 = AtomicI32::new(-1);
static FAIL_STOP: AtomicBool = AtomicBool::new(false);

const SUMMARY: &str = concat!(
    r#"{
    "name": "calc",
    "version": "0.1.0",
    "description": "Arithmetic service",
    "kind": "service",
    "abi_version": 1,
    "provides": [
        { "capability": "calc_add", "entry": "calc_add", "signature": "fn(i32, i32) -> i32" },
        { "capability": "calc_running", "entry": "calc_running", "signature": "fn() -> i32" },
        { "capability": "calc_received", "entry": "calc_received" }
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

#[no_mangle]
pub extern "C" fn summary() -> *const c_char {
    SUMMARY.as_ptr().cast()
}

#[no_mangle]
pub unsafe extern "C" fn start(table: *const RawCapabilities, attributes: *const c_char) -> c_int {
    if table.is_null() || attributes.is_null() {
        return -1;
    }
    let attributes = CStr::from_ptr(attributes).to_string_lossy();
    if attributes.contains("\"fail\":true") {
        return -7;
    }
    FAIL_STOP.store(attributes.contains("\"fail_stop\":true"), Ordering::SeqCst);

    RECEIVED.store((*table).n_capabilities, Ordering::SeqCst);
    RUNNING.store(true, Ordering::SeqCst);
    0
}

#[no_mangle]
pub extern "C" fn stop() -> c_int {
    if FAIL_STOP.load(Ordering::SeqCst) {
        return -3;
    }
    RUNNING.store(false, Ordering::SeqCst);
    0
}

#[no_mangle]
pub extern "C" fn calc_add(a: i32, b: i32) -> i32 {
    a + b
}

#[no_mangle]
pub extern "C" fn calc_running() -> i32 {
    i32::from(RUNNING.load(Ordering::SeqCst))
}

/// Number of capabilities handed to `start`, or -1 before it ran
#[no_mangle]
pub extern "C" fn calc_received() -> i32 {
    RECEIVED.load(Ordering::SeqCst)
}
