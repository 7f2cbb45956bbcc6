//! Test plugin: a skill that calls a capability of the `calc` service
//!
//! Built as a cdylib by the integration tests.

use std::ffi::{c_char, c_int, c_void, CStr};

const SUMMARY: &[u8] = b"{\"name\":\"echo\",\"version\":\"0.2.0\",\"kind\":\"skill\",\"requires\":[\"calc\"]}\0";

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

/// Look up `calc_add` in the table and return `calc_add(40, 2)`
///
/// -1: bad table, -2: capability missing, -3: unexpected signature tag
#[no_mangle]
pub unsafe extern "C" fn run(table: *const RawCapabilities, _attributes: *const c_char) -> c_int {
    if table.is_null() || (*table).abi_version != 1 {
        return -1;
    }

    let table = &*table;
    let count = usize::try_from(table.n_capabilities).unwrap_or(0).min(20);
    for slot in &table.capability[..count] {
        let name = CStr::from_ptr(slot.name.as_ptr());
        if name.to_bytes() != b"calc_add" {
            continue;
        }
        if CStr::from_ptr(slot.signature.as_ptr()).to_bytes() != b"fn(i32, i32) -> i32" {
            return -3;
        }
        let add: AddFn = std::mem::transmute(slot.function);
        return add(40, 2);
    }

    -2
}
