//! Test plugin: declares more capabilities than a registry holds
//!
//! Built as a cdylib by the integration tests; loading it must fail.

use std::ffi::c_char;

const SUMMARY: &str = concat!(
    r#"{
    "name": "wide",
    "version": "0.1.0",
    "provides": [
        { "capability": "wide_0", "entry": "wide_noop" },
        { "capability": "wide_1", "entry": "wide_noop" },
        { "capability": "wide_2", "entry": "wide_noop" },
        { "capability": "wide_3", "entry": "wide_noop" },
        { "capability": "wide_4", "entry": "wide_noop" },
        { "capability": "wide_5", "entry": "wide_noop" },
        { "capability": "wide_6", "entry": "wide_noop" },
        { "capability": "wide_7", "entry": "wide_noop" },
        { "capability": "wide_8", "entry": "wide_noop" },
        { "capability": "wide_9", "entry": "wide_noop" },
        { "capability": "wide_10", "entry": "wide_noop" },
        { "capability": "wide_11", "entry": "wide_noop" },
        { "capability": "wide_12", "entry": "wide_noop" },
        { "capability": "wide_13", "entry": "wide_noop" },
        { "capability": "wide_14", "entry": "wide_noop" },
        { "capability": "wide_15", "entry": "wide_noop" },
        { "capability": "wide_16", "entry": "wide_noop" },
        { "capability": "wide_17", "entry": "wide_noop" },
        { "capability": "wide_18", "entry": "wide_noop" },
        { "capability": "wide_19", "entry": "wide_noop" },
        { "capability": "wide_20", "entry": "wide_noop" }
    ]
}"#,
    "\0"
);

#[no_mangle]
pub extern "C" fn summary() -> *const c_char {
    SUMMARY.as_ptr().cast()
}

#[no_mangle]
pub extern "C" fn wide_noop() {}
