//! FFI bindings for Keystroke Flux
//!
//! This module provides C-compatible functions for calling Keystroke Flux from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `kflux_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::MetricsConfig;
use crate::error::ComputeError;
use crate::pipeline::KeystrokeProcessor;
use crate::schema::InputFormat;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Build a processor from an optional config JSON pointer (NULL means defaults)
unsafe fn processor_from_config(config_json: *const c_char) -> Result<KeystrokeProcessor, String> {
    if config_json.is_null() {
        return Ok(KeystrokeProcessor::new());
    }
    let json = cstr_to_string(config_json).ok_or("Invalid config string pointer")?;
    MetricsConfig::from_json(&json)
        .and_then(KeystrokeProcessor::with_config)
        .map_err(|e| e.to_string())
}

fn parse_format(format: &str) -> Result<InputFormat, ComputeError> {
    match format.trim().to_lowercase().as_str() {
        "csv" => Ok(InputFormat::Csv),
        "ndjson" => Ok(InputFormat::Ndjson),
        "json" => Ok(InputFormat::Json),
        other => Err(ComputeError::ParseError(format!(
            "Unknown input format '{other}' (expected csv, ndjson or json)"
        ))),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute the metrics report for a JSON array of keystroke rows.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - `config_json` must be a valid null-terminated C string or NULL for the
///   default configuration.
/// - Returns a newly allocated string that must be freed with `kflux_free_string`.
/// - Returns NULL on error; call `kflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kflux_keystrokes_to_metrics(
    json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let processor = match processor_from_config(config_json) {
        Ok(p) => p,
        Err(msg) => {
            set_last_error(&msg);
            return ptr::null_mut();
        }
    };

    match processor.process_to_json(&json_str, InputFormat::Json) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Processor API
// ============================================================================

/// Opaque handle to a KeystrokeProcessor
pub struct KeystrokeProcessorHandle {
    processor: KeystrokeProcessor,
}

/// Create a processor.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string or NULL.
/// - Must be freed with `kflux_processor_free`.
/// - Returns NULL on an invalid configuration.
#[no_mangle]
pub unsafe extern "C" fn kflux_processor_new(
    config_json: *const c_char,
) -> *mut KeystrokeProcessorHandle {
    clear_last_error();

    match processor_from_config(config_json) {
        Ok(processor) => Box::into_raw(Box::new(KeystrokeProcessorHandle { processor })),
        Err(msg) => {
            set_last_error(&msg);
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kflux_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn kflux_processor_free(processor: *mut KeystrokeProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Compute the metrics report for an input document.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kflux_processor_new`.
/// - `input` and `format` ("csv", "ndjson" or "json") must be valid
///   null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `kflux_free_string`.
/// - Returns NULL on error; call `kflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn kflux_processor_process(
    processor: *mut KeystrokeProcessorHandle,
    input: *const c_char,
    format: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let input_str = match cstr_to_string(input) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return ptr::null_mut();
        }
    };

    let format = match cstr_to_string(format).as_deref().map(parse_format) {
        Some(Ok(f)) => f,
        Some(Err(e)) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
        None => {
            set_last_error("Invalid format string pointer");
            return ptr::null_mut();
        }
    };

    let handle = &*processor;
    match handle.processor.process_to_json(&input_str, format) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Get the processor's effective configuration as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `kflux_processor_new`.
/// - Returns a newly allocated string that must be freed with `kflux_free_string`.
#[no_mangle]
pub unsafe extern "C" fn kflux_processor_config(
    processor: *const KeystrokeProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    match (*processor).processor.config().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by Keystroke Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Keystroke Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn kflux_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Keystroke Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn kflux_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn kflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
