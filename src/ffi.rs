//! FFI bindings for Wrist Flux
//!
//! This module provides C-compatible functions for driving a pipeline from other
//! languages. All functions use C strings (null-terminated) and return allocated
//! memory that must be freed by the caller using `wflux_free_string`.
//!
//! Timestamps cross the boundary as RFC 3339 strings.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::error::FluxError;
use crate::frame::{FrameRecord, KeyPressResult};
use crate::pipeline::WristPipeline;
use crate::snapshot::SnapshotEncoder;

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

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, FluxError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FluxError::ParseError(format!("Invalid timestamp {s:?}: {e}")))
}

/// Read an optional timestamp argument; NULL means "now"
unsafe fn timestamp_arg(ptr: *const c_char) -> Result<DateTime<Utc>, FluxError> {
    if ptr.is_null() {
        return Ok(Utc::now());
    }
    match cstr_to_string(ptr) {
        Some(s) => parse_timestamp(&s),
        None => Err(FluxError::ParseError(
            "Invalid timestamp string pointer".to_string(),
        )),
    }
}

/// Serialize a value or record the error and return NULL
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Pipeline API
// ============================================================================

/// Opaque handle to a WristPipeline
pub struct WristPipelineHandle {
    pipeline: WristPipeline,
    encoder: SnapshotEncoder,
}

impl WristPipelineHandle {
    fn process_frame(&mut self, json: &str) -> Result<String, FluxError> {
        let record: FrameRecord = serde_json::from_str(json)?;
        record.validate()?;
        let presses = record.apply(&mut self.pipeline);
        self.encoder
            .encode_to_json(&self.pipeline, record.timestamp, &presses)
    }
}

/// Create a new pipeline.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string
///   holding a `PipelineConfig` JSON object.
/// - Must be freed with `wflux_pipeline_free`.
/// - Returns NULL on error; call `wflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_new(
    config_json: *const c_char,
) -> *mut WristPipelineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        PipelineConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match PipelineConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match WristPipeline::with_config(config) {
        Ok(pipeline) => Box::into_raw(Box::new(WristPipelineHandle {
            pipeline,
            encoder: SnapshotEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a pipeline.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_free(pipeline: *mut WristPipelineHandle) {
    if !pipeline.is_null() {
        drop(Box::from_raw(pipeline));
    }
}

/// Ingest one `wrist.frame.v1` record and return a `wrist.snapshot.v1` JSON object.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `wflux_free_string`.
/// - Returns NULL on error; call `wflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_process_frame(
    pipeline: *mut WristPipelineHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    let handle = &mut *pipeline;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match handle.process_frame(&json_str) {
        Ok(snapshot) => string_to_cstr(&snapshot),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Current calibrated angles as JSON; absent angles are `null`.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `wflux_free_string`.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_angles(
    pipeline: *const WristPipelineHandle,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    json_to_cstr(&(*pipeline).pipeline.angles())
}

/// Cumulative finger travel as `{"left":..,"right":..}`.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - Returns a newly allocated string that must be freed with `wflux_free_string`.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_finger_travel(
    pipeline: *const WristPipelineHandle,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    json_to_cstr(&(*pipeline).pipeline.finger_travel())
}

/// Infer the pressing finger at `timestamp` (NULL for now).
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - `timestamp` must be NULL or a valid null-terminated RFC 3339 string.
/// - Returns a newly allocated string that must be freed with `wflux_free_string`.
/// - Returns NULL on error; call `wflux_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_detect_press(
    pipeline: *const WristPipelineHandle,
    timestamp: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return ptr::null_mut();
    }

    let at = match timestamp_arg(timestamp) {
        Ok(at) => at,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let snapshot = (*pipeline).pipeline.press_snapshot(at);
    json_to_cstr(&KeyPressResult {
        key: None,
        finger: snapshot.press.label(),
        snapshot,
    })
}

/// Start a new calibration epoch at `timestamp` (NULL for now).
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - `timestamp` must be NULL or a valid null-terminated RFC 3339 string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_reset_calibration(
    pipeline: *mut WristPipelineHandle,
    timestamp: *const c_char,
) -> i32 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }

    match timestamp_arg(timestamp) {
        Ok(at) => {
            (*pipeline).pipeline.reset_calibration(at);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Reset all session state at `timestamp` (NULL for now).
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - `timestamp` must be NULL or a valid null-terminated RFC 3339 string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_reset_session(
    pipeline: *mut WristPipelineHandle,
    timestamp: *const c_char,
) -> i32 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }

    match timestamp_arg(timestamp) {
        Ok(at) => {
            (*pipeline).pipeline.reset_session(at);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Gate finger-travel accumulation. Non-zero `active` starts measuring.
///
/// # Safety
/// - `pipeline` must be a valid pointer returned by `wflux_pipeline_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn wflux_pipeline_set_session_active(
    pipeline: *mut WristPipelineHandle,
    active: i32,
) -> i32 {
    clear_last_error();

    if pipeline.is_null() {
        set_last_error("Null pipeline pointer");
        return -1;
    }

    (*pipeline).pipeline.set_session_active(active != 0);
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Wrist Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Wrist Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wflux_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Wrist Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn wflux_last_error() -> *const c_char {
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
pub unsafe extern "C" fn wflux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
