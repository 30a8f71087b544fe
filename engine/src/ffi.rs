//! FFI layer for the iOS host.
//!
//! This module provides C-compatible functions that can be called from Swift.
//! The host performs HTTP itself and hands the raw response to the decoder;
//! all structured data crosses the boundary as JSON strings.
//!
//! # Memory Management
//!
//! - Strings returned by `rulesync_*` functions are allocated by Rust
//! - Caller must free them with `rulesync_string_free`
//! - Store pointers must be freed with `rulesync_store_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{
    MemoryStore, RawResponse, Reconciler, ResponseDecoder, RuleSet, RuleSetStore, StoreSnapshot,
};
use std::ffi::{c_char, CStr, CString};
use std::ptr;

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

fn error_string(message: impl Into<String>) -> *mut c_char {
    to_c_string(FfiResult::<()>::err(message).to_json())
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `rulesync_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Build the decoder input from the host's view of the response.
unsafe fn raw_response(
    status: i32,
    body: *const c_char,
    transport_error: *const c_char,
) -> RawResponse {
    if let Some(reason) = from_c_string(transport_error) {
        return RawResponse::transport_failure(reason);
    }
    RawResponse {
        status: u16::try_from(status).ok(),
        body: from_c_string(body).map(String::into_bytes),
        transport_error: None,
    }
}

// ============================================================================
// Store Lifecycle
// ============================================================================

/// Create a new empty store.
///
/// # Safety
/// - Caller must free the returned pointer with `rulesync_store_free`
#[no_mangle]
pub extern "C" fn rulesync_store_new() -> *mut MemoryStore {
    Box::into_raw(Box::new(MemoryStore::new()))
}

/// Free a store.
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new`
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_free(store: *mut MemoryStore) {
    if !store.is_null() {
        drop(Box::from_raw(store));
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `rulesync_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn rulesync_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode a list or batch-detail response into rule sets.
///
/// # Arguments
/// - `status`: HTTP status, negative if unknown
/// - `body`: response body, or null when there was none
/// - `transport_error`: failure reason, or null when a response arrived
///
/// # Returns
/// JSON string: `{"ok": [RuleSet, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `body` and `transport_error` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_decode_rule_sets(
    status: i32,
    body: *const c_char,
    transport_error: *const c_char,
) -> *mut c_char {
    let response = raw_response(status, body, transport_error);
    match ResponseDecoder::new().decode_array::<RuleSet>(&response) {
        Ok(rule_sets) => to_c_string(FfiResult::ok(rule_sets).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// Decode a detail response into a single rule set.
///
/// # Returns
/// JSON string: `{"ok": RuleSet}` or `{"error": "message"}`
///
/// # Safety
/// - `body` and `transport_error` must be valid null-terminated C strings or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_decode_rule_set(
    status: i32,
    body: *const c_char,
    transport_error: *const c_char,
) -> *mut c_char {
    let response = raw_response(status, body, transport_error);
    match ResponseDecoder::new().decode_object::<RuleSet>(&response) {
        Ok(rule_set) => to_c_string(FfiResult::ok(rule_set).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

// ============================================================================
// Store Operations
// ============================================================================

/// Reconcile decoded rule sets into the store.
///
/// # Arguments
/// - `rule_sets_json`: JSON array of RuleSet, as returned by the decode functions
///
/// # Returns
/// JSON string: `{"ok": ReconcileResult}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new` or null
/// - `rule_sets_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_reconcile(
    store: *mut MemoryStore,
    rule_sets_json: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return error_string("null store pointer"),
    };

    let json = match from_c_string(rule_sets_json) {
        Some(s) => s,
        None => return error_string("invalid rule sets JSON"),
    };

    let rule_sets: Vec<RuleSet> = match serde_json::from_str(&json) {
        Ok(r) => r,
        Err(e) => return error_string(format!("parse error: {}", e)),
    };

    match Reconciler::new(store).reconcile_all(rule_sets) {
        Ok(result) => to_c_string(FfiResult::ok(result).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// List live rule sets, oldest first.
///
/// # Returns
/// JSON string: `{"ok": [RuleSet, ...]}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new` or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_list(store: *const MemoryStore) -> *mut c_char {
    let store = match store.as_ref() {
        Some(s) => s,
        None => return error_string("null store pointer"),
    };

    match store.all_not_deleted() {
        Ok(rule_sets) => to_c_string(FfiResult::ok(rule_sets).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// Soft-delete a rule set.
///
/// # Returns
/// JSON string: `{"ok": true}` if a record was tombstoned, `{"ok": false}` if
/// none existed, or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new` or null
/// - `uuid` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_soft_delete(
    store: *mut MemoryStore,
    uuid: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return error_string("null store pointer"),
    };

    let uuid = match from_c_string(uuid) {
        Some(s) => s,
        None => return error_string("invalid uuid"),
    };

    match store.soft_delete(&uuid) {
        Ok(found) => to_c_string(FfiResult::ok(found).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

/// Export the store as a snapshot.
///
/// # Returns
/// JSON string: `{"ok": StoreSnapshot}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new` or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_export(store: *const MemoryStore) -> *mut c_char {
    let store = match store.as_ref() {
        Some(s) => s,
        None => return error_string("null store pointer"),
    };

    to_c_string(FfiResult::ok(store.export_state()).to_json())
}

/// Replace the store contents with a snapshot.
///
/// # Returns
/// JSON string: `{"ok": null}` or `{"error": "message"}`
///
/// # Safety
/// - `store` must be a valid pointer from `rulesync_store_new` or null
/// - `snapshot_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `rulesync_string_free`
#[no_mangle]
pub unsafe extern "C" fn rulesync_store_import(
    store: *mut MemoryStore,
    snapshot_json: *const c_char,
) -> *mut c_char {
    let store = match store.as_mut() {
        Some(s) => s,
        None => return error_string("null store pointer"),
    };

    let json = match from_c_string(snapshot_json) {
        Some(s) => s,
        None => return error_string("invalid snapshot JSON"),
    };

    let snapshot = match StoreSnapshot::from_json(&json) {
        Ok(s) => s,
        Err(e) => return error_string(e.to_string()),
    };

    match store.import_state(snapshot) {
        Ok(()) => to_c_string(FfiResult::ok(()).to_json()),
        Err(e) => error_string(e.to_string()),
    }
}

// ============================================================================
// Utility
// ============================================================================

/// Get the engine version.
///
/// # Returns
/// Static string pointer (do not free)
#[no_mangle]
pub extern "C" fn rulesync_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the snapshot format version.
#[no_mangle]
pub extern "C" fn rulesync_snapshot_format_version() -> u32 {
    crate::SNAPSHOT_FORMAT_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_BODY: &str = r#"[{
        "id": "a1",
        "name": "Ads",
        "created_at": "2020-01-01T00:00:00Z",
        "updated_at": "2020-01-02T00:00:00Z",
        "rules": [{"pattern": "*.ads.com", "action": "reject", "type": "domain"}]
    }]"#;

    unsafe fn take(s: *mut c_char) -> serde_json::Value {
        let json = CStr::from_ptr(s).to_str().unwrap().to_string();
        rulesync_string_free(s);
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn ffi_store_lifecycle() {
        let store = rulesync_store_new();
        assert!(!store.is_null());
        unsafe { rulesync_store_free(store) };
    }

    #[test]
    fn ffi_decode_reconcile_list() {
        unsafe {
            let body = CString::new(LIST_BODY).unwrap();
            let decoded = take(rulesync_decode_rule_sets(200, body.as_ptr(), ptr::null()));
            let rule_sets = decoded["ok"].to_string();
            assert_eq!(decoded["ok"][0]["uuid"], "a1");

            let store = rulesync_store_new();
            let rule_sets = CString::new(rule_sets).unwrap();
            let result = take(rulesync_store_reconcile(store, rule_sets.as_ptr()));
            assert_eq!(result["ok"]["inserted"][0], "a1");

            let listed = take(rulesync_store_list(store));
            assert_eq!(listed["ok"][0]["isSubscribed"], true);
            assert_eq!(listed["ok"][0]["editable"], false);

            rulesync_store_free(store);
        }
    }

    #[test]
    fn ffi_decode_errors() {
        unsafe {
            let reason = CString::new("timed out").unwrap();
            let result = take(rulesync_decode_rule_sets(-1, ptr::null(), reason.as_ptr()));
            assert_eq!(result["error"], "network error: timed out");

            let body = CString::new(r#"{"error_message":"quota exceeded"}"#).unwrap();
            let result = take(rulesync_decode_rule_set(200, body.as_ptr(), ptr::null()));
            assert_eq!(result["error"], "business error: quota exceeded");

            let result = take(rulesync_decode_rule_set(204, ptr::null(), ptr::null()));
            assert!(result["error"]
                .as_str()
                .unwrap()
                .starts_with("empty serialization"));
        }
    }

    #[test]
    fn ffi_soft_delete_and_snapshot() {
        unsafe {
            let store = rulesync_store_new();
            let body = CString::new(LIST_BODY).unwrap();
            let decoded = take(rulesync_decode_rule_sets(200, body.as_ptr(), ptr::null()));
            let rule_sets = CString::new(decoded["ok"].to_string()).unwrap();
            take(rulesync_store_reconcile(store, rule_sets.as_ptr()));

            let uuid = CString::new("a1").unwrap();
            let deleted = take(rulesync_store_soft_delete(store, uuid.as_ptr()));
            assert_eq!(deleted["ok"], true);

            let exported = take(rulesync_store_export(store));
            assert_eq!(exported["ok"]["ruleSets"]["a1"]["deleted"], true);

            let restored = rulesync_store_new();
            let snapshot = CString::new(exported["ok"].to_string()).unwrap();
            let result = take(rulesync_store_import(restored, snapshot.as_ptr()));
            assert!(result.get("error").is_none());

            let listed = take(rulesync_store_list(restored));
            assert_eq!(listed["ok"].as_array().unwrap().len(), 0);

            rulesync_store_free(store);
            rulesync_store_free(restored);
        }
    }

    #[test]
    fn ffi_null_store() {
        unsafe {
            let result = take(rulesync_store_list(ptr::null()));
            assert_eq!(result["error"], "null store pointer");
        }
    }

    #[test]
    fn ffi_version() {
        let version = unsafe { CStr::from_ptr(rulesync_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
        assert_eq!(rulesync_snapshot_format_version(), 1);
    }
}
