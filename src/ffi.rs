//! FFI interface for C and C++ callers
//!
//! Content is passed as a pointer/length pair; requests and results travel
//! as JSON. Every entry point returns an [`ExtractionResultFFI`] that must be
//! released with [`free_extraction_result`].

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::batch::ContentFormat;
use crate::config::ExtractionRequest;
use crate::error::Result;
use crate::result::ExtractionResult;

/// Result struct returned to C
/// Both pointers are owned by Rust and must be freed via free_extraction_result
#[repr(C)]
pub struct ExtractionResultFFI {
    /// JSON-serialized ExtractionResult (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if extraction failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extract values from HTML or XML content.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - JSON-serialized ExtractionRequest (null-terminated):
///   `{"selection": {"key": "selector"}, "options": {"fallback": "whole_batch"}}`
///
/// # Returns
/// ExtractionResultFFI with either json_ptr set (success) or error_ptr set (failure).
/// On success json_ptr holds `{"values": {...}, "not_found": [...]}`.
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_extraction_result`
#[no_mangle]
pub unsafe extern "C" fn extract_from_html(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    run_extraction(ContentFormat::Html, html_ptr, html_len, request_json)
}

/// Extract values from XML content, with or without an `<?xml` declaration.
///
/// # Safety
/// Same as extract_from_html
#[no_mangle]
pub unsafe extern "C" fn extract_from_xml(
    xml_ptr: *const c_char,
    xml_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    run_extraction(ContentFormat::Xml, xml_ptr, xml_len, request_json)
}

/// Extract values from JSON content using JSON paths.
///
/// # Safety
/// Same as extract_from_html
#[no_mangle]
pub unsafe extern "C" fn extract_from_json(
    json_ptr: *const c_char,
    json_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    run_extraction(ContentFormat::Json, json_ptr, json_len, request_json)
}

/// Free an ExtractionResultFFI returned by one of the extract functions
///
/// # Safety
/// - `result` must have been returned by one of the `extract_from_*` functions
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_extraction_result(result: ExtractionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn run_extraction(
    format: ContentFormat,
    content_ptr: *const c_char,
    content_len: usize,
    request_json: *const c_char,
) -> ExtractionResultFFI {
    let content = if content_ptr.is_null() || content_len == 0 {
        ""
    } else {
        let slice = std::slice::from_raw_parts(content_ptr as *const u8, content_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in content"),
        }
    };

    let request_str = if request_json.is_null() {
        return make_error_result("Request JSON is null");
    } else {
        match CStr::from_ptr(request_json).to_str() {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in request JSON"),
        }
    };

    let request: ExtractionRequest = match serde_json::from_str(request_str) {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Failed to parse request JSON: {e}")),
    };

    make_result(format.extract(content, &request.selection, &request.options))
}

fn make_result(result: Result<ExtractionResult>) -> ExtractionResultFFI {
    let result = match result {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Extraction failed: {e}")),
    };

    match serde_json::to_string(&result) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => ExtractionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {e}")),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> ExtractionResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    ExtractionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Call an entry point and take ownership of whichever string it set.
    fn call(
        f: unsafe extern "C" fn(*const c_char, usize, *const c_char) -> ExtractionResultFFI,
        content: &str,
        request: &str,
    ) -> std::result::Result<serde_json::Value, String> {
        let request = CString::new(request).unwrap();
        unsafe {
            let result = f(content.as_ptr() as *const c_char, content.len(), request.as_ptr());
            let outcome = if result.error_ptr.is_null() {
                let json = CStr::from_ptr(result.json_ptr).to_str().unwrap();
                Ok(serde_json::from_str(json).unwrap())
            } else {
                Err(CStr::from_ptr(result.error_ptr).to_str().unwrap().to_string())
            };
            free_extraction_result(result);
            outcome
        }
    }

    #[test]
    fn test_extract_from_html() {
        let html = r#"<div id="title">Hello</div><ul><li>A</li><li>B</li></ul>"#;
        let request = r#"{"selection": {
            "title": "//div[@id='title']/text()",
            "items": "//ul/li",
            "missing": "//div/@missing"
        }}"#;

        let json = call(extract_from_html, html, request).unwrap();
        assert_eq!(
            json,
            json!({
                "values": {"title": "Hello", "items": ["A", "B"]},
                "not_found": ["missing"]
            })
        );
    }

    #[test]
    fn test_extract_from_xml() {
        let xml = "<channel><item><title>One</title><enclosure url=\"/a.mp3\"/></item><item><title>Two</title></item></channel>";
        let request = r#"{"selection": {"titles": "//item/title/text()", "audio": "//enclosure/@url"}}"#;
        let json = call(extract_from_xml, xml, request).unwrap();
        assert_eq!(json["values"], json!({"titles": ["One", "Two"], "audio": "/a.mp3"}));
    }

    #[test]
    fn test_extract_from_json() {
        let request = r#"{"selection": {"n": "$.a.b"}}"#;
        let json = call(extract_from_json, r#"{"a":{"b":5}}"#, request).unwrap();
        assert_eq!(json["values"]["n"], json!(5));
    }

    #[test]
    fn test_errors_are_returned_not_panicked() {
        let err = call(extract_from_html, "<p/>", "not json").unwrap_err();
        assert!(err.starts_with("Failed to parse request JSON"));

        let request = r#"{"selection": {"x": "//a[starts-with(@href,'x')]"}}"#;
        let err = call(extract_from_html, "<a/>", request).unwrap_err();
        assert!(err.contains("no transformation for filter"));

        let err = call(extract_from_json, "{", r#"{"selection": {"n": "$.a"}}"#).unwrap_err();
        assert!(err.starts_with("Extraction failed"));
    }

    #[test]
    fn test_null_request() {
        unsafe {
            let result = extract_from_html(ptr::null(), 0, ptr::null());
            assert!(result.json_ptr.is_null());
            assert!(!result.error_ptr.is_null());
            free_extraction_result(result);
        }
    }
}
