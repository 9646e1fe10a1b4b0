use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::import::import_workbook;
use crate::xlsx::template::write_template_workbook;

static LAST_ERROR: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));

fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(c);
}

fn clear_last_error() {
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

fn take_cstr(ptr: *const c_char, name: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

/// Imports the first sheet of an `.xlsx` file and returns the uploaded groups as a
/// `{ "contentGroups": ..., "functionGroups": ... }` JSON string.
///
/// Returns null on failure (see `rr_last_error_utf8()`). The returned string must be released
/// with `rr_string_free()`.
#[no_mangle]
pub extern "C" fn rr_import_workbook_json(xlsx_path: *const c_char) -> *mut c_char {
    let path = match take_cstr(xlsx_path, "xlsx_path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => {
            set_last_error(&e);
            return std::ptr::null_mut();
        }
    };
    let fragment = match import_workbook(&path) {
        Ok(v) => v,
        Err(err) => {
            set_last_error(&err.to_string());
            return std::ptr::null_mut();
        }
    };
    let json = match serde_json::to_string(&fragment) {
        Ok(v) => v,
        Err(err) => {
            set_last_error(&format!("serialize groups: {err}"));
            return std::ptr::null_mut();
        }
    };
    match CString::new(json) {
        Ok(c) => {
            clear_last_error();
            c.into_raw()
        }
        Err(_) => {
            set_last_error("groups contain a NUL byte");
            std::ptr::null_mut()
        }
    }
}

/// Writes the downloadable example workbook to `output_path`.
///
/// Returns 0 on success; non-zero on failure (see `rr_last_error_utf8()`).
#[no_mangle]
pub extern "C" fn rr_write_template(output_path: *const c_char) -> i32 {
    let output = match take_cstr(output_path, "output_path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => {
            set_last_error(&e);
            return 2;
        }
    };
    match write_template_workbook(&output) {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(err) => {
            set_last_error(&format!("{err:#}"));
            10
        }
    }
}

/// Releases a string returned by `rr_import_workbook_json()`. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn rr_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Returns the last error message as a UTF-8 C string pointer (or null if none).
/// The pointer is valid until the next `rr_*` call.
#[no_mangle]
pub extern "C" fn rr_last_error_utf8() -> *const c_char {
    let guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axis, GroupModel};

    #[test]
    fn template_written_through_the_abi_imports_as_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Flashcard_Template.xlsx");
        let c_path = CString::new(path.to_string_lossy().into_owned()).expect("path");

        assert_eq!(rr_write_template(c_path.as_ptr()), 0);
        let json_ptr = rr_import_workbook_json(c_path.as_ptr());
        assert!(!json_ptr.is_null());
        let json = unsafe { CStr::from_ptr(json_ptr) }.to_str().expect("utf8").to_string();
        unsafe { rr_string_free(json_ptr) };

        let groups: GroupModel = serde_json::from_str(&json).expect("groups json");
        assert_eq!(groups.tree(Axis::Content).len(), 2);
        assert_eq!(groups.tree(Axis::Function).len(), 1);
    }

    #[test]
    fn bad_arguments_fail_without_panicking() {
        assert!(rr_import_workbook_json(std::ptr::null()).is_null());
        assert_ne!(rr_write_template(std::ptr::null()), 0);

        let missing = CString::new("/definitely/not/here.xlsx").expect("path");
        assert!(rr_import_workbook_json(missing.as_ptr()).is_null());
    }
}
