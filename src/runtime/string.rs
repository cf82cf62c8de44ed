//! String objects, rendering helpers, and the typed coercion surface.
//!
//! Flat `char*` results come out of `orion_malloc` so generated code can
//! hand them to `orion_free` or hold them indefinitely. The `__orion_*`
//! coercions are the compiler-inserted conversion set; parse failures are
//! fatal, matching the rest of the runtime.

use std::ffi::{CStr, c_char};
use std::num::IntErrorKind;

use crate::runtime::fatal;
use crate::runtime::memory::{orion_free, orion_malloc};

#[repr(C)]
pub struct OrionString {
    pub refcount: i64,
    pub data: *mut c_char,
}

/// Copy `text` into a fresh NUL-terminated allocation.
pub(crate) fn alloc_cstr(text: &str) -> *mut c_char {
    let bytes = text.as_bytes();
    let buffer = orion_malloc(bytes.len() as i64 + 1);
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
        buffer.add(bytes.len()).write(0);
    }
    buffer as *mut c_char
}

unsafe fn cstr_text<'a>(value: *const c_char, context: &str) -> &'a str {
    if value.is_null() {
        fatal(&format!("Cannot convert null string to {context}"));
    }
    match unsafe { CStr::from_ptr(value) }.to_str() {
        Ok(text) => text,
        Err(_) => fatal(&format!("Invalid {context} conversion input")),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_new(value: *const c_char) -> *mut OrionString {
    let data = if value.is_null() {
        alloc_cstr("")
    } else {
        let text = unsafe { CStr::from_ptr(value) };
        alloc_cstr(&text.to_string_lossy())
    };
    Box::into_raw(Box::new(OrionString { refcount: 1, data }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_retain(string: *mut OrionString) -> *mut OrionString {
    if !string.is_null() {
        unsafe { (*string).refcount += 1 };
    }
    string
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_release(string: *mut OrionString) {
    if string.is_null() {
        return;
    }
    unsafe {
        (*string).refcount -= 1;
        if (*string).refcount <= 0 {
            orion_free((*string).data as *mut u8);
            drop(Box::from_raw(string));
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_get_cstr(string: *mut OrionString) -> *mut c_char {
    if string.is_null() {
        return std::ptr::null_mut();
    }
    unsafe { (*string).data }
}

#[unsafe(no_mangle)]
pub extern "C" fn int_to_string(value: i64) -> *mut c_char {
    alloc_cstr(&value.to_string())
}

#[unsafe(no_mangle)]
pub extern "C" fn float_to_string(value: f64) -> *mut c_char {
    alloc_cstr(&format!("{value:.2}"))
}

/// UI rendering: Python-style capitalization.
#[unsafe(no_mangle)]
pub extern "C" fn bool_to_string(value: i64) -> *mut c_char {
    alloc_cstr(if value != 0 { "True" } else { "False" })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_to_string(value: *const c_char) -> *mut c_char {
    if value.is_null() {
        return alloc_cstr("");
    }
    alloc_cstr(&unsafe { CStr::from_ptr(value) }.to_string_lossy())
}

/// Concatenate `count` C strings into one fresh allocation; nulls are
/// skipped.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn string_concat_parts(parts: *const *const c_char, count: i64) -> *mut c_char {
    if parts.is_null() || count <= 0 {
        return alloc_cstr("");
    }
    let mut joined = String::new();
    for index in 0..count {
        let part = unsafe { parts.add(index as usize).read() };
        if !part.is_null() {
            joined.push_str(&unsafe { CStr::from_ptr(part) }.to_string_lossy());
        }
    }
    alloc_cstr(&joined)
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_int_to_string(value: i64) -> *mut c_char {
    alloc_cstr(&value.to_string())
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_float_to_string(value: f64) -> *mut c_char {
    alloc_cstr(&value.to_string())
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_bool_to_string(value: i64) -> *mut c_char {
    alloc_cstr(if value != 0 { "true" } else { "false" })
}

/// Truncates toward zero.
#[unsafe(no_mangle)]
pub extern "C" fn __orion_float_to_int(value: f64) -> i64 {
    value as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_bool_to_int(value: i64) -> i64 {
    if value != 0 { 1 } else { 0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn __orion_string_to_int(value: *const c_char) -> i64 {
    let text = unsafe { cstr_text(value, "integer") };
    let trimmed = text.trim_start();
    match trimmed.parse::<i64>() {
        Ok(parsed) => parsed,
        Err(error) => match error.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                fatal(&format!("Integer overflow in string conversion: '{text}'"))
            }
            _ => fatal(&format!("Invalid integer format: '{text}'")),
        },
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_int_to_float(value: i64) -> f64 {
    value as f64
}

#[unsafe(no_mangle)]
pub extern "C" fn __orion_bool_to_float(value: i64) -> f64 {
    if value != 0 { 1.0 } else { 0.0 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn __orion_string_to_float(value: *const c_char) -> f64 {
    let text = unsafe { cstr_text(value, "float") };
    let trimmed = text.trim_start();
    match trimmed.parse::<f64>() {
        Ok(parsed) => parsed,
        Err(_) => fatal(&format!("Invalid float format: '{text}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(ptr: *mut c_char) -> String {
        let text = unsafe { CStr::from_ptr(ptr) }
            .to_str()
            .expect("ascii output")
            .to_string();
        unsafe { orion_free(ptr as *mut u8) };
        text
    }

    #[test]
    fn renders_integers_floats_and_bools() {
        assert_eq!(read(int_to_string(-42)), "-42");
        assert_eq!(read(float_to_string(3.14159)), "3.14");
        assert_eq!(read(bool_to_string(1)), "True");
        assert_eq!(read(bool_to_string(0)), "False");
        assert_eq!(read(__orion_bool_to_string(1)), "true");
    }

    #[test]
    fn coercion_round_trips_every_extreme() {
        for value in [0, 1, -1, 999_999, i64::MAX, i64::MIN] {
            let rendered = int_to_string(value);
            let parsed = unsafe { __orion_string_to_int(rendered) };
            assert_eq!(parsed, value);
            unsafe { orion_free(rendered as *mut u8) };
        }
    }

    #[test]
    fn string_to_int_accepts_leading_whitespace_and_sign() {
        assert_eq!(unsafe { __orion_string_to_int(c"  42".as_ptr()) }, 42);
        assert_eq!(unsafe { __orion_string_to_int(c"-7".as_ptr()) }, -7);
        assert_eq!(unsafe { __orion_string_to_int(c"+9".as_ptr()) }, 9);
    }

    #[test]
    fn float_conversions_truncate_toward_zero() {
        assert_eq!(__orion_float_to_int(2.9), 2);
        assert_eq!(__orion_float_to_int(-2.9), -2);
        assert_eq!(__orion_int_to_float(5), 5.0);
        assert_eq!(unsafe { __orion_string_to_float(c"2.5".as_ptr()) }, 2.5);
    }

    #[test]
    fn string_objects_share_through_refcounts() {
        unsafe {
            let string = string_new(c"hello".as_ptr());
            string_retain(string);
            string_release(string);
            let text = CStr::from_ptr(string_get_cstr(string));
            assert_eq!(text.to_str().expect("ascii"), "hello");
            string_release(string);
        }
    }

    #[test]
    fn concat_parts_joins_and_skips_nulls() {
        let parts: [*const c_char; 3] = [c"foo".as_ptr(), std::ptr::null(), c"bar".as_ptr()];
        let joined = unsafe { string_concat_parts(parts.as_ptr(), 3) };
        assert_eq!(read(joined), "foobar");

        let empty = unsafe { string_concat_parts(std::ptr::null(), 0) };
        assert_eq!(read(empty), "");
    }

    #[test]
    fn copies_are_independent_allocations() {
        unsafe {
            let original = c"data".as_ptr();
            let copy = string_to_string(original);
            assert_ne!(copy as *const c_char, original);
            assert_eq!(read(copy), "data");
        }
    }
}
