//! Runtime support library linked into every produced executable.
//!
//! Every public function here has C linkage and an unmangled name so the
//! generated assembly can call it directly; the crate also builds as a
//! `staticlib` to produce the `runtime.o`-style archive the link step
//! expects. Heap objects are shared through reference counts; cycles are
//! not collected. Errors never return control: they print to stderr and
//! terminate the process with status 1.

pub mod dict;
pub mod io;
pub mod list;
pub mod memory;
pub mod range;
pub mod string;

use std::ffi::c_char;

use dict::{OrionDict, dict_get, dict_set};
use list::{OrionList, list_get, list_set};

/// Leading type-tag word of heap collections.
pub const ORION_TYPE_LIST: i64 = 1;
pub const ORION_TYPE_DICT: i64 = 2;

/// Report a runtime error and terminate. Mirrors the error policy of the
/// whole library: no runtime call site ever observes a failure.
pub(crate) fn fatal(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

/// Indexing dispatch: read the tag word and route to the list or dict
/// implementation.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn collection_get(object: *mut i64, key: i64) -> i64 {
    if object.is_null() {
        fatal("Cannot index a null collection");
    }
    unsafe {
        match *object {
            ORION_TYPE_LIST => list_get(object as *mut OrionList, key),
            ORION_TYPE_DICT => dict_get(object as *mut OrionDict, key),
            _ => fatal("Unknown collection type tag"),
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn collection_set(object: *mut i64, key: i64, value: i64) {
    if object.is_null() {
        fatal("Cannot index a null collection");
    }
    unsafe {
        match *object {
            ORION_TYPE_LIST => list_set(object as *mut OrionList, key, value),
            ORION_TYPE_DICT => dict_set(object as *mut OrionDict, key, value),
            _ => fatal("Unknown collection type tag"),
        }
    }
}

const POINTER_THRESHOLD: i64 = 0x100000;
const MAX_PLAUSIBLE_STRING: usize = 100_000;

/// NUL-terminated text behind `ptr`, if it looks like a live C string.
unsafe fn read_plausible_string(ptr: *const u8) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe {
        if ptr.read() == 0 {
            return None;
        }
        for length in 1..MAX_PLAUSIBLE_STRING {
            if ptr.add(length).read() == 0 {
                let bytes = std::slice::from_raw_parts(ptr, length);
                return Some(String::from_utf8_lossy(bytes).into_owned());
            }
        }
    }
    None
}

/// Print a value whose static type the compiler could not determine: heap
/// strings pass a pointer heuristic, everything else prints as an integer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn print_smart(value: i64) {
    if value > POINTER_THRESHOLD {
        if let Some(text) = unsafe { read_plausible_string(value as *const u8) } {
            println!("{text}");
            return;
        }
    }
    println!("{value}");
}

/// Same heuristic as `print_smart`, reported as a static tag string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn detect_type(value: i64) -> *const c_char {
    if value > POINTER_THRESHOLD
        && unsafe { read_plausible_string(value as *const u8) }.is_some()
    {
        return c"datatype: string\n".as_ptr();
    }
    c"datatype: int\n".as_ptr()
}
