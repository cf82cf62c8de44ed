//! Console input for generated programs.

use std::ffi::{CStr, c_char};
use std::io::{BufRead, Read, Write};

use crate::runtime::string::alloc_cstr;

const MAX_LINE_BYTES: u64 = 1024;

/// Read one line from stdin, capped at 1024 bytes, trailing newline
/// stripped. EOF yields an empty string.
#[unsafe(no_mangle)]
pub extern "C" fn orion_input() -> *mut c_char {
    let stdin = std::io::stdin();
    let mut limited = stdin.lock().take(MAX_LINE_BYTES);
    let mut buffer = Vec::new();
    if limited.read_until(b'\n', &mut buffer).is_err() {
        buffer.clear();
    }
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    }
    if buffer.last() == Some(&b'\r') {
        buffer.pop();
    }
    alloc_cstr(&String::from_utf8_lossy(&buffer))
}

/// Print `prompt`, flush, then read a line.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn orion_input_prompt(prompt: *const c_char) -> *mut c_char {
    if !prompt.is_null() {
        let text = unsafe { CStr::from_ptr(prompt) };
        print!("{}", text.to_string_lossy());
        let _ = std::io::stdout().flush();
    }
    orion_input()
}
