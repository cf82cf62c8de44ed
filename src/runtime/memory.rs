//! Allocator wrappers exposed to generated code.
//!
//! Each allocation carries a 16-byte header recording its total size, so
//! `orion_free` and `orion_realloc` can reconstruct the layout from the bare
//! pointer the generated assembly hands back.

use std::alloc::{Layout, alloc, dealloc, realloc};

use crate::runtime::fatal;

const HEADER: usize = 16;
const ALIGNMENT: usize = 16;

fn layout_for(total: usize) -> Layout {
    match Layout::from_size_align(total, ALIGNMENT) {
        Ok(layout) => layout,
        Err(_) => fatal("Allocation size too large"),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn orion_malloc(size: i64) -> *mut u8 {
    let requested = if size <= 0 { 1 } else { size as usize };
    let total = match requested.checked_add(HEADER) {
        Some(total) => total,
        None => fatal("Allocation size too large"),
    };
    let base = unsafe { alloc(layout_for(total)) };
    if base.is_null() {
        fatal("Failed to allocate memory");
    }
    unsafe {
        (base as *mut usize).write(total);
        base.add(HEADER)
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn orion_free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let base = ptr.sub(HEADER);
        let total = (base as *const usize).read();
        dealloc(base, layout_for(total));
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn orion_realloc(ptr: *mut u8, size: i64) -> *mut u8 {
    if ptr.is_null() {
        return orion_malloc(size);
    }
    let requested = if size <= 0 { 1 } else { size as usize };
    let new_total = match requested.checked_add(HEADER) {
        Some(total) => total,
        None => fatal("Allocation size too large"),
    };
    unsafe {
        let base = ptr.sub(HEADER);
        let old_total = (base as *const usize).read();
        let moved = realloc(base, layout_for(old_total), new_total);
        if moved.is_null() {
            fatal("Failed to resize allocation");
        }
        (moved as *mut usize).write(new_total);
        moved.add(HEADER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_writable_and_aligned() {
        let ptr = orion_malloc(64);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % ALIGNMENT, 0);
        unsafe {
            for offset in 0..64 {
                ptr.add(offset).write(offset as u8);
            }
            assert_eq!(ptr.add(63).read(), 63);
            orion_free(ptr);
        }
    }

    #[test]
    fn realloc_preserves_contents() {
        let ptr = orion_malloc(8);
        unsafe {
            (ptr as *mut i64).write(0x1234_5678);
            let grown = orion_realloc(ptr, 1024);
            assert_eq!((grown as *const i64).read(), 0x1234_5678);
            orion_free(grown);
        }
    }

    #[test]
    fn zero_sized_requests_still_allocate() {
        let ptr = orion_malloc(0);
        assert!(!ptr.is_null());
        unsafe { orion_free(ptr) };
    }

    #[test]
    fn free_tolerates_null() {
        unsafe { orion_free(std::ptr::null_mut()) };
    }
}
