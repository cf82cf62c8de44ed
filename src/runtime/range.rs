//! Lazy integer ranges: `range(start, stop, step)` never materializes its
//! elements unless converted to a list.

use crate::runtime::fatal;
use crate::runtime::list::{OrionList, list_new};

#[repr(C)]
pub struct OrionRange {
    pub refcount: i64,
    pub start: i64,
    pub stop: i64,
    pub step: i64,
    pub size: i64,
}

unsafe fn deref<'a>(range: *mut OrionRange, context: &str) -> &'a mut OrionRange {
    if range.is_null() {
        fatal(&format!("Cannot {context} a null range"));
    }
    unsafe { &mut *range }
}

/// `size = max(0, ceil((stop - start) / step))`.
fn range_size(start: i64, stop: i64, step: i64) -> i64 {
    if (step > 0 && start >= stop) || (step < 0 && start <= stop) {
        return 0;
    }
    let diff = stop - start;
    let size = if step > 0 {
        (diff + step - 1) / step
    } else {
        (diff + step + 1) / step
    };
    size.max(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn range_new(start: i64, stop: i64, step: i64) -> *mut OrionRange {
    if step == 0 {
        fatal("Range step cannot be zero");
    }
    Box::into_raw(Box::new(OrionRange {
        refcount: 1,
        start,
        stop,
        step,
        size: range_size(start, stop, step),
    }))
}

#[unsafe(no_mangle)]
pub extern "C" fn range_new_stop(stop: i64) -> *mut OrionRange {
    range_new(0, stop, 1)
}

#[unsafe(no_mangle)]
pub extern "C" fn range_new_start_stop(start: i64, stop: i64) -> *mut OrionRange {
    range_new(start, stop, 1)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn range_len(range: *mut OrionRange) -> i64 {
    unsafe { deref(range, "get length of") }.size
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn range_get(range: *mut OrionRange, index: i64) -> i64 {
    let range = unsafe { deref(range, "access") };
    if index < 0 || index >= range.size {
        fatal("Range index out of range");
    }
    range.start + index * range.step
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn range_to_list(range: *mut OrionRange) -> *mut OrionList {
    let range = unsafe { deref(range, "convert") };
    let list = list_new(range.size);
    unsafe {
        let list_ref = &mut *list;
        for index in 0..range.size {
            list_ref
                .data
                .add(index as usize)
                .write(range.start + index * range.step);
        }
        list_ref.size = range.size;
    }
    list
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn range_retain(range: *mut OrionRange) -> *mut OrionRange {
    if !range.is_null() {
        unsafe { (*range).refcount += 1 };
    }
    range
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn range_release(range: *mut OrionRange) {
    if range.is_null() {
        return;
    }
    unsafe {
        (*range).refcount -= 1;
        if (*range).refcount <= 0 {
            drop(Box::from_raw(range));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::list::{list_get, list_len, list_release};

    /// Reference ceil((stop - start) / step) clamped at zero.
    fn expected_size(start: i64, stop: i64, step: i64) -> i64 {
        let size = ((stop - start) as f64 / step as f64).ceil();
        (size.max(0.0)) as i64
    }

    #[test]
    fn size_formula_holds_over_a_grid() {
        unsafe {
            for start in -6..=6 {
                for stop in -6..=6 {
                    for step in [-4i64, -3, -2, -1, 1, 2, 3, 4] {
                        let range = range_new(start, stop, step);
                        assert_eq!(
                            range_len(range),
                            expected_size(start, stop, step),
                            "range({start}, {stop}, {step})"
                        );
                        range_release(range);
                    }
                }
            }
        }
    }

    #[test]
    fn get_steps_from_start() {
        unsafe {
            let range = range_new(2, 12, 3);
            assert_eq!(range_len(range), 4);
            assert_eq!(range_get(range, 0), 2);
            assert_eq!(range_get(range, 1), 5);
            assert_eq!(range_get(range, 3), 11);
            range_release(range);
        }
    }

    #[test]
    fn descending_ranges_step_down() {
        unsafe {
            let range = range_new(10, 0, -2);
            assert_eq!(range_len(range), 5);
            assert_eq!(range_get(range, 0), 10);
            assert_eq!(range_get(range, 4), 2);
            range_release(range);
        }
    }

    #[test]
    fn convenience_constructors_default_start_and_step() {
        unsafe {
            let stop_only = range_new_stop(5);
            assert_eq!(range_len(stop_only), 5);
            assert_eq!(range_get(stop_only, 0), 0);

            let bounded = range_new_start_stop(3, 7);
            assert_eq!(range_len(bounded), 4);
            assert_eq!(range_get(bounded, 0), 3);

            range_release(stop_only);
            range_release(bounded);
        }
    }

    #[test]
    fn empty_ranges_have_zero_len() {
        unsafe {
            for (start, stop, step) in [(5, 5, 1), (5, 0, 1), (0, 5, -1)] {
                let range = range_new(start, stop, step);
                assert_eq!(range_len(range), 0);
                range_release(range);
            }
        }
    }

    #[test]
    fn to_list_materializes_all_elements() {
        unsafe {
            let range = range_new(0, 10, 4);
            let list = range_to_list(range);
            assert_eq!(list_len(list), 3);
            assert_eq!(
                (0..3).map(|i| list_get(list, i)).collect::<Vec<_>>(),
                vec![0, 4, 8]
            );
            list_release(list);
            range_release(range);
        }
    }
}
