//! Reference-counted growable list of 64-bit values.
//!
//! Append doubles capacity when full; pop halves it once the list drops
//! below a quarter occupancy. Negative indices count from the end.

use crate::runtime::memory::{orion_free, orion_malloc, orion_realloc};
use crate::runtime::{ORION_TYPE_LIST, fatal};

#[repr(C)]
pub struct OrionList {
    pub type_tag: i64,
    pub refcount: i64,
    pub size: i64,
    pub capacity: i64,
    pub data: *mut i64,
}

const MIN_CAPACITY: i64 = 4;

unsafe fn deref<'a>(list: *mut OrionList, context: &str) -> &'a mut OrionList {
    if list.is_null() {
        fatal(&format!("Cannot {context} a null list"));
    }
    unsafe { &mut *list }
}

fn data_bytes(capacity: i64) -> i64 {
    match capacity.checked_mul(8) {
        Some(bytes) => bytes,
        None => fatal("List capacity too large"),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn list_new(initial_capacity: i64) -> *mut OrionList {
    let capacity = initial_capacity.max(MIN_CAPACITY);
    let data = orion_malloc(data_bytes(capacity)) as *mut i64;
    Box::into_raw(Box::new(OrionList {
        type_tag: ORION_TYPE_LIST,
        refcount: 1,
        size: 0,
        capacity,
        data,
    }))
}

/// Copy `count` values out of a scratch buffer into a fresh list; used by
/// list literals.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_from_data(elements: *const i64, count: i64) -> *mut OrionList {
    if elements.is_null() && count > 0 {
        fatal("Cannot build a list from a null buffer");
    }
    let list = list_new(count);
    unsafe {
        let list = &mut *list;
        std::ptr::copy_nonoverlapping(elements, list.data, count as usize);
        list.size = count;
    }
    list
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_retain(list: *mut OrionList) -> *mut OrionList {
    if !list.is_null() {
        unsafe { (*list).refcount += 1 };
    }
    list
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_release(list: *mut OrionList) {
    if list.is_null() {
        return;
    }
    unsafe {
        (*list).refcount -= 1;
        if (*list).refcount <= 0 {
            orion_free((*list).data as *mut u8);
            drop(Box::from_raw(list));
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_len(list: *mut OrionList) -> i64 {
    unsafe { deref(list, "get length of") }.size
}

fn normalize_index(list: &OrionList, index: i64) -> i64 {
    let index = if index < 0 { index + list.size } else { index };
    if index < 0 || index >= list.size {
        fatal("List index out of range");
    }
    index
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_get(list: *mut OrionList, index: i64) -> i64 {
    let list = unsafe { deref(list, "access") };
    let index = normalize_index(list, index);
    unsafe { list.data.add(index as usize).read() }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_set(list: *mut OrionList, index: i64, value: i64) {
    let list = unsafe { deref(list, "modify") };
    let index = normalize_index(list, index);
    unsafe { list.data.add(index as usize).write(value) };
}

fn resize(list: &mut OrionList, new_capacity: i64) {
    list.data =
        unsafe { orion_realloc(list.data as *mut u8, data_bytes(new_capacity)) } as *mut i64;
    list.capacity = new_capacity;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_append(list: *mut OrionList, value: i64) {
    let list = unsafe { deref(list, "append to") };
    if list.size >= list.capacity {
        resize(list, list.capacity * 2);
    }
    unsafe { list.data.add(list.size as usize).write(value) };
    list.size += 1;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_pop(list: *mut OrionList) -> i64 {
    let list = unsafe { deref(list, "pop from") };
    if list.size == 0 {
        fatal("Cannot pop from empty list");
    }
    list.size -= 1;
    let value = unsafe { list.data.add(list.size as usize).read() };
    if list.size < list.capacity / 4 && list.capacity > 8 {
        resize(list, list.capacity / 2);
    }
    value
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_insert(list: *mut OrionList, index: i64, value: i64) {
    let list = unsafe { deref(list, "insert into") };
    let index = if index < 0 { index + list.size } else { index };
    // Inserting at index == size appends.
    if index < 0 || index > list.size {
        fatal("Insert index out of range");
    }
    if list.size >= list.capacity {
        resize(list, list.capacity * 2);
    }
    unsafe {
        std::ptr::copy(
            list.data.add(index as usize),
            list.data.add(index as usize + 1),
            (list.size - index) as usize,
        );
        list.data.add(index as usize).write(value);
    }
    list.size += 1;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_concat(left: *mut OrionList, right: *mut OrionList) -> *mut OrionList {
    let left = unsafe { deref(left, "concatenate") };
    let right = unsafe { deref(right, "concatenate") };
    let total = left.size + right.size;
    let result_ptr = list_new(total);
    unsafe {
        let result = &mut *result_ptr;
        std::ptr::copy_nonoverlapping(left.data, result.data, left.size as usize);
        std::ptr::copy_nonoverlapping(
            right.data,
            result.data.add(left.size as usize),
            right.size as usize,
        );
        result.size = total;
    }
    result_ptr
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_repeat(list: *mut OrionList, count: i64) -> *mut OrionList {
    let list = unsafe { deref(list, "repeat") };
    if count < 0 {
        fatal("Cannot repeat list negative times");
    }
    if count == 0 || list.size == 0 {
        return list_new(MIN_CAPACITY);
    }
    if list.size > i64::MAX / count {
        fatal("Repeated list would be too large");
    }
    let total = list.size * count;
    let result_ptr = list_new(total);
    unsafe {
        let result = &mut *result_ptr;
        for repetition in 0..count {
            std::ptr::copy_nonoverlapping(
                list.data,
                result.data.add((repetition * list.size) as usize),
                list.size as usize,
            );
        }
        result.size = total;
    }
    result_ptr
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_extend(list: *mut OrionList, other: *mut OrionList) {
    let list = unsafe { deref(list, "extend") };
    let other = unsafe { deref(other, "extend with") };
    let new_size = list.size + other.size;
    if new_size > list.capacity {
        let mut new_capacity = list.capacity;
        while new_capacity < new_size {
            new_capacity *= 2;
        }
        resize(list, new_capacity);
    }
    unsafe {
        std::ptr::copy_nonoverlapping(
            other.data,
            list.data.add(list.size as usize),
            other.size as usize,
        );
    }
    list.size = new_size;
}

/// Debug rendering to stdout.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn list_print(list: *mut OrionList) {
    if list.is_null() {
        println!("null");
        return;
    }
    let list = unsafe { &*list };
    let mut rendered = String::from("[");
    for index in 0..list.size {
        if index > 0 {
            rendered.push_str(", ");
        }
        rendered.push_str(&unsafe { list.data.add(index as usize).read() }.to_string());
    }
    rendered.push(']');
    println!("{rendered}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: *mut OrionList) -> Vec<i64> {
        unsafe { (0..list_len(list)).map(|i| list_get(list, i)).collect() }
    }

    #[test]
    fn appends_with_amortized_doubling() {
        unsafe {
            let list = list_new(0);
            assert_eq!((*list).capacity, 4);
            let mut reallocations = 0;
            let mut last_capacity = (*list).capacity;
            for value in 0..100 {
                list_append(list, value);
                if (*list).capacity != last_capacity {
                    reallocations += 1;
                    last_capacity = (*list).capacity;
                }
                assert!((*list).capacity >= (*list).size);
            }
            // 4 -> 8 -> 16 -> 32 -> 64 -> 128: logarithmic in appends.
            assert_eq!(reallocations, 5);
            assert_eq!(list_len(list), 100);
            assert_eq!(list_get(list, 99), 99);
            list_release(list);
        }
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        unsafe {
            let values = [10i64, 20, 30];
            let list = list_from_data(values.as_ptr(), 3);
            assert_eq!(list_get(list, -1), 30);
            assert_eq!(list_get(list, -1), list_get(list, list_len(list) - 1));
            assert_eq!(list_get(list, -3), 10);
            list_set(list, -2, 25);
            assert_eq!(list_get(list, 1), 25);
            list_release(list);
        }
    }

    #[test]
    fn pop_returns_last_and_shrinks_sparse_lists() {
        unsafe {
            let list = list_new(4);
            for value in 0..32 {
                list_append(list, value);
            }
            assert_eq!((*list).capacity, 32);
            for _ in 0..28 {
                list_pop(list);
            }
            assert_eq!(list_len(list), 4);
            assert!((*list).capacity < 32);
            assert!((*list).capacity >= (*list).size);
            assert_eq!(list_pop(list), 3);
            list_release(list);
        }
    }

    #[test]
    fn insert_shifts_elements_right() {
        unsafe {
            let values = [1i64, 3, 4];
            let list = list_from_data(values.as_ptr(), 3);
            list_insert(list, 1, 2);
            assert_eq!(collect(list), vec![1, 2, 3, 4]);
            list_insert(list, 4, 5);
            assert_eq!(collect(list), vec![1, 2, 3, 4, 5]);
            list_release(list);
        }
    }

    #[test]
    fn concat_and_repeat_build_new_lists() {
        unsafe {
            let left_values = [1i64, 2];
            let right_values = [3i64];
            let left = list_from_data(left_values.as_ptr(), 2);
            let right = list_from_data(right_values.as_ptr(), 1);

            let joined = list_concat(left, right);
            assert_eq!(collect(joined), vec![1, 2, 3]);

            let repeated = list_repeat(left, 3);
            assert_eq!(collect(repeated), vec![1, 2, 1, 2, 1, 2]);

            let empty = list_repeat(left, 0);
            assert_eq!(list_len(empty), 0);

            // Inputs are untouched.
            assert_eq!(collect(left), vec![1, 2]);
            assert_eq!(collect(right), vec![3]);

            for list in [left, right, joined, repeated, empty] {
                list_release(list);
            }
        }
    }

    #[test]
    fn extend_appends_in_place() {
        unsafe {
            let list = list_new(4);
            list_append(list, 1);
            let other_values = [2i64, 3, 4, 5, 6];
            let other = list_from_data(other_values.as_ptr(), 5);
            list_extend(list, other);
            assert_eq!(collect(list), vec![1, 2, 3, 4, 5, 6]);
            list_release(list);
            list_release(other);
        }
    }

    #[test]
    fn retain_keeps_the_list_alive_across_release() {
        unsafe {
            let list = list_new(4);
            list_append(list, 7);
            list_retain(list);
            list_release(list);
            // Still alive: one reference remains.
            assert_eq!(list_get(list, 0), 7);
            list_release(list);
        }
    }

    #[test]
    fn from_data_copies_rather_than_borrows() {
        unsafe {
            let mut values = [9i64, 8];
            let list = list_from_data(values.as_ptr(), 2);
            values[0] = 0;
            assert_eq!(list_get(list, 0), 9);
            list_release(list);
        }
    }
}
