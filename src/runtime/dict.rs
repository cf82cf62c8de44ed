//! Reference-counted hash dictionary over 64-bit keys and values.
//!
//! Open addressing with linear probing. Deleted entries become tombstones
//! that keep probe chains intact; they are dropped wholesale whenever the
//! table rehashes. Crossing a 0.7 load factor doubles the capacity.

use crate::runtime::list::{OrionList, list_append, list_new};
use crate::runtime::memory::{orion_free, orion_malloc};
use crate::runtime::{ORION_TYPE_DICT, fatal};

#[repr(C)]
pub struct DictEntry {
    pub key: i64,
    pub value: i64,
    pub occupied: bool,
    pub deleted: bool,
}

#[repr(C)]
pub struct OrionDict {
    pub type_tag: i64,
    pub refcount: i64,
    pub size: i64,
    pub capacity: i64,
    pub entries: *mut DictEntry,
}

const MIN_CAPACITY: i64 = 8;
const MAX_LOAD_FACTOR: f64 = 0.7;

/// Knuth multiplicative hash.
fn hash_key(key: i64, capacity: i64) -> i64 {
    let hash = (key as u64).wrapping_mul(2654435761);
    (hash % capacity as u64) as i64
}

unsafe fn deref<'a>(dict: *mut OrionDict, context: &str) -> &'a mut OrionDict {
    if dict.is_null() {
        fatal(&format!("Cannot {context} a null dictionary"));
    }
    unsafe { &mut *dict }
}

fn alloc_entries(capacity: i64) -> *mut DictEntry {
    let bytes = match capacity.checked_mul(std::mem::size_of::<DictEntry>() as i64) {
        Some(bytes) => bytes,
        None => fatal("Dictionary capacity too large"),
    };
    let entries = orion_malloc(bytes) as *mut DictEntry;
    for index in 0..capacity {
        unsafe {
            entries.add(index as usize).write(DictEntry {
                key: 0,
                value: 0,
                occupied: false,
                deleted: false,
            });
        }
    }
    entries
}

unsafe fn entry<'a>(dict: &OrionDict, index: i64) -> &'a mut DictEntry {
    unsafe { &mut *dict.entries.add(index as usize) }
}

#[unsafe(no_mangle)]
pub extern "C" fn dict_new(initial_capacity: i64) -> *mut OrionDict {
    let capacity = initial_capacity.max(MIN_CAPACITY);
    Box::into_raw(Box::new(OrionDict {
        type_tag: ORION_TYPE_DICT,
        refcount: 1,
        size: 0,
        capacity,
        entries: alloc_entries(capacity),
    }))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_retain(dict: *mut OrionDict) -> *mut OrionDict {
    if !dict.is_null() {
        unsafe { (*dict).refcount += 1 };
    }
    dict
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_release(dict: *mut OrionDict) {
    if dict.is_null() {
        return;
    }
    unsafe {
        (*dict).refcount -= 1;
        if (*dict).refcount <= 0 {
            orion_free((*dict).entries as *mut u8);
            drop(Box::from_raw(dict));
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_len(dict: *mut OrionDict) -> i64 {
    unsafe { deref(dict, "get length of") }.size
}

/// Index of `key`, or -1. Tombstones keep the probe walking.
fn find_entry(dict: &OrionDict, key: i64) -> i64 {
    let start = hash_key(key, dict.capacity);
    let mut index = start;
    loop {
        let slot = unsafe { entry(dict, index) };
        if !slot.occupied && !slot.deleted {
            return -1;
        }
        if slot.occupied && slot.key == key {
            return index;
        }
        index = (index + 1) % dict.capacity;
        if index == start {
            return -1;
        }
    }
}

fn rehash(dict: &mut OrionDict, new_capacity: i64) {
    let old_entries = dict.entries;
    let old_capacity = dict.capacity;

    dict.entries = alloc_entries(new_capacity);
    dict.capacity = new_capacity;
    dict.size = 0;

    for index in 0..old_capacity {
        let slot = unsafe { &*old_entries.add(index as usize) };
        if slot.occupied {
            insert(dict, slot.key, slot.value);
        }
    }
    unsafe { orion_free(old_entries as *mut u8) };
}

fn insert(dict: &mut OrionDict, key: i64, value: i64) {
    let start = hash_key(key, dict.capacity);
    let mut index = start;
    loop {
        let slot = unsafe { entry(dict, index) };
        if slot.occupied && slot.key == key {
            slot.value = value;
            return;
        }
        if !slot.occupied && !slot.deleted {
            *slot = DictEntry {
                key,
                value,
                occupied: true,
                deleted: false,
            };
            dict.size += 1;
            return;
        }
        index = (index + 1) % dict.capacity;
        if index == start {
            // Every slot is occupied or a tombstone; rehashing at the same
            // capacity clears the tombstones and frees a slot.
            rehash(dict, dict.capacity);
            insert(dict, key, value);
            return;
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_set(dict: *mut OrionDict, key: i64, value: i64) {
    let dict = unsafe { deref(dict, "set value in") };
    if dict.size as f64 / dict.capacity as f64 > MAX_LOAD_FACTOR {
        rehash(dict, dict.capacity * 2);
    }
    insert(dict, key, value);
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_get(dict: *mut OrionDict, key: i64) -> i64 {
    let dict = unsafe { deref(dict, "get value from") };
    let index = find_entry(dict, key);
    if index == -1 {
        fatal("Key not found in dictionary");
    }
    unsafe { entry(dict, index) }.value
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_get_default(dict: *mut OrionDict, key: i64, default_value: i64) -> i64 {
    if dict.is_null() {
        return default_value;
    }
    let dict = unsafe { &*dict };
    let index = find_entry(dict, key);
    if index == -1 {
        return default_value;
    }
    unsafe { entry(dict, index) }.value
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_contains(dict: *mut OrionDict, key: i64) -> i64 {
    if dict.is_null() {
        return 0;
    }
    let dict = unsafe { &*dict };
    if find_entry(dict, key) != -1 { 1 } else { 0 }
}

fn remove_entry(dict: &mut OrionDict, index: i64) -> i64 {
    let slot = unsafe { entry(dict, index) };
    let value = slot.value;
    slot.occupied = false;
    slot.deleted = true;
    dict.size -= 1;
    value
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_delete(dict: *mut OrionDict, key: i64) {
    let dict = unsafe { deref(dict, "delete from") };
    let index = find_entry(dict, key);
    if index == -1 {
        fatal("Cannot delete key that doesn't exist");
    }
    remove_entry(dict, index);
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_pop(dict: *mut OrionDict, key: i64) -> i64 {
    let dict = unsafe { deref(dict, "pop from") };
    let index = find_entry(dict, key);
    if index == -1 {
        fatal("Cannot pop key that doesn't exist");
    }
    remove_entry(dict, index)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_pop_default(dict: *mut OrionDict, key: i64, default_value: i64) -> i64 {
    if dict.is_null() {
        return default_value;
    }
    let dict = unsafe { deref(dict, "pop from") };
    let index = find_entry(dict, key);
    if index == -1 {
        return default_value;
    }
    remove_entry(dict, index)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_keys(dict: *mut OrionDict) -> *mut OrionList {
    let dict = unsafe { deref(dict, "get keys from") };
    let keys = list_new(dict.size);
    for index in 0..dict.capacity {
        let slot = unsafe { entry(dict, index) };
        if slot.occupied {
            unsafe { list_append(keys, slot.key) };
        }
    }
    keys
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_values(dict: *mut OrionDict) -> *mut OrionList {
    let dict = unsafe { deref(dict, "get values from") };
    let values = list_new(dict.size);
    for index in 0..dict.capacity {
        let slot = unsafe { entry(dict, index) };
        if slot.occupied {
            unsafe { list_append(values, slot.value) };
        }
    }
    values
}

/// Alternating key/value pairs in one flat list.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_items(dict: *mut OrionDict) -> *mut OrionList {
    let dict = unsafe { deref(dict, "get items from") };
    let items = list_new(dict.size * 2);
    for index in 0..dict.capacity {
        let slot = unsafe { entry(dict, index) };
        if slot.occupied {
            unsafe {
                list_append(items, slot.key);
                list_append(items, slot.value);
            }
        }
    }
    items
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_clear(dict: *mut OrionDict) {
    let dict = unsafe { deref(dict, "clear") };
    for index in 0..dict.capacity {
        let slot = unsafe { entry(dict, index) };
        slot.occupied = false;
        slot.deleted = false;
    }
    dict.size = 0;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn dict_update(dict: *mut OrionDict, other: *mut OrionDict) {
    let target = unsafe { deref(dict, "update") };
    let other = unsafe { deref(other, "update with") };
    for index in 0..other.capacity {
        let slot = unsafe { entry(other, index) };
        if slot.occupied {
            if target.size as f64 / target.capacity as f64 > MAX_LOAD_FACTOR {
                rehash(target, target.capacity * 2);
            }
            insert(target, slot.key, slot.value);
        }
    }
}
