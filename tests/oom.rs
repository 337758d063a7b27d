//! Allocation-failure behavior, driven by a switchable global allocator.
//!
//! The allocator only fails bucket-array-sized requests while armed, so the
//! test harness's own bookkeeping allocations are unaffected. Everything
//! lives in one `#[test]` so no other test in this binary can race the
//! armed flag.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use robin_hash::hash::sip;
use robin_hash::{HashTable, TableError};

struct SwitchableAlloc;

static FAIL_LARGE: AtomicBool = AtomicBool::new(false);

/// The smallest bucket array (16 buckets of two header words plus a 16-byte
/// record) is 512 bytes; harness allocations stay well under this.
const FAIL_THRESHOLD: usize = 512;

unsafe impl GlobalAlloc for SwitchableAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.size() >= FAIL_THRESHOLD && FAIL_LARGE.load(Ordering::SeqCst) {
            return ptr::null_mut();
        }
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOC: SwitchableAlloc = SwitchableAlloc;

fn arm() {
    FAIL_LARGE.store(true, Ordering::SeqCst);
}

fn disarm() {
    FAIL_LARGE.store(false, Ordering::SeqCst);
}

#[derive(Debug, PartialEq, Eq, Clone)]
struct Rec {
    key: u64,
    value: u64,
}

fn rec_hash(rec: &Rec, seed0: u64, seed1: u64) -> u64 {
    sip(&rec.key.to_le_bytes(), seed0, seed1)
}

fn rec_eq(a: &Rec, b: &Rec) -> bool {
    a.key == b.key
}

fn rec(key: u64) -> Rec {
    Rec { key, value: key * 10 }
}

fn sorted_keys(table: &HashTable<Rec>) -> Vec<u64> {
    let mut keys: Vec<u64> = table.iter().map(|r| r.key).collect();
    keys.sort_unstable();
    keys
}

#[test]
fn allocation_failure_semantics() {
    // Construction: failure is reported, nothing is left behind.
    arm();
    let result = HashTable::<Rec>::try_with_capacity_and_seeds(0, 1, 2);
    assert_eq!(result.unwrap_err(), TableError::OutOfMemory);
    disarm();

    // Fill a fresh table right up to its growth threshold (12 of 16
    // buckets at the default 75% load factor).
    let mut table = HashTable::with_capacity_and_seeds(0, 1, 2);
    for key in 0..12u64 {
        assert!(table.set(rec(key), rec_hash, rec_eq).is_none());
    }
    assert_eq!(table.len(), 12);
    let before = sorted_keys(&table);

    // A set that needs growth fails closed: the record comes back, the
    // flag is raised, and the table is untouched.
    arm();
    let rejected = table.set(rec(100), rec_hash, rec_eq);
    assert_eq!(rejected, Some(rec(100)));
    assert!(table.oom());
    assert_eq!(table.len(), 12);
    assert_eq!(sorted_keys(&table), before);
    assert!(table.get(&rec(100), rec_hash, rec_eq).is_none());
    disarm();

    // The same set succeeds once allocation works again, clearing the flag.
    assert!(table.set(rec(100), rec_hash, rec_eq).is_none());
    assert!(!table.oom());
    assert_eq!(table.len(), 13);
    assert!(table.get(&rec(100), rec_hash, rec_eq).is_some());

    // Grow the table several more times so the shrink path has room to run.
    for key in 200..500u64 {
        assert!(table.set(rec(key), rec_hash, rec_eq).is_none());
        assert!(!table.oom());
    }

    // Deletions below the shrink threshold attempt to halve the table;
    // while allocation fails the shrink is silently skipped and the table
    // keeps working at its current capacity.
    let capacity_before = table.capacity();
    let mut keys: Vec<u64> = sorted_keys(&table);
    arm();
    while table.len() > 8 {
        let key = keys.pop().unwrap();
        assert_eq!(
            table.delete(&rec(key), rec_hash, rec_eq).map(|r| r.key),
            Some(key)
        );
    }
    assert_eq!(table.capacity(), capacity_before);
    for &key in &keys {
        assert!(table.get(&rec(key), rec_hash, rec_eq).is_some());
    }
    disarm();

    // With allocation restored the next delete shrinks.
    let key = keys.pop().unwrap();
    assert!(table.delete(&rec(key), rec_hash, rec_eq).is_some());
    assert!(table.capacity() < capacity_before);
    for &key in &keys {
        assert!(table.get(&rec(key), rec_hash, rec_eq).is_some());
    }
    assert_eq!(table.len(), 7);
}
