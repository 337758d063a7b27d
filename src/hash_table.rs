//! A hash table using Robin Hood open addressing with backward-shift
//! deletion.
//!
//! Every occupied bucket records its probe distance: 1 for a record sitting
//! in its home bucket (`hash & mask`), 2 for one slot past home, and so on.
//! Zero marks an empty bucket. During insertion the incoming entry walks
//! forward from its home bucket; whenever it has probed further than the
//! record occupying a slot, the two swap and the displaced record continues
//! probing. This "steal from the rich" rule keeps the variance of probe
//! lengths small, which in turn lets lookups give up early: a lookup that has
//! probed further than the record in the current slot can stop, because the
//! insertion rule would never have pushed its target beyond that point.
//!
//! Deletion uses backward-shift compaction instead of tombstones. After a
//! record is removed, the records following it are shifted one slot toward
//! the vacancy (their probe distances decremented) until an empty slot or a
//! record in its home position is reached. Empty therefore always means
//! truly empty, and probe sequences never lengthen as the table churns.
//!
//! ## Design
//!
//! The bucket array is a single raw allocation of `cap` buckets, each holding
//! a probe-distance word, the record's cached 64-bit hash, and the record
//! payload inline. `cap` is always a power of two of at least 16 so home
//! buckets can be computed by masking rather than modulo. Growth doubles the
//! capacity at 75% occupancy (87.5% with the `density-eighty-seven`
//! feature); deletion halves it at 10% occupancy, but never below the
//! capacity the table was constructed with.
//!
//! Hashes are cached at insertion time and reused verbatim during resizes, so
//! the hash callback runs exactly once per inserted record no matter how
//! often the table reallocates. The high bit of every cached hash is cleared
//! on entry; the slot occupancy convention reserves it, and clearing it even
//! when unused keeps stored hashes comparable across implementations of the
//! same layout.
//!
//! The table stores two 64-bit seeds chosen at construction and passes them
//! to the caller's hash callback on every record-keyed operation ([`set`],
//! [`get`], [`delete`]). The hash-keyed operations ([`insert`], [`find`],
//! [`find_mut`], [`remove`]) accept a precomputed hash instead and back the
//! [`HashMap`] and [`HashSet`] wrappers.
//!
//! ## Safety Invariants
//!
//! 1. **Bounds**: every bucket index is produced by masking with `cap - 1`,
//!    so all accesses stay inside the allocation of `cap` buckets.
//! 2. **Initialization**: a nonzero probe distance guarantees the bucket's
//!    payload is initialized; zero guarantees it holds no live record.
//! 3. **Occupancy accounting**: `count` equals the number of buckets with a
//!    nonzero probe distance, and `count < cap` at all times (growth happens
//!    well before the array fills), so probe loops always terminate at an
//!    empty slot.
//! 4. **Ownership**: replaced and removed records are moved out and returned
//!    to the caller; only [`clear`] and `Drop` run record destructors.
//!
//! [`set`]: HashTable::set
//! [`get`]: HashTable::get
//! [`delete`]: HashTable::delete
//! [`insert`]: HashTable::insert
//! [`find`]: HashTable::find
//! [`find_mut`]: HashTable::find_mut
//! [`remove`]: HashTable::remove
//! [`clear`]: HashTable::clear
//! [`HashMap`]: crate::hash_map::HashMap
//! [`HashSet`]: crate::hash_set::HashSet

use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use cfg_if::cfg_if;

use crate::error::TableError;

cfg_if! {
    if #[cfg(feature = "density-eighty-seven")] {
        const GROW_LOAD: f32 = 0.875;
    } else {
        const GROW_LOAD: f32 = 0.75;
    }
}

const SHRINK_LOAD: f32 = 0.10;

/// Capacity floor. Requested capacities are rounded up to a power of two and
/// never fall below this.
const MIN_CAP: usize = 16;

/// The high bit of a cached hash is reserved by the bucket layout; it is
/// cleared from every hash before storage or comparison.
const HASH_MASK: u64 = u64::MAX >> 1;

#[inline(always)]
fn clip_hash(hash: u64) -> u64 {
    hash & HASH_MASK
}

#[inline(always)]
fn grow_threshold(cap: usize) -> usize {
    (cap as f32 * GROW_LOAD) as usize
}

#[inline(always)]
fn shrink_threshold(cap: usize) -> usize {
    (cap as f32 * SHRINK_LOAD) as usize
}

/// One slot of the bucket array.
///
/// `dib` ("distance to initial bucket") is zero for an empty slot and
/// `1 + (index - home) mod cap` for an occupied one. The payload is only
/// initialized while `dib` is nonzero.
struct Bucket<V> {
    dib: usize,
    hash: u64,
    value: MaybeUninit<V>,
}

/// Debug statistics for table analysis.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of records currently stored.
    pub populated: usize,
    /// Records the table can hold before the next growth.
    pub capacity: usize,
    /// Allocated bucket slots.
    pub buckets: usize,
    /// `populated / buckets`.
    pub load_factor: f64,
    /// Bytes allocated for the bucket array.
    pub total_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Robin Hood Table Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.buckets,
            self.load_factor * 100.0
        );
        println!("Capacity before growth: {}", self.capacity);
        println!("Allocated: {} bytes", self.total_bytes);
    }
}

/// Number of probe distances tracked individually by [`ProbeHistogram`];
/// longer probes are lumped into [`ProbeHistogram::long_probes`].
#[cfg(feature = "stats")]
pub const PROBE_BUCKETS: usize = 16;

/// Histogram of probe distances for analyzing displacement behavior.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct ProbeHistogram {
    /// Occupied slots at probe distance `i + 1`, for the first
    /// [`PROBE_BUCKETS`] distances.
    pub by_distance: [usize; PROBE_BUCKETS],
    /// Occupied slots at probe distance greater than [`PROBE_BUCKETS`].
    pub long_probes: usize,
    /// Largest probe distance currently in the table.
    pub max_distance: usize,
}

#[cfg(feature = "stats")]
impl ProbeHistogram {
    /// Pretty-print the histogram.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = *self.by_distance.iter().max().unwrap_or(&0);
        if max == 0 && self.long_probes == 0 {
            println!("probe histogram: empty");
            return;
        }
        println!("probe distance histogram (max {}):", self.max_distance);
        for (i, &count) in self.by_distance.iter().enumerate() {
            let bar = "#".repeat(if max == 0 { 0 } else { count * 60 / max });
            println!("{:>2} | {} ({})", i + 1, bar, count);
        }
        println!(" > | ({})", self.long_probes);
    }
}

/// A hash table using Robin Hood open addressing.
///
/// `HashTable<V>` stores records of type `V` which embed their own key
/// fields; key identity is defined entirely by the hash and equality
/// callbacks the caller supplies. Records move in and out of the table by
/// value, and references returned by lookups borrow the table, so any
/// mutating call ends their lifetime.
///
/// ## Performance Characteristics
///
/// - **Memory**: two words per bucket overhead, plus the size of `V`.
/// - **Operations**: amortized O(1) insert/lookup/delete; O(cap) during a
///   resize.
///
/// # Examples
///
/// ```rust
/// use robin_hash::hash::sip;
/// use robin_hash::HashTable;
///
/// #[derive(Debug, PartialEq)]
/// struct User {
///     name: &'static str,
///     age: u32,
/// }
///
/// fn hash_user(user: &User, seed0: u64, seed1: u64) -> u64 {
///     sip(user.name.as_bytes(), seed0, seed1)
/// }
///
/// fn user_eq(a: &User, b: &User) -> bool {
///     a.name == b.name
/// }
///
/// let mut table = HashTable::new();
/// table.set(User { name: "Dale", age: 44 }, hash_user, user_eq);
/// table.set(User { name: "Jane", age: 47 }, hash_user, user_eq);
///
/// let probe = User { name: "Jane", age: 0 };
/// assert_eq!(table.get(&probe, hash_user, user_eq).map(|u| u.age), Some(47));
/// assert!(table.delete(&probe, hash_user, user_eq).is_some());
/// assert_eq!(table.len(), 1);
/// ```
pub struct HashTable<V> {
    buckets: NonNull<Bucket<V>>,
    cap: usize,
    mask: usize,
    count: usize,
    growat: usize,
    shrinkat: usize,
    initial_cap: usize,
    seed0: u64,
    seed1: u64,
    oom: bool,
    marker: PhantomData<Bucket<V>>,
}

// SAFETY: The table owns its records outright and hands out references only
// through `&self`/`&mut self`, so thread transfer and sharing follow `V`.
unsafe impl<V: Send> Send for HashTable<V> {}
unsafe impl<V: Sync> Sync for HashTable<V> {}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashTable")
            .field("count", &self.count)
            .field("buckets", &self.cap)
            .field("growat", &self.growat)
            .field("shrinkat", &self.shrinkat)
            .field("oom", &self.oom)
            .finish()
    }
}

impl<V> Default for HashTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let buckets = Self::alloc_buckets_or_abort(self.cap);

        // SAFETY: Both arrays span `cap` buckets. The destination is zeroed
        // (all-empty), and for every source slot with a nonzero probe
        // distance the payload is initialized, so `assume_init_ref` is safe
        // and each clone lands in an unoccupied destination slot.
        unsafe {
            for index in 0..self.cap {
                let src = self.bucket_ptr(index);
                if (*src).dib == 0 {
                    continue;
                }
                let dst = buckets.as_ptr().add(index);
                (*dst).dib = (*src).dib;
                (*dst).hash = (*src).hash;
                (*dst).value.write((*src).value.assume_init_ref().clone());
            }
        }

        HashTable {
            buckets,
            cap: self.cap,
            mask: self.mask,
            count: self.count,
            growat: self.growat,
            shrinkat: self.shrinkat,
            initial_cap: self.initial_cap,
            seed0: self.seed0,
            seed1: self.seed1,
            oom: false,
            marker: PhantomData,
        }
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        self.drop_occupied();
        // SAFETY: Every payload has just been dropped, and the allocation is
        // live with the layout implied by `self.cap`.
        unsafe {
            self.release_buckets();
        }
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table with the default capacity floor of 16 buckets
    /// and both seeds zero.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty table sized for `capacity` records, with both seeds
    /// zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_seeds(capacity, 0, 0)
    }

    /// Creates an empty table sized for `capacity` records.
    ///
    /// The bucket array is the smallest power of two that is at least
    /// `max(16, capacity)`; that size also becomes the floor below which the
    /// table never shrinks. `seed0` and `seed1` are handed to the hash
    /// callback of every record-keyed operation for the table's lifetime.
    ///
    /// Aborts the process on allocation failure; use
    /// [`try_with_capacity_and_seeds`](Self::try_with_capacity_and_seeds)
    /// to observe the failure instead.
    pub fn with_capacity_and_seeds(capacity: usize, seed0: u64, seed1: u64) -> Self {
        match Self::try_with_capacity_and_seeds(capacity, seed0, seed1) {
            Ok(table) => table,
            Err(TableError::CapacityOverflow) => panic!("allocation size overflow"),
            Err(TableError::OutOfMemory) => {
                let cap = capacity.max(MIN_CAP).next_power_of_two();
                handle_alloc_error(
                    Layout::array::<Bucket<V>>(cap).expect("allocation size overflow"),
                )
            }
        }
    }

    /// Fallible variant of
    /// [`with_capacity_and_seeds`](Self::with_capacity_and_seeds).
    ///
    /// On error nothing has been allocated; there is no partially
    /// constructed table to observe.
    pub fn try_with_capacity_and_seeds(
        capacity: usize,
        seed0: u64,
        seed1: u64,
    ) -> Result<Self, TableError> {
        let initial_cap = capacity
            .max(MIN_CAP)
            .checked_next_power_of_two()
            .ok_or(TableError::CapacityOverflow)?;
        let buckets = Self::alloc_buckets(initial_cap)?;

        Ok(HashTable {
            buckets,
            cap: initial_cap,
            mask: initial_cap - 1,
            count: 0,
            growat: grow_threshold(initial_cap),
            shrinkat: shrink_threshold(initial_cap),
            initial_cap,
            seed0,
            seed1,
            oom: false,
            marker: PhantomData,
        })
    }

    /// Allocates a zeroed bucket array; zeroed probe distances mark every
    /// slot empty.
    fn alloc_buckets(cap: usize) -> Result<NonNull<Bucket<V>>, TableError> {
        let layout = Layout::array::<Bucket<V>>(cap).map_err(|_| TableError::CapacityOverflow)?;
        // SAFETY: `cap >= MIN_CAP` and every bucket carries a two-word
        // header, so the layout is never zero-sized.
        unsafe {
            let raw = alloc::alloc::alloc(layout);
            if raw.is_null() {
                return Err(TableError::OutOfMemory);
            }
            core::ptr::write_bytes(raw.cast::<Bucket<V>>(), 0, cap);
            Ok(NonNull::new_unchecked(raw.cast()))
        }
    }

    fn alloc_buckets_or_abort(cap: usize) -> NonNull<Bucket<V>> {
        match Self::alloc_buckets(cap) {
            Ok(buckets) => buckets,
            Err(_) => handle_alloc_error(
                Layout::array::<Bucket<V>>(cap).expect("allocation size overflow"),
            ),
        }
    }

    /// Releases the bucket array without touching payloads.
    ///
    /// # Safety
    ///
    /// Every initialized payload must already have been dropped or moved
    /// out, and `self.buckets`/`self.cap` must describe a live allocation.
    unsafe fn release_buckets(&mut self) {
        // SAFETY: The layout matches the allocation made for `self.cap`
        // buckets, per the caller contract.
        unsafe {
            let layout = Layout::array::<Bucket<V>>(self.cap).expect("allocation size overflow");
            alloc::alloc::dealloc(self.buckets.as_ptr().cast(), layout);
        }
    }

    /// Pointer to the bucket at `index`.
    ///
    /// # Safety
    ///
    /// The caller must ensure `index < self.cap`.
    #[inline(always)]
    unsafe fn bucket_ptr(&self, index: usize) -> *mut Bucket<V> {
        // SAFETY: Caller guarantees `index` is within the allocation.
        unsafe { self.buckets.as_ptr().add(index) }
    }

    /// Returns the number of records in the table.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the table contains no records.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of records the table can hold before growing.
    pub fn capacity(&self) -> usize {
        self.growat
    }

    /// Returns the seeds handed to the hash callback of every record-keyed
    /// operation.
    pub fn seeds(&self) -> (u64, u64) {
        (self.seed0, self.seed1)
    }

    /// Returns `true` if the most recent [`set`](Self::set) failed because
    /// the table could not grow.
    ///
    /// The flag is cleared by every successful `set`.
    pub fn oom(&self) -> bool {
        self.oom
    }

    /// Inserts a record, replacing any record with an equal key.
    ///
    /// `hash` receives the record and the table's seeds; `eq` receives a
    /// stored record and the record being inserted. Returns the previous
    /// record if one was replaced. The previous record's destructor is not
    /// run by the table; the caller now owns it.
    ///
    /// If growth is required and allocation fails, the table is left
    /// unchanged, the [`oom`](Self::oom) flag is set, and the rejected
    /// record is handed back as `Some(record)`; consult the flag to
    /// distinguish that from a replacement.
    pub fn set(
        &mut self,
        value: V,
        hash: impl Fn(&V, u64, u64) -> u64,
        eq: impl Fn(&V, &V) -> bool,
    ) -> Option<V> {
        self.oom = false;
        if self.count >= self.growat {
            let grown = self
                .cap
                .checked_mul(2)
                .map(|doubled| self.try_resize(doubled).is_ok())
                .unwrap_or(false);
            if !grown {
                self.oom = true;
                return Some(value);
            }
        }

        let hash = clip_hash(hash(&value, self.seed0, self.seed1));
        self.insert_entry(hash, value, eq)
    }

    /// Looks up the record with a key equal to `key`'s.
    ///
    /// `key` is a record supplying at least the fields the callbacks
    /// inspect. The returned reference borrows the table; it is invalidated
    /// by the next mutating call.
    pub fn get(
        &self,
        key: &V,
        hash: impl Fn(&V, u64, u64) -> u64,
        eq: impl Fn(&V, &V) -> bool,
    ) -> Option<&V> {
        let hash = hash(key, self.seed0, self.seed1);
        self.find(hash, |stored| eq(stored, key))
    }

    /// Removes and returns the record with a key equal to `key`'s.
    ///
    /// The record's destructor is not run by the table; the caller now owns
    /// the record. Removal may shrink the table, but never below its
    /// construction capacity; a failed shrink allocation is ignored.
    pub fn delete(
        &mut self,
        key: &V,
        hash: impl Fn(&V, u64, u64) -> u64,
        eq: impl Fn(&V, &V) -> bool,
    ) -> Option<V> {
        let hash = hash(key, self.seed0, self.seed1);
        self.remove(hash, |stored| eq(stored, key))
    }

    /// Inserts a record by precomputed hash, replacing any record `eq`
    /// matches.
    ///
    /// `eq` receives a stored record and the record being inserted, and must
    /// only match records whose hash equals `hash`. Unlike
    /// [`set`](Self::set), a failed growth aborts via `handle_alloc_error`.
    pub fn insert(&mut self, hash: u64, value: V, eq: impl Fn(&V, &V) -> bool) -> Option<V> {
        if self.count >= self.growat {
            self.grow_or_abort();
        }
        self.insert_entry(clip_hash(hash), value, eq)
    }

    #[cold]
    #[inline(never)]
    fn grow_or_abort(&mut self) {
        let doubled = self.cap.checked_mul(2).expect("allocation size overflow");
        if self.try_resize(doubled).is_err() {
            handle_alloc_error(
                Layout::array::<Bucket<V>>(doubled).expect("allocation size overflow"),
            );
        }
    }

    /// The Robin Hood insertion walk. Requires the caller to have enforced
    /// `count < growat` so an empty slot is always reachable.
    fn insert_entry(&mut self, hash: u64, value: V, eq: impl Fn(&V, &V) -> bool) -> Option<V> {
        let mut entry_dib = 1;
        let mut entry_hash = hash;
        let mut entry_value = value;
        let mut index = (hash as usize) & self.mask;

        loop {
            // SAFETY: `index` is masked into `0..cap`. A nonzero probe
            // distance guarantees an initialized payload for
            // `assume_init_*`; the empty branch writes into an uninitialized
            // slot.
            unsafe {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib == 0 {
                    (*bucket).dib = entry_dib;
                    (*bucket).hash = entry_hash;
                    (*bucket).value.write(entry_value);
                    self.count += 1;
                    return None;
                }
                if (*bucket).hash == entry_hash
                    && eq((*bucket).value.assume_init_ref(), &entry_value)
                {
                    // Replace the payload in place; the slot keeps its probe
                    // distance and cached hash.
                    let previous = (*bucket).value.assume_init_read();
                    (*bucket).value.write(entry_value);
                    return Some(previous);
                }
                if (*bucket).dib < entry_dib {
                    // Robin Hood steal: the entry has probed further than
                    // the resident, so it takes the slot and the resident
                    // continues probing.
                    core::mem::swap(&mut (*bucket).dib, &mut entry_dib);
                    core::mem::swap(&mut (*bucket).hash, &mut entry_hash);
                    core::ptr::swap((*bucket).value.as_mut_ptr(), &mut entry_value);
                }
            }
            index = (index + 1) & self.mask;
            entry_dib += 1;
        }
    }

    /// Finds a record by precomputed hash and equality predicate.
    ///
    /// The incoming hash has its reserved high bit cleared before
    /// comparison, matching what insertion stored.
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let hash = clip_hash(hash);
        let mut index = (hash as usize) & self.mask;
        let mut expected_dib = 1;

        loop {
            // SAFETY: `index` is masked into `0..cap`, and a probe distance
            // at or above `expected_dib >= 1` guarantees initialization.
            unsafe {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib < expected_dib {
                    // Empty slot, or a resident closer to home than we are:
                    // the Robin Hood rule proves the key is absent.
                    return None;
                }
                if (*bucket).hash == hash && eq((*bucket).value.assume_init_ref()) {
                    return Some((*bucket).value.assume_init_ref());
                }
            }
            index = (index + 1) & self.mask;
            expected_dib += 1;
        }
    }

    /// Finds a record by precomputed hash, returning a mutable reference.
    ///
    /// The fields the hash and equality callbacks inspect must not be
    /// modified through the returned reference, or subsequent lookups will
    /// miss the record.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let hash = clip_hash(hash);
        let mut index = (hash as usize) & self.mask;
        let mut expected_dib = 1;

        loop {
            // SAFETY: As in `find`.
            unsafe {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib < expected_dib {
                    return None;
                }
                if (*bucket).hash == hash && eq((*bucket).value.assume_init_ref()) {
                    return Some((*bucket).value.assume_init_mut());
                }
            }
            index = (index + 1) & self.mask;
            expected_dib += 1;
        }
    }

    /// Removes and returns a record by precomputed hash and equality
    /// predicate.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        let hash = clip_hash(hash);
        let mut index = (hash as usize) & self.mask;
        let mut expected_dib = 1;

        loop {
            // SAFETY: As in `find`; the hit branch moves the payload out
            // before the slot is recycled by the backward shift.
            unsafe {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib < expected_dib {
                    return None;
                }
                if (*bucket).hash == hash && eq((*bucket).value.assume_init_ref()) {
                    let removed = (*bucket).value.assume_init_read();
                    self.backward_shift(index);
                    self.count -= 1;
                    if self.cap > self.initial_cap && self.count <= self.shrinkat {
                        // A failed shrink leaves the table correct at its
                        // current capacity.
                        let _ = self.try_resize(self.cap / 2);
                    }
                    return Some(removed);
                }
            }
            index = (index + 1) & self.mask;
            expected_dib += 1;
        }
    }

    /// Backward-shift compaction starting at a just-vacated slot: following
    /// records move one slot toward the vacancy with their probe distances
    /// decremented, until an empty slot or a home-positioned record ends the
    /// run.
    ///
    /// # Safety
    ///
    /// `index` must be a valid bucket index whose payload has been moved
    /// out.
    unsafe fn backward_shift(&mut self, mut index: usize) {
        // SAFETY: All indices are masked into `0..cap`, and `cap >= 16`
        // keeps source and destination of each shift distinct. The shifted
        // bucket is copied bitwise; its old slot is either overwritten by
        // the next shift or marked empty, so no payload is duplicated or
        // lost.
        unsafe {
            loop {
                let next_index = (index + 1) & self.mask;
                let next = self.bucket_ptr(next_index);
                if (*next).dib <= 1 {
                    (*self.bucket_ptr(index)).dib = 0;
                    return;
                }
                core::ptr::copy_nonoverlapping(next, self.bucket_ptr(index), 1);
                (*self.bucket_ptr(index)).dib -= 1;
                index = next_index;
            }
        }
    }

    /// Removes all records from the table.
    ///
    /// Every remaining record is dropped. With `reset_capacity` the bucket
    /// array is also reallocated at the table's construction capacity; if
    /// that allocation fails the current capacity is kept and cleared in
    /// place.
    pub fn clear(&mut self, reset_capacity: bool) {
        self.drop_occupied();
        self.count = 0;

        if reset_capacity && self.cap != self.initial_cap {
            if let Ok(buckets) = Self::alloc_buckets(self.initial_cap) {
                // SAFETY: All payloads were dropped above.
                unsafe {
                    self.release_buckets();
                }
                self.buckets = buckets;
                self.cap = self.initial_cap;
                self.mask = self.initial_cap - 1;
                self.growat = grow_threshold(self.initial_cap);
                self.shrinkat = shrink_threshold(self.initial_cap);
                return;
            }
        }

        // SAFETY: Payloads were dropped above; zeroing probe distances marks
        // every slot empty.
        unsafe {
            core::ptr::write_bytes(self.buckets.as_ptr(), 0, self.cap);
        }
    }

    fn drop_occupied(&mut self) {
        if !core::mem::needs_drop::<V>() || self.count == 0 {
            return;
        }
        // SAFETY: A nonzero probe distance guarantees an initialized
        // payload, and each payload is dropped exactly once.
        unsafe {
            for index in 0..self.cap {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib != 0 {
                    (*bucket).value.assume_init_drop();
                }
            }
        }
    }

    /// Reserves capacity for at least `additional` more records.
    ///
    /// Does nothing if the capacity is already sufficient. Aborts the
    /// process on allocation failure.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.count.saturating_add(additional);
        if required <= self.growat {
            return;
        }
        let target = (required as f32 / GROW_LOAD) as usize;
        let new_cap = target
            .max(MIN_CAP)
            .checked_next_power_of_two()
            .expect("allocation size overflow");
        if self.try_resize(new_cap).is_err() {
            handle_alloc_error(
                Layout::array::<Bucket<V>>(new_cap).expect("allocation size overflow"),
            );
        }
    }

    /// Shrinks the bucket array as far as the current population and the
    /// construction-capacity floor allow.
    ///
    /// A failed shrink allocation is ignored.
    pub fn shrink_to_fit(&mut self) {
        let target = ((self.count as f32 / GROW_LOAD) as usize)
            .max(self.initial_cap)
            .next_power_of_two();
        if target < self.cap {
            let _ = self.try_resize(target);
        }
    }

    /// Reallocates the bucket array at `new_cap` and reinserts every record
    /// using its cached hash; the hash callback is never re-invoked. On
    /// failure the table is untouched.
    fn try_resize(&mut self, new_cap: usize) -> Result<(), TableError> {
        let new_buckets = Self::alloc_buckets(new_cap)?;
        let new_mask = new_cap - 1;

        // SAFETY: The walk visits each initialized old payload exactly once,
        // moves it into the zeroed new array with the standard Robin Hood
        // walk (the new capacity exceeds `count`, so an empty slot is always
        // reachable), then releases the old array without dropping the
        // moved-out payloads.
        unsafe {
            for index in 0..self.cap {
                let src = self.bucket_ptr(index);
                if (*src).dib == 0 {
                    continue;
                }
                let mut entry_dib = 1;
                let mut entry_hash = (*src).hash;
                let mut entry_value = (*src).value.assume_init_read();
                let mut dst_index = (entry_hash as usize) & new_mask;
                loop {
                    let dst = new_buckets.as_ptr().add(dst_index);
                    if (*dst).dib == 0 {
                        (*dst).dib = entry_dib;
                        (*dst).hash = entry_hash;
                        (*dst).value.write(entry_value);
                        break;
                    }
                    if (*dst).dib < entry_dib {
                        core::mem::swap(&mut (*dst).dib, &mut entry_dib);
                        core::mem::swap(&mut (*dst).hash, &mut entry_hash);
                        core::ptr::swap((*dst).value.as_mut_ptr(), &mut entry_value);
                    }
                    dst_index = (dst_index + 1) & new_mask;
                    entry_dib += 1;
                }
            }
            self.release_buckets();
        }

        self.buckets = new_buckets;
        self.cap = new_cap;
        self.mask = new_mask;
        self.growat = grow_threshold(new_cap);
        self.shrinkat = shrink_threshold(new_cap);
        Ok(())
    }

    /// Returns the record stored in the bucket at `position & mask`, if
    /// that bucket is occupied.
    ///
    /// This is a raw indexed read intended for sampling and debugging;
    /// which record lives at a given position is unspecified and changes as
    /// the table mutates.
    pub fn probe(&self, position: u64) -> Option<&V> {
        let index = (position & self.mask as u64) as usize;
        // SAFETY: `index` is masked into `0..cap`; a nonzero probe distance
        // guarantees initialization.
        unsafe {
            let bucket = self.bucket_ptr(index);
            if (*bucket).dib == 0 {
                None
            } else {
                Some((*bucket).value.assume_init_ref())
            }
        }
    }

    /// Invokes `f` on every record in storage order.
    ///
    /// Stops and returns `false` as soon as `f` does; returns `true` after
    /// visiting every record. Iteration order is unspecified.
    pub fn scan(&self, mut f: impl FnMut(&V) -> bool) -> bool {
        for index in 0..self.cap {
            // SAFETY: `index < cap`; nonzero probe distance guarantees
            // initialization.
            unsafe {
                let bucket = self.bucket_ptr(index);
                if (*bucket).dib != 0 && !f((*bucket).value.assume_init_ref()) {
                    return false;
                }
            }
        }
        true
    }

    /// Returns an iterator over all records in the table.
    ///
    /// The iteration order is unspecified and may change between mutations.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            index: 0,
        }
    }

    /// Collects debug statistics about the table.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> DebugStats {
        DebugStats {
            populated: self.count,
            capacity: self.growat,
            buckets: self.cap,
            load_factor: self.count as f64 / self.cap as f64,
            total_bytes: core::mem::size_of::<Bucket<V>>() * self.cap,
        }
    }

    /// Collects a histogram of the probe distances of every stored record.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut histogram = ProbeHistogram {
            by_distance: [0; PROBE_BUCKETS],
            long_probes: 0,
            max_distance: 0,
        };
        for index in 0..self.cap {
            // SAFETY: `index < cap`.
            let dib = unsafe { (*self.bucket_ptr(index)).dib };
            if dib == 0 {
                continue;
            }
            if dib <= PROBE_BUCKETS {
                histogram.by_distance[dib - 1] += 1;
            } else {
                histogram.long_probes += 1;
            }
            histogram.max_distance = histogram.max_distance.max(dib);
        }
        histogram
    }
}

/// An iterator over the records of a [`HashTable`].
///
/// Steps through the bucket array in storage order, yielding every occupied
/// slot once.
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    index: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        while self.index < self.table.cap {
            // SAFETY: `self.index < cap` is checked by the loop condition;
            // nonzero probe distance guarantees initialization.
            unsafe {
                let bucket = self.table.bucket_ptr(self.index);
                self.index += 1;
                if (*bucket).dib != 0 {
                    return Some((*bucket).value.assume_init_ref());
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.table.count))
    }
}

impl<'a, V> IntoIterator for &'a HashTable<V> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use std::collections::HashMap as ModelMap;

    use rand::TryRngCore;
    use rand::rngs::OsRng;

    use super::*;
    use crate::hash::sip;

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn item_hash(item: &Item, seed0: u64, seed1: u64) -> u64 {
        sip(&item.key.to_le_bytes(), seed0, seed1)
    }

    fn item_eq(a: &Item, b: &Item) -> bool {
        a.key == b.key
    }

    fn probe_item(key: u64) -> Item {
        Item { key, value: 0 }
    }

    fn seeded_table() -> HashTable<Item> {
        let mut rng = OsRng;
        HashTable::with_capacity_and_seeds(
            0,
            rng.try_next_u64().unwrap(),
            rng.try_next_u64().unwrap(),
        )
    }

    /// Walks the bucket array and asserts the structural invariants: probe
    /// distances match home distances, hashes have the reserved bit
    /// cleared, probe chains are monotone, and `count` matches occupancy.
    fn check_invariants<V>(table: &HashTable<V>) {
        let mut occupied = 0;
        for index in 0..table.cap {
            // SAFETY: `index < cap`.
            unsafe {
                let bucket = table.bucket_ptr(index);
                if (*bucket).dib == 0 {
                    continue;
                }
                occupied += 1;
                assert_eq!((*bucket).hash & !HASH_MASK, 0, "reserved bit set");

                let home = ((*bucket).hash as usize) & table.mask;
                let distance = (index + table.cap - home) & table.mask;
                assert_eq!((*bucket).dib, distance + 1, "dib mismatch at {index}");

                if (*bucket).dib > 1 {
                    let prev = table.bucket_ptr((index + table.cap - 1) & table.mask);
                    assert!(
                        (*prev).dib >= (*bucket).dib - 1,
                        "probe chain not monotone at {index}"
                    );
                }
            }
        }
        assert_eq!(occupied, table.count, "count does not match occupancy");
    }

    #[test]
    fn set_get_delete_people() {
        #[derive(Debug, PartialEq, Eq, Clone)]
        struct Person {
            name: &'static str,
            age: u32,
        }

        fn person_hash(person: &Person, seed0: u64, seed1: u64) -> u64 {
            sip(person.name.as_bytes(), seed0, seed1)
        }

        fn person_eq(a: &Person, b: &Person) -> bool {
            a.name == b.name
        }

        let probe = |name| Person { name, age: 0 };

        let mut table = HashTable::with_capacity_and_seeds(0, 0xdecafbad, 0xfeedface);
        for (name, age) in [("Dale", 44), ("Roger", 68), ("Jane", 47)] {
            assert!(table
                .set(Person { name, age }, person_hash, person_eq)
                .is_none());
        }

        assert_eq!(table.len(), 3);
        assert_eq!(
            table
                .get(&probe("Jane"), person_hash, person_eq)
                .map(|p| p.age),
            Some(47)
        );
        assert_eq!(
            table
                .get(&probe("Roger"), person_hash, person_eq)
                .map(|p| p.age),
            Some(68)
        );
        assert_eq!(
            table
                .get(&probe("Dale"), person_hash, person_eq)
                .map(|p| p.age),
            Some(44)
        );
        assert!(table.get(&probe("Tom"), person_hash, person_eq).is_none());

        let mut scanned = 0;
        assert!(table.scan(|_| {
            scanned += 1;
            true
        }));
        assert_eq!(scanned, 3);
        assert_eq!(table.iter().count(), 3);

        let removed = table.delete(&probe("Roger"), person_hash, person_eq);
        assert_eq!(removed.map(|p| p.age), Some(68));
        assert!(table.get(&probe("Roger"), person_hash, person_eq).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn set_replaces_and_returns_previous() {
        let mut table = seeded_table();
        assert!(table
            .set(Item { key: 9, value: 1 }, item_hash, item_eq)
            .is_none());
        let previous = table.set(Item { key: 9, value: 2 }, item_hash, item_eq);
        assert_eq!(previous, Some(Item { key: 9, value: 1 }));
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(&probe_item(9), item_hash, item_eq),
            Some(&Item { key: 9, value: 2 })
        );
        check_invariants(&table);
    }

    #[test]
    fn delete_missing_and_empty() {
        let mut table = seeded_table();
        assert!(table.delete(&probe_item(1), item_hash, item_eq).is_none());
        table.set(Item { key: 1, value: 1 }, item_hash, item_eq);
        assert!(table.delete(&probe_item(2), item_hash, item_eq).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many_resize_preserves() {
        let mut table = seeded_table();
        for key in 0..100_000u64 {
            let previous = table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
            assert!(previous.is_none());
            assert!(!table.oom());
        }
        assert_eq!(table.len(), 100_000);
        check_invariants(&table);

        for key in 0..100_000u64 {
            assert_eq!(
                table
                    .get(&probe_item(key), item_hash, item_eq)
                    .map(|i| i.value),
                Some(key as i32),
                "missing key {key}"
            );
        }
        for key in 100_000..200_000u64 {
            assert!(table.get(&probe_item(key), item_hash, item_eq).is_none());
        }
        assert_eq!(table.iter().count(), 100_000);
    }

    #[test]
    fn preallocated_table_never_grows() {
        let mut table: HashTable<Item> = HashTable::with_capacity(1000);
        let cap_before = table.cap;
        assert_eq!(cap_before, 1024);
        for key in 0..700u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        assert_eq!(table.cap, cap_before);
        assert_eq!(table.len(), 700);
        check_invariants(&table);
    }

    #[test]
    fn delete_in_reverse_shrinks() {
        let mut table = seeded_table();
        for key in 0..1000u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        let grown_cap = table.cap;
        assert!(grown_cap > table.initial_cap);

        for key in (0..1000u64).rev() {
            let removed = table.delete(&probe_item(key), item_hash, item_eq);
            assert_eq!(removed.map(|i| i.key), Some(key));
            if key % 100 == 0 {
                check_invariants(&table);
            }
        }
        assert_eq!(table.len(), 0);
        assert!(table.cap < grown_cap);
        assert!(table.cap <= table.initial_cap * 2);
    }

    #[test]
    fn colliding_hashes_resolved_by_equality() {
        fn degenerate_hash(_item: &Item, _seed0: u64, _seed1: u64) -> u64 {
            // All bits set exercises the reserved-bit clipping as well.
            u64::MAX
        }

        let mut table: HashTable<Item> = HashTable::new();
        for key in 0..40u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                degenerate_hash,
                item_eq,
            );
        }
        assert_eq!(table.len(), 40);
        check_invariants(&table);

        for key in 0..40u64 {
            assert_eq!(
                table
                    .get(&probe_item(key), degenerate_hash, item_eq)
                    .map(|i| i.value),
                Some(key as i32)
            );
        }

        for key in (10..30u64).step_by(3) {
            assert!(table
                .delete(&probe_item(key), degenerate_hash, item_eq)
                .is_some());
        }
        check_invariants(&table);
        assert!(table
            .get(&probe_item(13), degenerate_hash, item_eq)
            .is_none());
        assert!(table
            .get(&probe_item(11), degenerate_hash, item_eq)
            .is_some());
    }

    #[test]
    fn clear_keeps_or_resets_capacity() {
        let mut table = seeded_table();
        for key in 0..500u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        let grown_cap = table.cap;
        assert!(grown_cap > table.initial_cap);

        table.clear(false);
        assert_eq!(table.len(), 0);
        assert_eq!(table.cap, grown_cap);
        assert!(table.get(&probe_item(3), item_hash, item_eq).is_none());
        check_invariants(&table);

        for key in 0..500u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        table.clear(true);
        assert_eq!(table.len(), 0);
        assert_eq!(table.cap, table.initial_cap);
        check_invariants(&table);
    }

    /// A record whose drop increments a shared counter, for auditing
    /// destructor discipline.
    #[derive(Debug, Clone)]
    struct Counted {
        key: u64,
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn counted_hash(item: &Counted, seed0: u64, seed1: u64) -> u64 {
        sip(&item.key.to_le_bytes(), seed0, seed1)
    }

    fn counted_eq(a: &Counted, b: &Counted) -> bool {
        a.key == b.key
    }

    #[test]
    fn drop_discipline() {
        let drops = Rc::new(Cell::new(0));
        let record = |key| Counted {
            key,
            drops: Rc::clone(&drops),
        };

        let mut table = HashTable::new();
        for key in 0..10u64 {
            table.set(record(key), counted_hash, counted_eq);
        }
        assert_eq!(drops.get(), 0);

        // Deleted records are handed back, not destroyed by the table;
        // both the returned record and the probe record drop here.
        for key in 0..3u64 {
            let removed = table.delete(&record(key), counted_hash, counted_eq);
            assert!(removed.is_some());
        }
        assert_eq!(drops.get(), 6);

        let previous = table.set(record(5), counted_hash, counted_eq);
        assert!(previous.is_some());
        drop(previous);
        assert_eq!(drops.get(), 7);

        // 7 records remain; `clear` drops each exactly once.
        assert_eq!(table.len(), 7);
        table.clear(false);
        assert_eq!(drops.get(), 14);

        for key in 0..4u64 {
            table.set(record(key), counted_hash, counted_eq);
        }
        drop(table);
        assert_eq!(drops.get(), 18);
    }

    #[test]
    fn oom_flag_clears_on_success() {
        let mut table = seeded_table();
        table.set(Item { key: 1, value: 1 }, item_hash, item_eq);
        assert!(!table.oom());
    }

    #[test]
    fn probe_visits_every_record() {
        let mut table = seeded_table();
        for key in 0..64u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }

        let mut seen: Vec<u64> = (0..table.cap as u64)
            .filter_map(|position| table.probe(position).map(|item| item.key))
            .collect();
        seen.sort_unstable();
        let expected: Vec<u64> = (0..64).collect();
        assert_eq!(seen, expected);

        // Positions beyond the mask wrap around to the same buckets.
        assert_eq!(
            table.probe(0).map(|i| i.key),
            table.probe(table.cap as u64).map(|i| i.key)
        );
    }

    #[test]
    fn scan_stops_early() {
        let mut table = seeded_table();
        for key in 0..32u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        let mut visited = 0;
        assert!(!table.scan(|_| {
            visited += 1;
            visited < 5
        }));
        assert_eq!(visited, 5);
    }

    #[test]
    fn seeds_reach_the_hash_callback() {
        let mut table: HashTable<Item> = HashTable::with_capacity_and_seeds(0, 7, 9);
        assert_eq!(table.seeds(), (7, 9));
        table.set(
            Item { key: 1, value: 1 },
            |item, seed0, seed1| {
                assert_eq!((seed0, seed1), (7, 9));
                sip(&item.key.to_le_bytes(), seed0, seed1)
            },
            item_eq,
        );
        assert!(table
            .get(
                &probe_item(1),
                |item, seed0, seed1| {
                    assert_eq!((seed0, seed1), (7, 9));
                    sip(&item.key.to_le_bytes(), seed0, seed1)
                },
                item_eq
            )
            .is_some());
    }

    #[test]
    fn try_with_capacity_overflow() {
        assert_eq!(
            HashTable::<Item>::try_with_capacity_and_seeds(usize::MAX, 0, 0).unwrap_err(),
            TableError::CapacityOverflow
        );
    }

    #[test]
    fn clone_preserves_contents() {
        let mut table = seeded_table();
        for key in 0..100u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        let cloned = table.clone();
        assert_eq!(cloned.len(), table.len());
        assert_eq!(cloned.seeds(), table.seeds());
        check_invariants(&cloned);
        for key in 0..100u64 {
            assert_eq!(
                cloned.get(&probe_item(key), item_hash, item_eq),
                table.get(&probe_item(key), item_hash, item_eq)
            );
        }
    }

    #[test]
    fn reserve_and_shrink_to_fit() {
        let mut table = seeded_table();
        table.reserve(1000);
        let reserved_cap = table.cap;
        assert!(table.capacity() >= 1000);

        for key in 0..1000u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        assert_eq!(table.cap, reserved_cap);

        for key in 500..1000u64 {
            table.delete(&probe_item(key), item_hash, item_eq);
        }
        table.shrink_to_fit();
        assert!(table.cap < reserved_cap);
        assert!(table.cap >= table.initial_cap);
        check_invariants(&table);
        for key in 0..500u64 {
            assert!(table.get(&probe_item(key), item_hash, item_eq).is_some());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn random_operations_match_model() {
        let mut rng = OsRng;
        let mut table = seeded_table();
        let mut model: ModelMap<u64, i32> = ModelMap::new();

        for step in 0..20_000usize {
            let key = rng.try_next_u64().unwrap() % 512;
            match rng.try_next_u64().unwrap() % 10 {
                0..=5 => {
                    let value = step as i32;
                    let previous = table.set(Item { key, value }, item_hash, item_eq);
                    assert!(!table.oom());
                    assert_eq!(previous.map(|i| i.value), model.insert(key, value));
                }
                6..=8 => {
                    let removed = table.delete(&probe_item(key), item_hash, item_eq);
                    assert_eq!(removed.map(|i| i.value), model.remove(&key));
                }
                _ => {
                    assert_eq!(
                        table
                            .get(&probe_item(key), item_hash, item_eq)
                            .map(|i| i.value),
                        model.get(&key).copied()
                    );
                }
            }
            assert_eq!(table.len(), model.len());
            if step % 1024 == 0 {
                check_invariants(&table);
            }
        }

        check_invariants(&table);
        for (&key, &value) in &model {
            assert_eq!(
                table
                    .get(&probe_item(key), item_hash, item_eq)
                    .map(|i| i.value),
                Some(value)
            );
        }
    }

    #[cfg(feature = "stats")]
    #[test]
    fn stats_track_population() {
        let mut table = seeded_table();
        for key in 0..100u64 {
            table.set(
                Item {
                    key,
                    value: key as i32,
                },
                item_hash,
                item_eq,
            );
        }
        let stats = table.debug_stats();
        assert_eq!(stats.populated, 100);
        assert!(stats.load_factor > 0.0);

        let histogram = table.probe_histogram();
        let total: usize = histogram.by_distance.iter().sum::<usize>() + histogram.long_probes;
        assert_eq!(total, 100);
        assert!(histogram.max_distance >= 1);
    }
}
