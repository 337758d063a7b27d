use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::HashTable;
use crate::hash_table::Iter;

/// A hash set implemented over the Robin Hood [`HashTable`].
///
/// `HashSet<T, S>` stores values that are their own keys, which is the
/// table's native shape: a record hashes and compares as a whole. The hasher
/// builder `S` supplies the hash function.
///
/// # Examples
///
/// ```rust
/// # use core::hash::BuildHasher;
/// # use siphasher::sip::SipHasher;
/// #
/// # use robin_hash::HashSet;
/// #
/// # struct SimpleHasher;
/// # impl BuildHasher for SimpleHasher {
/// #     type Hasher = SipHasher;
/// #
/// #     fn build_hasher(&self) -> Self::Hasher {
/// #         SipHasher::new()
/// #     }
/// # }
/// #
/// let mut names = HashSet::with_hasher(SimpleHasher);
/// assert!(names.insert("Dale"));
/// assert!(!names.insert("Dale"));
/// assert!(names.contains(&"Dale"));
/// assert!(names.remove(&"Dale"));
/// assert!(names.is_empty());
/// ```
pub struct HashSet<T, S> {
    table: HashTable<T>,
    hash_builder: S,
}

impl<T, S> Debug for HashSet<T, S>
where
    T: Debug + Hash + Eq,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S> HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new hash set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash set sized for `capacity` values with the given
    /// hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    #[inline(always)]
    fn hash_value(&self, value: &T) -> u64 {
        self.hash_builder.hash_one(value)
    }

    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of values the set can hold before growing.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all values from the set, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.table.clear(false);
    }

    /// Reserves capacity for at least `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Shrinks the set's storage as far as its population and construction
    /// capacity allow.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Adds a value to the set.
    ///
    /// Returns `true` if the value was not already present. An equal value
    /// that was already present is kept and the new one dropped; use
    /// [`replace`](Self::replace) to swap it instead.
    pub fn insert(&mut self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        let hash = self.hash_value(&value);
        self.table
            .insert(hash, value, |stored, probing| stored == probing)
            .is_none()
    }

    /// Adds a value to the set, replacing an equal existing value.
    ///
    /// Returns the replaced value if one was present.
    pub fn replace(&mut self, value: T) -> Option<T> {
        let hash = self.hash_value(&value);
        self.table
            .insert(hash, value, |stored, probing| stored == probing)
    }

    /// Returns `true` if the set contains a value equal to `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.get(value).is_some()
    }

    /// Returns a reference to the stored value equal to `value`, if any.
    pub fn get(&self, value: &T) -> Option<&T> {
        let hash = self.hash_value(value);
        self.table.find(hash, |stored| stored == value)
    }

    /// Removes a value from the set. Returns `true` if it was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Removes and returns the stored value equal to `value`, if any.
    pub fn take(&mut self, value: &T) -> Option<T> {
        let hash = self.hash_value(value);
        self.table.remove(hash, |stored| stored == value)
    }

    /// Returns an iterator over the set's values in unspecified order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.table.iter()
    }
}

impl<T, S> HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a new hash set with a default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash set sized for `capacity` values with a default
    /// hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S> Default for HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, S> IntoIterator for &'a HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
