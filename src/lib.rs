#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Errors returned by fallible table construction.
pub mod error;

/// Bundled byte-string hash functions (SipHash-2-4 and MurmurHash3-x86-128).
pub mod hash;

/// A hash map built on the Robin Hood table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a standard key-value map interface with configurable hashers.
pub mod hash_map;

/// A hash set built on the Robin Hood table.
///
/// This module provides a `HashSet` that wraps the `HashTable` and provides
/// a standard set interface with configurable hashers.
pub mod hash_set;

pub mod hash_table;

pub use error::TableError;
pub use hash::murmur;
pub use hash::sip;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::HashTable;
