#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allocator;

mod error;

/// A HashMap over the Robin Hood table.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides
/// a key-value map interface with configurable hashers and allocators.
pub mod hash_map;

/// The Robin Hood hash table that backs the map and set.
///
/// Use it directly to store values that carry their own keys, or when the
/// caller wants to compute hashes itself.
pub mod hash_table;

/// A HashSet over the Robin Hood table.
pub mod hash_set;

pub use allocator::AllocError;
pub use allocator::Allocator;
pub use allocator::Global;
pub use error::LookupError;
pub use error::TryReserveError;
pub use hash_map::Entry;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::HashTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when none is named: `foldhash`'s fast,
        /// randomly seeded builder.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when none is named: the standard
        /// library's randomly keyed SipHash builder.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    }
}
