//! Persistent (immutable) data structures.
//!
//! This module provides the ordered map that everything else in the crate
//! is built on:
//!
//! - [`PersistentTreeMap`]: persistent ordered map (red-black tree) with a
//!   pluggable per-node [`Augmentation`] hook
//!
//! # Structural Sharing
//!
//! Every mutating operation returns a new map that shares all untouched
//! subtrees with its predecessor. Only the nodes on the root-to-target path
//! are rebuilt, so keeping arbitrarily many historical versions alive costs
//! O(log N) nodes per retained mutation.
//!
//! # Examples
//!
//! ```rust
//! use podium::persistent::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert(1, "ONE");
//! assert_eq!(map.get(&1), Some(&"one"));     // Original unchanged
//! assert_eq!(updated.get(&1), Some(&"ONE")); // New version
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type used for shared tree nodes and
/// entries.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub type ReferenceCounter<T> = std::sync::Arc<T>;

/// Reference-counted smart pointer type used for shared tree nodes and
/// entries.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(not(feature = "arc"))]
pub type ReferenceCounter<T> = std::rc::Rc<T>;

mod treemap;

pub use treemap::Augmentation;
pub use treemap::Entry;
pub use treemap::EntryLink;
pub use treemap::NoAugmentation;
pub use treemap::PersistentTreeMap;
pub use treemap::PersistentTreeMapIterator;
pub use treemap::Side;

// =============================================================================
// Tests
// =============================================================================
