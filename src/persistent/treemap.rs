//! Persistent (immutable) ordered map based on a Red-Black Tree.
//!
//! This module provides [`PersistentTreeMap`], an immutable ordered map
//! that uses structural sharing for efficient snapshots.
//!
//! # Overview
//!
//! `PersistentTreeMap` is a persistent Red-Black Tree: a self-balancing
//! binary search tree whose mutating operations rebuild only the nodes on
//! the root-to-target path and share every other subtree with the previous
//! version.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(1) len and `is_empty`
//! - O(1) snapshot (cloning a map clones two words)
//!
//! # Augmentation
//!
//! Every node construction is routed through a single hook, the
//! [`Augmentation`] type parameter. The default, [`NoAugmentation`], keeps
//! entries untouched. A custom augmentation may substitute the entry of a
//! freshly built node with a derived one (same key, recomputed value),
//! which is enough to maintain order-statistic data on every copied path
//! without a second traversal.
//!
//! # Internal Structure
//!
//! The Red-Black Tree maintains the following invariants:
//! 1. Every node is either red or black
//! 2. The root is black
//! 3. All leaves (NIL) are black
//! 4. Red nodes have only black children
//! 5. Every path from root to leaf has the same number of black nodes
//!
//! These invariants ensure the tree height is O(log N). [`validate`]
//! checks all of them plus the search-tree ordering and reports the black
//! height.
//!
//! [`validate`]: PersistentTreeMap::validate
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
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Removal also preserves earlier versions
//! let removed = map.remove(&2);
//! assert_eq!(removed.len(), 2);
//! assert_eq!(map.len(), 3);
//! ```

use super::ReferenceCounter;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FromIterator;
use std::marker::PhantomData;

// =============================================================================
// Color Definition
// =============================================================================

/// The color of a Red-Black Tree node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

// =============================================================================
// Entry Definition
// =============================================================================

/// An immutable key-value pair.
///
/// Entries are owned by a shared pointer ([`EntryLink`]) so that nodes on
/// divergent tree versions can reference the same payload without copying
/// it. An entry is never mutated after construction.
#[derive(Debug, PartialEq, Eq)]
pub struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    /// Creates a new entry.
    #[inline]
    #[must_use]
    pub const fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// Returns the key of this entry.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value of this entry.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }
}

/// Shared handle to an [`Entry`].
pub type EntryLink<K, V> = ReferenceCounter<Entry<K, V>>;

// =============================================================================
// Node Definition
// =============================================================================

/// Internal node structure for the Red-Black Tree.
struct Node<K, V> {
    color: Color,
    entry: EntryLink<K, V>,
    left: Option<NodeLink<K, V>>,
    right: Option<NodeLink<K, V>>,
}

type NodeLink<K, V> = ReferenceCounter<Node<K, V>>;

/// Checks if an optional node is red.
fn is_red<K, V>(node: Option<&NodeLink<K, V>>) -> bool {
    node.is_some_and(|node| node.color == Color::Red)
}

/// Checks if an optional node is black. NIL nodes do not count.
fn is_black<K, V>(node: Option<&NodeLink<K, V>>) -> bool {
    node.is_some_and(|node| node.color == Color::Black)
}

// =============================================================================
// Lookup Direction
// =============================================================================

/// The direction a lookup takes past a node while descending the tree.
///
/// Passed to the observer callback of
/// [`get_with`](PersistentTreeMap::get_with): [`Side::Left`] means the
/// sought key orders before the node's key, [`Side::Right`] means it orders
/// after (the node and its whole left subtree are being skipped).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    /// The descent continued into the left subtree.
    Left,
    /// The descent continued into the right subtree.
    Right,
}

// =============================================================================
// Augmentation Hook
// =============================================================================

/// Hook invoked at every node construction.
///
/// All tree operations that produce a node — leaf insertion, path copying,
/// rebalancing rotations, subtree fusion — route through this hook. The
/// tree fixes the node's color and children; the hook only decides which
/// entry the freshly built node carries. Returning `entry.clone()` keeps
/// the payload shared; returning a new entry (same key, derived value)
/// maintains an augmentation.
///
/// The hook must be pure: it may observe only the presented entry and the
/// entries of the two children, never ancestors or external state, and it
/// must not change the key.
///
/// # Examples
///
/// An augmentation that keeps per-node subtree entry counts:
///
/// ```rust
/// use podium::persistent::{Augmentation, Entry, EntryLink, PersistentTreeMap, ReferenceCounter};
///
/// #[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// struct Weighted {
///     left_entries: usize,
///     right_entries: usize,
/// }
///
/// impl Weighted {
///     const fn subtree_entries(&self) -> usize {
///         self.left_entries + self.right_entries + 1
///     }
/// }
///
/// struct EntryCount;
///
/// impl Augmentation<i32, Weighted> for EntryCount {
///     fn rebind_entry(
///         entry: &EntryLink<i32, Weighted>,
///         left: Option<&Entry<i32, Weighted>>,
///         right: Option<&Entry<i32, Weighted>>,
///     ) -> EntryLink<i32, Weighted> {
///         let left_entries = left.map_or(0, |child| child.value().subtree_entries());
///         let right_entries = right.map_or(0, |child| child.value().subtree_entries());
///         let current = entry.value();
///         if current.left_entries == left_entries && current.right_entries == right_entries {
///             entry.clone()
///         } else {
///             ReferenceCounter::new(Entry::new(
///                 *entry.key(),
///                 Weighted { left_entries, right_entries },
///             ))
///         }
///     }
/// }
///
/// let zero = Weighted { left_entries: 0, right_entries: 0 };
/// let map: PersistentTreeMap<i32, Weighted, EntryCount> =
///     PersistentTreeMap::with_augmentation()
///         .insert(2, zero)
///         .insert(1, zero)
///         .insert(3, zero);
///
/// // The root is 2 and carries the sizes of both subtrees.
/// assert_eq!(
///     map.get(&2),
///     Some(&Weighted { left_entries: 1, right_entries: 1 })
/// );
/// ```
pub trait Augmentation<K, V> {
    /// Returns the entry a freshly constructed node should carry.
    ///
    /// `left` and `right` are the entries of the children the node is being
    /// bound to, exactly as they will hang under it.
    fn rebind_entry(
        entry: &EntryLink<K, V>,
        left: Option<&Entry<K, V>>,
        right: Option<&Entry<K, V>>,
    ) -> EntryLink<K, V>;
}

/// The default augmentation: nodes carry their entries unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAugmentation;

impl<K, V> Augmentation<K, V> for NoAugmentation {
    #[inline]
    fn rebind_entry(
        entry: &EntryLink<K, V>,
        _left: Option<&Entry<K, V>>,
        _right: Option<&Entry<K, V>>,
    ) -> EntryLink<K, V> {
        entry.clone()
    }
}

// =============================================================================
// PersistentTreeMap Definition
// =============================================================================

/// A persistent (immutable) ordered map based on a Red-Black Tree.
///
/// `PersistentTreeMap` is an immutable data structure that uses structural
/// sharing: every mutating operation returns a new map and leaves the
/// receiver untouched, with both versions sharing all unmodified subtrees.
///
/// Keys must implement `Ord`. The map keeps entries in sorted key order;
/// a descending order is obtained by wrapping keys in
/// [`std::cmp::Reverse`].
///
/// The third type parameter selects the [`Augmentation`] hook; the default
/// [`NoAugmentation`] stores entries as given.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `contains_key` | O(log N)          |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
/// | `iter`         | O(N)              |
/// | `validate`     | O(N)              |
///
/// # Examples
///
/// ```rust
/// use podium::persistent::PersistentTreeMap;
///
/// let map = PersistentTreeMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// let map = PersistentTreeMap::new()
///     .insert("hello".to_string(), 1)
///     .insert("world".to_string(), 2);
///
/// // Borrowed lookups work without allocating
/// assert_eq!(map.get("hello"), Some(&1));
/// ```
pub struct PersistentTreeMap<K, V, A = NoAugmentation> {
    /// Root node of the tree
    root: Option<NodeLink<K, V>>,
    /// Number of entries
    length: usize,
    augmentation: PhantomData<A>,
}

impl<K, V, A> Clone for PersistentTreeMap<K, V, A> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            augmentation: PhantomData,
        }
    }
}

impl<K, V> PersistentTreeMap<K, V> {
    /// Creates a new empty map with the default (no-op) augmentation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
            augmentation: PhantomData,
        }
    }

    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// assert_eq!(map.get(&42), Some(&"answer"));
    /// ```
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self
    where
        K: Ord,
    {
        Self::new().insert(key, value)
    }
}

impl<K, V, A> PersistentTreeMap<K, V, A> {
    /// Creates a new empty map with a custom [`Augmentation`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::{NoAugmentation, PersistentTreeMap};
    ///
    /// let map: PersistentTreeMap<i32, i32, NoAugmentation> =
    ///     PersistentTreeMap::with_augmentation();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_augmentation() -> Self {
        Self {
            root: None,
            length: 0,
            augmentation: PhantomData,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let empty: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns an iterator over entries in sorted key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let entries: Vec<(&i32, &&str)> = map.iter().collect();
    /// assert_eq!(entries, vec![(&1, &"one"), (&2, &"two"), (&3, &"three")]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentTreeMapIterator<'_, K, V> {
        let mut entries = Vec::with_capacity(self.length);
        Self::push_in_order(self.root.as_ref(), &mut entries);
        PersistentTreeMapIterator { entries, cursor: 0 }
    }

    /// Collects all entries in sorted order (in-order traversal).
    fn push_in_order<'a>(node: Option<&'a NodeLink<K, V>>, out: &mut Vec<(&'a K, &'a V)>) {
        if let Some(node) = node {
            Self::push_in_order(node.left.as_ref(), out);
            out.push((&node.entry.key, &node.entry.value));
            Self::push_in_order(node.right.as_ref(), out);
        }
    }

    /// Returns an iterator over keys in sorted order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one");
    ///
    /// let keys: Vec<&i32> = map.keys().collect();
    /// assert_eq!(keys, vec![&1, &3]);
    /// ```
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in key order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, 10)
    ///     .insert(2, 20);
    ///
    /// let sum: i32 = map.values().sum();
    /// assert_eq!(sum, 30);
    /// ```
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Verifies a per-node weight augmentation.
    ///
    /// `weight` reads a value's own weight; `left_weight` and
    /// `right_weight` read the weights the value claims for its subtrees.
    /// Returns `false` if any node's claim disagrees with the actual sum
    /// below it.
    pub(crate) fn augmentation_consistent<W, L, R>(
        &self,
        weight: W,
        left_weight: L,
        right_weight: R,
    ) -> bool
    where
        W: Fn(&V) -> usize + Copy,
        L: Fn(&V) -> usize + Copy,
        R: Fn(&V) -> usize + Copy,
    {
        Self::subtree_weight(self.root.as_ref(), weight, left_weight, right_weight).is_some()
    }

    /// Total weight of a subtree, or `None` if a stale claim is found.
    fn subtree_weight<W, L, R>(
        node: Option<&NodeLink<K, V>>,
        weight: W,
        left_weight: L,
        right_weight: R,
    ) -> Option<usize>
    where
        W: Fn(&V) -> usize + Copy,
        L: Fn(&V) -> usize + Copy,
        R: Fn(&V) -> usize + Copy,
    {
        let Some(node) = node else { return Some(0) };
        let left = Self::subtree_weight(node.left.as_ref(), weight, left_weight, right_weight)?;
        let right = Self::subtree_weight(node.right.as_ref(), weight, left_weight, right_weight)?;
        if left_weight(&node.entry.value) != left || right_weight(&node.entry.value) != right {
            return None;
        }
        Some(left + right + weight(&node.entry.value))
    }
}

impl<K: Ord, V, A: Augmentation<K, V>> PersistentTreeMap<K, V, A> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form must match the ordering on the key
    /// type.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_with(key, |_, _| {}).map(Entry::value)
    }

    /// Looks up a key while reporting every node the descent moves past.
    ///
    /// At each node that is not the target, `on_move` receives the node's
    /// entry and the [`Side`] the descent continues on, before the descent
    /// takes that turn. The callback is an observer: it sees the path, it
    /// cannot change it.
    ///
    /// Returns the matching entry, or `None` if the key is absent.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::{PersistentTreeMap, Side};
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(2, "two")
    ///     .insert(1, "one")
    ///     .insert(3, "three");
    ///
    /// let mut skipped = Vec::new();
    /// let found = map.get_with(&3, |entry, side| {
    ///     if side == Side::Right {
    ///         skipped.push(*entry.key());
    ///     }
    /// });
    /// assert_eq!(found.map(podium::persistent::Entry::value), Some(&"three"));
    /// assert_eq!(skipped, vec![2]);
    /// ```
    pub fn get_with<Q, F>(&self, key: &Q, mut on_move: F) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        F: FnMut(&Entry<K, V>, Side),
    {
        let mut cursor = self.root.as_ref();
        while let Some(node) = cursor {
            match key.cmp(node.entry.key.borrow()) {
                Ordering::Less => {
                    on_move(&node.entry, Side::Left);
                    cursor = node.left.as_ref();
                }
                Ordering::Greater => {
                    on_move(&node.entry, Side::Right);
                    cursor = node.right.as_ref();
                }
                Ordering::Equal => return Some(&node.entry),
            }
        }
        None
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new().insert("key".to_string(), 42);
    ///
    /// assert!(map.contains_key("key"));
    /// assert!(!map.contains_key("other"));
    /// ```
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the entry is replaced: the new
    /// map has the same shape, the path to the entry is copied, and the
    /// length is unchanged. A new key adds a red leaf, rebalances the
    /// copied path bottom-up, and grows the length by one. The root of the
    /// result is always black.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let (new_root, added) = Self::insert_into(self.root.as_ref(), key, value);
        let root = if new_root.color == Color::Red {
            Self::repaint(&new_root, Color::Black)
        } else {
            new_root
        };

        Self {
            root: Some(root),
            length: if added { self.length + 1 } else { self.length },
            augmentation: PhantomData,
        }
    }

    /// Recursive helper for insert.
    /// Returns (`new_node`, `was_added`) where `was_added` is true if a new
    /// entry was added rather than replaced.
    fn insert_into(node: Option<&NodeLink<K, V>>, key: K, value: V) -> (NodeLink<K, V>, bool) {
        let Some(node) = node else {
            let entry = ReferenceCounter::new(Entry::new(key, value));
            return (Self::make_node(Color::Red, &entry, None, None), true);
        };

        match key.cmp(&node.entry.key) {
            Ordering::Less => {
                let (new_left, added) = Self::insert_into(node.left.as_ref(), key, value);
                let rebuilt =
                    Self::make_node(node.color, &node.entry, Some(new_left), node.right.clone());
                if added && rebuilt.color == Color::Black {
                    (Self::balance(&rebuilt), added)
                } else {
                    (rebuilt, added)
                }
            }
            Ordering::Greater => {
                let (new_right, added) = Self::insert_into(node.right.as_ref(), key, value);
                let rebuilt =
                    Self::make_node(node.color, &node.entry, node.left.clone(), Some(new_right));
                if added && rebuilt.color == Color::Black {
                    (Self::balance(&rebuilt), added)
                } else {
                    (rebuilt, added)
                }
            }
            Ordering::Equal => {
                // Key exists: replace the entry, keep the shape.
                let entry = ReferenceCounter::new(Entry::new(key, value));
                let rebuilt =
                    Self::make_node(node.color, &entry, node.left.clone(), node.right.clone());
                (rebuilt, false)
            }
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns a new map without the key. If the key doesn't exist, the
    /// receiver is returned unchanged (sharing the same root).
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (new_root, removed) = Self::remove_from(self.root.as_ref(), key);
        if !removed {
            return self.clone();
        }

        let root = new_root.map(|node| {
            if node.color == Color::Red {
                Self::repaint(&node, Color::Black)
            } else {
                node
            }
        });

        Self {
            root,
            length: self.length - 1,
            augmentation: PhantomData,
        }
    }

    /// Recursive helper for remove.
    /// Returns (`new_node`, `was_removed`); when nothing was removed the
    /// original subtree is handed back untouched.
    fn remove_from<Q>(node: Option<&NodeLink<K, V>>, key: &Q) -> (Option<NodeLink<K, V>>, bool)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(node) = node else {
            return (None, false);
        };

        match key.cmp(node.entry.key.borrow()) {
            Ordering::Less => Self::remove_left(node, key),
            Ordering::Greater => Self::remove_right(node, key),
            Ordering::Equal => (Self::fuse(node.left.as_ref(), node.right.as_ref()), true),
        }
    }

    fn remove_left<Q>(node: &NodeLink<K, V>, key: &Q) -> (Option<NodeLink<K, V>>, bool)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (new_left, removed) = Self::remove_from(node.left.as_ref(), key);
        if !removed {
            return (Some(node.clone()), false);
        }

        // A black child may have taken a unit of black height with it.
        let lost_black = is_black(node.left.as_ref());
        let rebuilt = Self::make_node(Color::Red, &node.entry, new_left, node.right.clone());
        if lost_black {
            (Some(Self::balance_remove_left(&rebuilt)), true)
        } else {
            (Some(rebuilt), true)
        }
    }

    fn remove_right<Q>(node: &NodeLink<K, V>, key: &Q) -> (Option<NodeLink<K, V>>, bool)
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (new_right, removed) = Self::remove_from(node.right.as_ref(), key);
        if !removed {
            return (Some(node.clone()), false);
        }

        let lost_black = is_black(node.right.as_ref());
        let rebuilt = Self::make_node(Color::Red, &node.entry, node.left.clone(), new_right);
        if lost_black {
            (Some(Self::balance_remove_right(&rebuilt)), true)
        } else {
            (Some(rebuilt), true)
        }
    }

    /// Validates the red-black and search-tree invariants.
    ///
    /// Returns the black height of the tree (the number of black nodes on
    /// any root-to-NIL path, at least 1), or 0 if any invariant is broken:
    /// a red node with a red child, unequal black heights, or keys out of
    /// order.
    ///
    /// # Complexity
    ///
    /// O(N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, i32> = (0..100).map(|n| (n, n)).collect();
    /// assert!(map.validate() > 0);
    /// ```
    #[must_use]
    pub fn validate(&self) -> usize {
        Self::black_height(self.root.as_ref())
    }

    /// Black height of a subtree, or 0 if it violates an invariant.
    fn black_height(node: Option<&NodeLink<K, V>>) -> usize {
        let Some(node) = node else {
            // NIL counts as one black node.
            return 1;
        };

        if node.color == Color::Red && (is_red(node.left.as_ref()) || is_red(node.right.as_ref())) {
            return 0;
        }

        if let Some(left) = node.left.as_ref() {
            if left.entry.key >= node.entry.key {
                return 0;
            }
        }
        if let Some(right) = node.right.as_ref() {
            if right.entry.key <= node.entry.key {
                return 0;
            }
        }

        let left_height = Self::black_height(node.left.as_ref());
        let right_height = Self::black_height(node.right.as_ref());
        if left_height == 0 || right_height == 0 || left_height != right_height {
            return 0;
        }

        if node.color == Color::Red {
            left_height
        } else {
            left_height + 1
        }
    }

    // =========================================================================
    // Node construction
    // =========================================================================

    /// The single point every node construction goes through.
    ///
    /// Binds color and children as given, then lets the augmentation decide
    /// the entry.
    fn make_node(
        color: Color,
        entry: &EntryLink<K, V>,
        left: Option<NodeLink<K, V>>,
        right: Option<NodeLink<K, V>>,
    ) -> NodeLink<K, V> {
        let entry = A::rebind_entry(
            entry,
            left.as_deref().map(|node| &*node.entry),
            right.as_deref().map(|node| &*node.entry),
        );
        ReferenceCounter::new(Node {
            color,
            entry,
            left,
            right,
        })
    }

    /// Rebuilds a node with a new color, keeping entry and children.
    fn repaint(node: &NodeLink<K, V>, color: Color) -> NodeLink<K, V> {
        Self::make_node(color, &node.entry, node.left.clone(), node.right.clone())
    }

    // =========================================================================
    // Insertion rebalance
    // =========================================================================

    /// Restores the "no red node has a red child" invariant below a black
    /// node after an insertion.
    ///
    /// Matches the four double-red cases (outer-left, inner-left,
    /// outer-right, inner-right) plus the both-children-red recoloring that
    /// pushes the violation upward.
    fn balance(node: &NodeLink<K, V>) -> NodeLink<K, V> {
        // case: both children red -> recolor, hand the red up
        if is_red(node.left.as_ref()) && is_red(node.right.as_ref()) {
            let new_left = node
                .left
                .as_ref()
                .map(|child| Self::repaint(child, Color::Black));
            let new_right = node
                .right
                .as_ref()
                .map(|child| Self::repaint(child, Color::Black));
            return Self::make_node(Color::Red, &node.entry, new_left, new_right);
        }

        if let Some(left) = node.left.as_ref() {
            if left.color == Color::Red {
                // case: left child red, left-left grandchild red
                if let Some(left_left) = left.left.as_ref() {
                    if left_left.color == Color::Red {
                        let new_left = Self::repaint(left_left, Color::Black);
                        let new_right = Self::make_node(
                            Color::Black,
                            &node.entry,
                            left.right.clone(),
                            node.right.clone(),
                        );
                        return Self::make_node(
                            Color::Red,
                            &left.entry,
                            Some(new_left),
                            Some(new_right),
                        );
                    }
                }
                // case: left child red, left-right grandchild red
                if let Some(left_right) = left.right.as_ref() {
                    if left_right.color == Color::Red {
                        let new_left = Self::make_node(
                            Color::Black,
                            &left.entry,
                            left.left.clone(),
                            left_right.left.clone(),
                        );
                        let new_right = Self::make_node(
                            Color::Black,
                            &node.entry,
                            left_right.right.clone(),
                            node.right.clone(),
                        );
                        return Self::make_node(
                            Color::Red,
                            &left_right.entry,
                            Some(new_left),
                            Some(new_right),
                        );
                    }
                }
            }
        }

        if let Some(right) = node.right.as_ref() {
            if right.color == Color::Red {
                // case: right child red, right-left grandchild red
                if let Some(right_left) = right.left.as_ref() {
                    if right_left.color == Color::Red {
                        let new_left = Self::make_node(
                            Color::Black,
                            &node.entry,
                            node.left.clone(),
                            right_left.left.clone(),
                        );
                        let new_right = Self::make_node(
                            Color::Black,
                            &right.entry,
                            right_left.right.clone(),
                            right.right.clone(),
                        );
                        return Self::make_node(
                            Color::Red,
                            &right_left.entry,
                            Some(new_left),
                            Some(new_right),
                        );
                    }
                }
                // case: right child red, right-right grandchild red
                if let Some(right_right) = right.right.as_ref() {
                    if right_right.color == Color::Red {
                        let new_left = Self::make_node(
                            Color::Black,
                            &node.entry,
                            node.left.clone(),
                            right.left.clone(),
                        );
                        let new_right = Self::repaint(right_right, Color::Black);
                        return Self::make_node(
                            Color::Red,
                            &right.entry,
                            Some(new_left),
                            Some(new_right),
                        );
                    }
                }
            }
        }

        node.clone()
    }

    // =========================================================================
    // Removal: fuse and rebalance
    // =========================================================================

    /// Merges the two subtrees of a deleted node into one, preserving the
    /// search order and restoring the red-black invariants on the way up.
    fn fuse(
        left: Option<&NodeLink<K, V>>,
        right: Option<&NodeLink<K, V>>,
    ) -> Option<NodeLink<K, V>> {
        let (left, right) = match (left, right) {
            (None, right) => return right.cloned(),
            (left, None) => return left.cloned(),
            (Some(left), Some(right)) => (left, right),
        };

        match (left.color, right.color) {
            // case: (B, R) -> descend along the red side
            (Color::Black, Color::Red) => {
                let new_left = Self::fuse(Some(left), right.left.as_ref());
                Some(Self::make_node(
                    Color::Red,
                    &right.entry,
                    new_left,
                    right.right.clone(),
                ))
            }
            // case: (R, B) -> symmetric
            (Color::Red, Color::Black) => {
                let new_right = Self::fuse(left.right.as_ref(), Some(right));
                Some(Self::make_node(
                    Color::Red,
                    &left.entry,
                    left.left.clone(),
                    new_right,
                ))
            }
            // case: (R, R) -> fuse the inner subtrees
            (Color::Red, Color::Red) => {
                let fused = Self::fuse(left.right.as_ref(), right.left.as_ref());
                match fused {
                    Some(ref hinge) if hinge.color == Color::Red => {
                        let new_left = Self::make_node(
                            Color::Red,
                            &left.entry,
                            left.left.clone(),
                            hinge.left.clone(),
                        );
                        let new_right = Self::make_node(
                            Color::Red,
                            &right.entry,
                            hinge.right.clone(),
                            right.right.clone(),
                        );
                        Some(Self::make_node(
                            Color::Red,
                            &hinge.entry,
                            Some(new_left),
                            Some(new_right),
                        ))
                    }
                    _ => {
                        let new_right =
                            Self::make_node(Color::Red, &right.entry, fused, right.right.clone());
                        Some(Self::make_node(
                            Color::Red,
                            &left.entry,
                            left.left.clone(),
                            Some(new_right),
                        ))
                    }
                }
            }
            // case: (B, B) -> fuse the inner subtrees; a black fusion may
            // leave a black-height deficit to repair
            (Color::Black, Color::Black) => {
                let fused = Self::fuse(left.right.as_ref(), right.left.as_ref());
                match fused {
                    Some(ref hinge) if hinge.color == Color::Red => {
                        let new_left = Self::make_node(
                            Color::Black,
                            &left.entry,
                            left.left.clone(),
                            hinge.left.clone(),
                        );
                        let new_right = Self::make_node(
                            Color::Black,
                            &right.entry,
                            hinge.right.clone(),
                            right.right.clone(),
                        );
                        Some(Self::make_node(
                            Color::Red,
                            &hinge.entry,
                            Some(new_left),
                            Some(new_right),
                        ))
                    }
                    _ => {
                        let new_right =
                            Self::make_node(Color::Black, &right.entry, fused, right.right.clone());
                        let merged = Self::make_node(
                            Color::Red,
                            &left.entry,
                            left.left.clone(),
                            Some(new_right),
                        );
                        Some(Self::balance_remove_left(&merged))
                    }
                }
            }
        }
    }

    /// Repairs a black-height deficit in the left subtree of `node`.
    fn balance_remove_left(node: &NodeLink<K, V>) -> NodeLink<K, V> {
        // case: red left child -> repainting it black absorbs the deficit
        if let Some(left) = node.left.as_ref() {
            if left.color == Color::Red {
                let new_left = Self::repaint(left, Color::Black);
                return Self::make_node(
                    Color::Red,
                    &node.entry,
                    Some(new_left),
                    node.right.clone(),
                );
            }
        }

        match node.right.as_ref() {
            // case: black sibling -> repaint it red, push the deficit up
            Some(right) if right.color == Color::Black => {
                let new_right = Self::repaint(right, Color::Red);
                let merged = Self::make_node(
                    Color::Black,
                    &node.entry,
                    node.left.clone(),
                    Some(new_right),
                );
                Self::balance(&merged)
            }
            // case: red sibling with a black left nephew -> rotate the
            // nephew to the top
            Some(right) => match right.left.as_ref() {
                Some(right_left) => {
                    let far_flank = right
                        .right
                        .as_ref()
                        .map(|sibling| Self::repaint(sibling, Color::Red));
                    let unbalanced = Self::make_node(
                        Color::Black,
                        &right.entry,
                        right_left.right.clone(),
                        far_flank,
                    );
                    let new_right = Self::balance(&unbalanced);
                    let new_left = Self::make_node(
                        Color::Black,
                        &node.entry,
                        node.left.clone(),
                        right_left.left.clone(),
                    );
                    Self::make_node(
                        Color::Red,
                        &right_left.entry,
                        Some(new_left),
                        Some(new_right),
                    )
                }
                None => node.clone(),
            },
            None => node.clone(),
        }
    }

    /// Repairs a black-height deficit in the right subtree of `node`.
    fn balance_remove_right(node: &NodeLink<K, V>) -> NodeLink<K, V> {
        // case: red right child -> repainting it black absorbs the deficit
        if let Some(right) = node.right.as_ref() {
            if right.color == Color::Red {
                let new_right = Self::repaint(right, Color::Black);
                return Self::make_node(
                    Color::Red,
                    &node.entry,
                    node.left.clone(),
                    Some(new_right),
                );
            }
        }

        match node.left.as_ref() {
            // case: black sibling -> repaint it red, push the deficit up
            Some(left) if left.color == Color::Black => {
                let new_left = Self::repaint(left, Color::Red);
                let merged = Self::make_node(
                    Color::Black,
                    &node.entry,
                    Some(new_left),
                    node.right.clone(),
                );
                Self::balance(&merged)
            }
            // case: red sibling with a black right nephew -> rotate the
            // nephew to the top
            Some(left) => match left.right.as_ref() {
                Some(left_right) => {
                    let far_flank = left
                        .left
                        .as_ref()
                        .map(|sibling| Self::repaint(sibling, Color::Red));
                    let unbalanced = Self::make_node(
                        Color::Black,
                        &left.entry,
                        far_flank,
                        left_right.left.clone(),
                    );
                    let new_left = Self::balance(&unbalanced);
                    let new_right = Self::make_node(
                        Color::Black,
                        &node.entry,
                        left_right.right.clone(),
                        node.right.clone(),
                    );
                    Self::make_node(
                        Color::Red,
                        &left_right.entry,
                        Some(new_left),
                        Some(new_right),
                    )
                }
                None => node.clone(),
            },
            None => node.clone(),
        }
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Iterator over borrowed entries of a [`PersistentTreeMap`] in sorted key
/// order.
pub struct PersistentTreeMapIterator<'a, K, V> {
    entries: Vec<(&'a K, &'a V)>,
    cursor: usize,
}

impl<'a, K, V> Iterator for PersistentTreeMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.entries.get(self.cursor).copied();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIterator<'_, K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, A> Default for PersistentTreeMap<K, V, A> {
    #[inline]
    fn default() -> Self {
        Self::with_augmentation()
    }
}

impl<K: Ord, V, A: Augmentation<K, V>> FromIterator<(K, V)> for PersistentTreeMap<K, V, A> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_augmentation();
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<'a, K, V, A> IntoIterator for &'a PersistentTreeMap<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentTreeMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: PartialEq, V: PartialEq, A> PartialEq for PersistentTreeMap<K, V, A> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, A> Eq for PersistentTreeMap<K, V, A> {}

impl<K: fmt::Debug, V: fmt::Debug, A> fmt::Debug for PersistentTreeMap<K, V, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, A> fmt::Display for PersistentTreeMap<K, V, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        for (index, (key, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, A> serde::Serialize for PersistentTreeMap<K, V, A>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.length))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentTreeMapVisitor<K, V, A> {
    marker: PhantomData<PersistentTreeMap<K, V, A>>,
}

#[cfg(feature = "serde")]
impl<'de, K, V, A> serde::de::Visitor<'de> for PersistentTreeMapVisitor<K, V, A>
where
    K: serde::Deserialize<'de> + Ord,
    V: serde::Deserialize<'de>,
    A: Augmentation<K, V>,
{
    type Value = PersistentTreeMap<K, V, A>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: serde::de::MapAccess<'de>,
    {
        let mut map = PersistentTreeMap::with_augmentation();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, A> serde::Deserialize<'de> for PersistentTreeMap<K, V, A>
where
    K: serde::Deserialize<'de> + Ord,
    V: serde::Deserialize<'de>,
    A: Augmentation<K, V>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentTreeMapVisitor {
            marker: PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
