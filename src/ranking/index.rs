//! Order-statistic index over player ratings.
//!
//! This module provides [`RatingIndex`], a persistent map keyed by rating
//! in descending order whose entries carry subtree player counts. The
//! counts are maintained by an [`Augmentation`] hook on every node
//! construction, which is what makes rank queries a single O(log N)
//! descent.
//!
//! # How the counts stay correct
//!
//! The tree only constructs a node once its children are final, so by the
//! time the hook runs, the child entries it is shown are exactly the ones
//! the node will hang over. Each entry stores the player totals of both of
//! its subtrees; a node's totals are therefore computable from its
//! children's entries alone, and the hook refreshes them on every copied
//! path in the same bottom-up pass as the rebalance. Both totals are
//! needed: a subtree's population can only be read off its root entry if
//! that entry accounts for the left side, the right side, and itself.

use std::cmp::Reverse;

use crate::persistent::{
    Augmentation, Entry, EntryLink, PersistentTreeMap, ReferenceCounter, Side,
};

/// A player rating.
pub type Rating = i64;

// =============================================================================
// Rating Bucket Statistics
// =============================================================================

/// Per-rating bookkeeping stored in the [`RatingIndex`].
///
/// One entry exists per distinct rating. `equal_count` is the number of
/// players currently holding the rating; the subtree totals are derived
/// data refreshed by the index's augmentation hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatingStats {
    equal_count: usize,
    left_subtree_size: usize,
    right_subtree_size: usize,
}

impl RatingStats {
    /// A fresh bucket for `equal_count` players.
    ///
    /// The subtree totals start at zero; the augmentation hook overwrites
    /// them as soon as the entry is bound into a node.
    const fn bucket(equal_count: usize) -> Self {
        Self {
            equal_count,
            left_subtree_size: 0,
            right_subtree_size: 0,
        }
    }

    /// Number of players currently holding this rating.
    #[inline]
    #[must_use]
    pub const fn equal_count(&self) -> usize {
        self.equal_count
    }

    /// Total players in the subtree rooted at this entry's node.
    const fn subtree_size(&self) -> usize {
        self.left_subtree_size + self.equal_count + self.right_subtree_size
    }
}

// =============================================================================
// Augmentation Hook
// =============================================================================

/// Augmentation that refreshes [`RatingStats`] subtree totals at every
/// node construction.
///
/// When the stored totals already match, the entry is reused so structural
/// sharing is preserved; otherwise a new entry is allocated with
/// `equal_count` unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct RatingOrderStatistic;

impl Augmentation<Reverse<Rating>, RatingStats> for RatingOrderStatistic {
    fn rebind_entry(
        entry: &EntryLink<Reverse<Rating>, RatingStats>,
        left: Option<&Entry<Reverse<Rating>, RatingStats>>,
        right: Option<&Entry<Reverse<Rating>, RatingStats>>,
    ) -> EntryLink<Reverse<Rating>, RatingStats> {
        let left_subtree_size = left.map_or(0, |child| child.value().subtree_size());
        let right_subtree_size = right.map_or(0, |child| child.value().subtree_size());
        let current = entry.value();
        if current.left_subtree_size == left_subtree_size
            && current.right_subtree_size == right_subtree_size
        {
            entry.clone()
        } else {
            ReferenceCounter::new(Entry::new(
                *entry.key(),
                RatingStats {
                    equal_count: current.equal_count,
                    left_subtree_size,
                    right_subtree_size,
                },
            ))
        }
    }
}

// =============================================================================
// RatingIndex Definition
// =============================================================================

/// A persistent order-statistic index of player ratings.
///
/// Maps each distinct rating to the number of players holding it, ordered
/// by rating descending. Because every entry also carries its subtree
/// player totals, the competitive rank of a rating — one plus the number
/// of players rated strictly higher — is answered by a single descent.
///
/// Like the map it is built on, the index is immutable: [`record`] and
/// [`erase`] return new versions and leave the receiver untouched.
///
/// [`record`]: RatingIndex::record
/// [`erase`]: RatingIndex::erase
///
/// # Examples
///
/// ```rust
/// use podium::ranking::RatingIndex;
///
/// let index = RatingIndex::new()
///     .record(1200)
///     .record(950)
///     .record(1200);
///
/// assert_eq!(index.rank_of(1200), Some(1)); // two players share rank 1
/// assert_eq!(index.rank_of(950), Some(3));
/// assert_eq!(index.rank_of(700), None);
/// ```
#[derive(Clone, Default)]
pub struct RatingIndex {
    buckets: PersistentTreeMap<Reverse<Rating>, RatingStats, RatingOrderStatistic>,
}

impl RatingIndex {
    /// Creates an empty index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new();
    /// assert!(index.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buckets: PersistentTreeMap::with_augmentation(),
        }
    }

    /// Returns `true` if no players are recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of distinct ratings currently held.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new().record(100).record(100).record(75);
    /// assert_eq!(index.rating_count(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn rating_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of recorded players.
    ///
    /// # Complexity
    ///
    /// O(R) where R is the number of distinct ratings.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new().record(100).record(100).record(75);
    /// assert_eq!(index.player_count(), 3);
    /// ```
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.buckets.values().map(RatingStats::equal_count).sum()
    }

    /// Number of players holding exactly `rating`, if any.
    #[must_use]
    pub fn players_at(&self, rating: Rating) -> Option<usize> {
        self.buckets
            .get(&Reverse(rating))
            .map(RatingStats::equal_count)
    }

    /// Records one more player at `rating`, returning the new index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new().record(100);
    /// let tied = index.record(100);
    ///
    /// assert_eq!(index.players_at(100), Some(1)); // original unchanged
    /// assert_eq!(tied.players_at(100), Some(2));
    /// ```
    #[must_use]
    pub fn record(&self, rating: Rating) -> Self {
        let equal_count = self.players_at(rating).map_or(1, |count| count + 1);
        Self {
            buckets: self
                .buckets
                .insert(Reverse(rating), RatingStats::bucket(equal_count)),
        }
    }

    /// Removes one player from `rating`, returning the new index.
    ///
    /// The last player at a rating removes the whole bucket. Erasing a
    /// rating nobody holds returns the index unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new().record(100).record(100);
    ///
    /// assert_eq!(index.erase(100).players_at(100), Some(1));
    /// assert_eq!(index.erase(100).erase(100).players_at(100), None);
    /// assert_eq!(index.erase(700).player_count(), 2);
    /// ```
    #[must_use]
    pub fn erase(&self, rating: Rating) -> Self {
        match self.players_at(rating) {
            None => self.clone(),
            Some(1) => Self {
                buckets: self.buckets.remove(&Reverse(rating)),
            },
            Some(count) => {
                let trimmed = self.buckets.remove(&Reverse(rating));
                Self {
                    buckets: trimmed.insert(Reverse(rating), RatingStats::bucket(count - 1)),
                }
            }
        }
    }

    /// Competitive rank of `rating`: one plus the number of players rated
    /// strictly higher. Tied players share the same rank. Returns `None`
    /// if nobody holds `rating`.
    ///
    /// # Complexity
    ///
    /// O(log R)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new()
    ///     .record(300)
    ///     .record(100)
    ///     .record(100)
    ///     .record(15);
    ///
    /// assert_eq!(index.rank_of(300), Some(1));
    /// assert_eq!(index.rank_of(100), Some(2));
    /// assert_eq!(index.rank_of(15), Some(4));
    /// assert_eq!(index.rank_of(200), None);
    /// ```
    #[must_use]
    pub fn rank_of(&self, rating: Rating) -> Option<usize> {
        let mut preceding = 0usize;
        let found = self.buckets.get_with(&Reverse(rating), |entry, side| {
            // Turning right skips the node and its whole higher-rated
            // left subtree.
            if side == Side::Right {
                let skipped = entry.value();
                preceding += skipped.left_subtree_size + skipped.equal_count;
            }
        });
        found.map(|entry| preceding + entry.value().left_subtree_size + 1)
    }

    /// Iterates `(rating, players_at_rating)` in descending rating order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::RatingIndex;
    ///
    /// let index = RatingIndex::new().record(100).record(300).record(100);
    /// let buckets: Vec<(i64, usize)> = index.ratings().collect();
    /// assert_eq!(buckets, vec![(300, 1), (100, 2)]);
    /// ```
    pub fn ratings(&self) -> impl Iterator<Item = (Rating, usize)> + '_ {
        self.buckets
            .iter()
            .map(|(key, stats)| (key.0, stats.equal_count))
    }

    /// Validates the underlying tree and the subtree player totals.
    ///
    /// Returns the tree's black height, or 0 if the red-black invariants
    /// are broken or any entry's stored totals disagree with the actual
    /// populations below it.
    #[must_use]
    pub fn validate(&self) -> usize {
        let totals_hold = self.buckets.augmentation_consistent(
            RatingStats::equal_count,
            |stats| stats.left_subtree_size,
            |stats| stats.right_subtree_size,
        );
        if totals_hold {
            self.buckets.validate()
        } else {
            0
        }
    }
}

impl std::fmt::Debug for RatingIndex {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_map()
            .entries(self.ratings())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn index_of(ratings: impl IntoIterator<Item = Rating>) -> RatingIndex {
        ratings
            .into_iter()
            .fold(RatingIndex::new(), |index, rating| index.record(rating))
    }

    /// Rank computed the slow way: count players rated strictly higher.
    fn naive_rank(index: &RatingIndex, rating: Rating) -> Option<usize> {
        index.players_at(rating)?;
        let higher: usize = index
            .ratings()
            .filter(|(other, _)| *other > rating)
            .map(|(_, count)| count)
            .sum();
        Some(higher + 1)
    }

    #[rstest]
    fn test_empty_index() {
        let index = RatingIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.player_count(), 0);
        assert_eq!(index.rank_of(100), None);
        assert_eq!(index.validate(), 1);
    }

    #[rstest]
    fn test_ranks_with_distinct_ratings() {
        let index = index_of([100, 75, 300, 15]);
        assert_eq!(index.rank_of(300), Some(1));
        assert_eq!(index.rank_of(100), Some(2));
        assert_eq!(index.rank_of(75), Some(3));
        assert_eq!(index.rank_of(15), Some(4));
        assert!(index.validate() > 0);
    }

    #[rstest]
    fn test_tied_ratings_share_best_rank() {
        let index = index_of([100, 75, 100, 15]);
        assert_eq!(index.rank_of(100), Some(1));
        assert_eq!(index.rank_of(75), Some(3));
        assert_eq!(index.rank_of(15), Some(4));
    }

    #[rstest]
    fn test_totals_stay_fresh_across_rotations() {
        // Enough ascending inserts to force every rebalance shape,
        // including nodes whose left child carries a right subtree.
        let mut index = RatingIndex::new();
        for rating in 0..100 {
            index = index.record(rating);
            assert!(index.validate() > 0, "stale totals after {rating}");
        }
        for rating in 0..100 {
            assert_eq!(index.rank_of(rating), Some((100 - rating) as usize));
        }
    }

    #[rstest]
    fn test_ranks_match_naive_model_on_mixed_workload() {
        let ratings: Vec<Rating> = (0..60).map(|step| (step * 37) % 19).collect();
        let index = index_of(ratings.iter().copied());
        assert!(index.validate() > 0);
        for rating in 0..19 {
            assert_eq!(index.rank_of(rating), naive_rank(&index, rating));
        }
    }

    #[rstest]
    fn test_erase_keeps_totals_fresh() {
        let mut index = index_of(0..50);
        for rating in (0..50).step_by(2) {
            index = index.erase(rating);
            assert!(index.validate() > 0, "stale totals after erasing {rating}");
        }
        assert_eq!(index.player_count(), 25);
        for rating in (1..50).step_by(2) {
            assert_eq!(index.rank_of(rating), naive_rank(&index, rating));
        }
    }

    #[rstest]
    fn test_record_and_erase_are_inverse_on_counts() {
        let index = index_of([10, 20, 20, 30]);
        let touched = index.record(20).erase(20);
        assert_eq!(touched.players_at(20), index.players_at(20));
        assert_eq!(touched.player_count(), index.player_count());
    }

    #[rstest]
    fn test_erase_unknown_rating_is_noop() {
        let index = index_of([10, 20]);
        let untouched = index.erase(999);
        assert_eq!(untouched.player_count(), 2);
        assert_eq!(untouched.rating_count(), 2);
    }

    #[rstest]
    fn test_persistence_of_earlier_versions() {
        let base = index_of([100, 200]);
        let grown = base.record(300);
        let shrunk = base.erase(100);

        assert_eq!(base.player_count(), 2);
        assert_eq!(grown.player_count(), 3);
        assert_eq!(shrunk.player_count(), 1);
        assert_eq!(base.rank_of(100), Some(2));
        assert_eq!(grown.rank_of(100), Some(3));
        assert_eq!(shrunk.rank_of(100), None);
    }
}
