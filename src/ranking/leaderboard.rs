//! Versioned leaderboard with O(log N) rank queries and rollback.
//!
//! [`Leaderboard`] composes two persistent structures that are mutated in
//! lockstep: a name-keyed map holding each player's current rating, and a
//! [`RatingIndex`] answering rank queries. Every successful mutation pushes
//! one new snapshot of each onto a pair of history stacks, so
//! [`rollback`](Leaderboard::rollback) is a truncation — the restored
//! snapshots were never torn down, they were shared all along.

use crate::persistent::PersistentTreeMap;

use super::index::{Rating, RatingIndex};

/// Name-keyed map of each player's current rating.
pub type PlayerRatings = PersistentTreeMap<String, Rating>;

// =============================================================================
// Listing Row
// =============================================================================

/// One row of a leaderboard listing.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerInfo {
    /// Player name.
    pub name: String,
    /// The player's current rating.
    pub rating: Rating,
    /// Competitive rank: 1 is best, tied ratings share the best rank.
    pub rank: usize,
}

// =============================================================================
// Leaderboard Definition
// =============================================================================

/// An in-memory leaderboard with snapshot history.
///
/// Tracks the latest rating of every registered player and answers rank
/// queries in O(log N). Each [`register`] or successful [`unregister`]
/// appends one immutable snapshot to the history; [`rollback`] restores
/// the state as it was any number of mutations ago.
///
/// The leaderboard itself is a mutable handle; all the shared state below
/// it is immutable, so holding onto it from multiple threads requires the
/// `arc` feature and external serialization of writes.
///
/// [`register`]: Leaderboard::register
/// [`unregister`]: Leaderboard::unregister
/// [`rollback`]: Leaderboard::rollback
///
/// # Examples
///
/// ```rust
/// use podium::ranking::Leaderboard;
///
/// let mut board = Leaderboard::new();
/// board.register("A", 100);
/// board.register("B", 75);
/// board.register("C", 300);
///
/// assert_eq!(board.rank("C"), Some(1));
/// assert_eq!(board.rank("A"), Some(2));
/// assert_eq!(board.rank("B"), Some(3));
///
/// board.rollback(2);
/// assert_eq!(board.player_count(), 1);
/// assert_eq!(board.rank("A"), Some(1));
/// ```
#[derive(Clone, Debug)]
pub struct Leaderboard {
    /// Snapshots of the name-to-rating map; index 0 is the empty state.
    ratings_history: Vec<PlayerRatings>,
    /// Snapshots of the rating index, in lockstep with `ratings_history`.
    index_history: Vec<RatingIndex>,
}

impl Leaderboard {
    /// Creates an empty leaderboard.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::Leaderboard;
    ///
    /// let board = Leaderboard::new();
    /// assert!(board.is_empty());
    /// assert!(board.players().is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            ratings_history: vec![PlayerRatings::new()],
            index_history: vec![RatingIndex::new()],
        }
    }

    fn current_ratings(&self) -> &PlayerRatings {
        self.ratings_history
            .last()
            .expect("history always retains the initial snapshot")
    }

    fn current_index(&self) -> &RatingIndex {
        self.index_history
            .last()
            .expect("history always retains the initial snapshot")
    }

    /// Number of currently registered players.
    #[inline]
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.current_ratings().len()
    }

    /// Returns `true` if no players are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current_ratings().is_empty()
    }

    /// Number of snapshots currently retained, including the initial empty
    /// state.
    ///
    /// Grows by one on every [`register`](Self::register) and every
    /// successful [`unregister`](Self::unregister).
    #[inline]
    #[must_use]
    pub fn history_depth(&self) -> usize {
        self.ratings_history.len()
    }

    /// Registers a player result, recording a new snapshot.
    ///
    /// A known name is re-registered atomically: the old rating leaves the
    /// index, the new one enters it, and exactly one snapshot is recorded —
    /// also when the rating is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::Leaderboard;
    ///
    /// let mut board = Leaderboard::new();
    /// board.register("ada", 1500);
    /// board.register("ada", 1700); // re-registration, one history step
    ///
    /// assert_eq!(board.rating("ada"), Some(1700));
    /// assert_eq!(board.history_depth(), 3);
    /// ```
    pub fn register(&mut self, name: impl Into<String>, rating: Rating) {
        let name = name.into();
        let previous = self.current_ratings().get(name.as_str()).copied();

        let tip = self.current_index();
        let new_index = match previous {
            Some(old_rating) => tip.erase(old_rating).record(rating),
            None => tip.record(rating),
        };
        let new_ratings = self.current_ratings().insert(name, rating);

        self.index_history.push(new_index);
        self.ratings_history.push(new_ratings);
        debug_assert_eq!(self.ratings_history.len(), self.index_history.len());
    }

    /// Unregisters a player, recording a new snapshot.
    ///
    /// Unknown names are a silent no-op and record nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::Leaderboard;
    ///
    /// let mut board = Leaderboard::new();
    /// board.register("ada", 1500);
    ///
    /// board.unregister("ghost"); // no-op, no snapshot
    /// assert_eq!(board.history_depth(), 2);
    ///
    /// board.unregister("ada");
    /// assert!(board.is_empty());
    /// assert_eq!(board.history_depth(), 3);
    /// ```
    pub fn unregister(&mut self, name: &str) {
        let Some(rating) = self.current_ratings().get(name).copied() else {
            return;
        };

        let new_index = self.current_index().erase(rating);
        let new_ratings = self.current_ratings().remove(name);

        self.index_history.push(new_index);
        self.ratings_history.push(new_ratings);
        debug_assert_eq!(self.ratings_history.len(), self.index_history.len());
    }

    /// The player's current rating, or `None` if not registered.
    #[must_use]
    pub fn rating(&self, name: &str) -> Option<Rating> {
        self.current_ratings().get(name).copied()
    }

    /// The player's competitive rank: 1 is the highest rating, tied
    /// ratings share the best rank. Returns `None` for unknown names.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::Leaderboard;
    ///
    /// let mut board = Leaderboard::new();
    /// board.register("A", 100);
    /// board.register("B", 100);
    /// board.register("C", 50);
    ///
    /// assert_eq!(board.rank("A"), Some(1));
    /// assert_eq!(board.rank("B"), Some(1));
    /// assert_eq!(board.rank("C"), Some(3));
    /// assert_eq!(board.rank("unknown"), None);
    /// ```
    #[must_use]
    pub fn rank(&self, name: &str) -> Option<usize> {
        let rating = self.rating(name)?;
        self.current_index().rank_of(rating)
    }

    /// Lists every registered player with rating and rank, ordered by
    /// name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::{Leaderboard, PlayerInfo};
    ///
    /// let mut board = Leaderboard::new();
    /// board.register("B", 75);
    /// board.register("A", 100);
    ///
    /// let rows = board.players();
    /// assert_eq!(
    ///     rows,
    ///     vec![
    ///         PlayerInfo { name: "A".to_string(), rating: 100, rank: 1 },
    ///         PlayerInfo { name: "B".to_string(), rating: 75, rank: 2 },
    ///     ]
    /// );
    /// ```
    #[must_use]
    pub fn players(&self) -> Vec<PlayerInfo> {
        let index = self.current_index();
        self.current_ratings()
            .iter()
            .map(|(name, rating)| PlayerInfo {
                name: name.clone(),
                rating: *rating,
                rank: index
                    .rank_of(*rating)
                    .expect("every registered rating is indexed"),
            })
            .collect()
    }

    /// Restores the state as it was `steps` mutations ago.
    ///
    /// `rollback(0)` is a no-op. Rolling back further than the recorded
    /// history clamps to the initial empty state; the initial snapshot is
    /// never discarded.
    ///
    /// # Complexity
    ///
    /// O(1) to truncate; releasing the dropped snapshots costs
    /// O(steps · log N) reference-count decrements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use podium::ranking::Leaderboard;
    ///
    /// let mut board = Leaderboard::new();
    /// board.register("A", 100);
    /// board.register("B", 75);
    ///
    /// board.rollback(1);
    /// assert_eq!(board.player_count(), 1);
    ///
    /// board.rollback(100); // clamps to the empty state
    /// assert!(board.is_empty());
    /// ```
    pub fn rollback(&mut self, steps: usize) {
        let retained = self.ratings_history.len().saturating_sub(steps).max(1);
        self.ratings_history.truncate(retained);
        self.index_history.truncate(retained);
        debug_assert_eq!(self.ratings_history.len(), self.index_history.len());
    }
}

impl Default for Leaderboard {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
