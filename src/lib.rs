//! # podium
//!
//! A versioned in-memory leaderboard built on persistent red-black trees.
//!
//! ## Overview
//!
//! `podium` keeps the latest rating of every registered player and answers
//! "what is this player's competitive rank?" in O(log N), where rank 1 is
//! the highest rating and tied ratings share the best rank. Every mutation
//! produces a new immutable snapshot, so the whole history stays cheap to
//! retain and a [`Leaderboard::rollback`](ranking::Leaderboard::rollback)
//! restores any earlier state.
//!
//! The crate is layered bottom-up:
//!
//! - [`persistent::PersistentTreeMap`]: an immutable ordered map with
//!   structural sharing. Node construction is routed through a pluggable
//!   [`persistent::Augmentation`] hook so callers can maintain per-node
//!   derived data.
//! - [`ranking::RatingIndex`]: a rating-keyed order-statistic index. Its
//!   augmentation keeps, at every node, the number of players stored in the
//!   left (higher-rated) subtree, which makes rank queries a single descent.
//! - [`ranking::Leaderboard`]: pairs a name-keyed map with the rating index,
//!   records every mutation in parallel history stacks, and exposes
//!   register/unregister/rank/list/rollback.
//!
//! ## Example
//!
//! ```rust
//! use podium::ranking::Leaderboard;
//!
//! let mut board = Leaderboard::new();
//! board.register("ayu", 1200);
//! board.register("banjo", 950);
//! board.register("cosmo", 1200);
//!
//! assert_eq!(board.rank("ayu"), Some(1));   // ties share the best rank
//! assert_eq!(board.rank("cosmo"), Some(1));
//! assert_eq!(board.rank("banjo"), Some(3));
//!
//! board.rollback(1); // undo the registration of "cosmo"
//! assert_eq!(board.rank("cosmo"), None);
//! assert_eq!(board.rank("banjo"), Some(2));
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: use `std::sync::Arc` instead of `std::rc::Rc` for shared node
//!   ownership, making snapshots `Send + Sync`
//! - `serde`: `Serialize`/`Deserialize` for the persistent map and the
//!   listing rows

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod persistent;
pub mod ranking;

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use podium::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
    pub use crate::ranking::*;
}
