//! Conflict detection
//!
//! Given a set of scheduled burns with dispersion results and start
//! times, produces all pairwise conflict records: which plumes would
//! overlap dangerously in space and time, and how badly. A coarse 1 km
//! spatial grid keeps the expected cost near O(N); a hard per-date cap
//! bounds the worst case.

mod detector;
mod grid;

pub use detector::{candidate_pairs, detect, pair_conflict, ScheduledBurn};
pub use grid::SpatialGrid;
