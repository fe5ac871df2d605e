//! Predictive prefetch and request coalescing
//!
//! Every content request, user-facing or speculative, goes through a
//! [`PrefetchCoordinator`], so at most one generation per key is ever in
//! flight. Speculative warm-ups run on a shared [`TaskTracker`] and never
//! surface errors.

pub mod coordinator;
pub mod stats;
pub mod tasks;
pub mod triggers;

pub use coordinator::PrefetchCoordinator;
pub use stats::{CoordinatorMetrics, CoordinatorStatistics};
pub use tasks::TaskTracker;
pub use triggers::{drill_target, lookahead_targets, startup_targets};
