//! Time-bounded memoization of operation results.
//!
//! - [`key`]: [`CacheKey`] construction (order-independent, volatile fields
//!   excluded via [`KeyPolicy`]).
//! - [`store`]: [`ResultCache`], the shared TTL map with lazy expiry and
//!   optional oldest-first capacity eviction.
//! - [`sweep`]: optional tokio task purging expired entries on an interval.

pub mod key;
pub mod store;
pub mod sweep;

pub use key::{CacheKey, DEFAULT_IGNORED_FIELDS, KeyPolicy};
pub use store::{CacheStats, DEFAULT_TTL, ResultCache};
pub use sweep::{SweeperHandle, spawn_sweeper};
