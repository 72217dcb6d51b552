//! Shared data types for the boss tracker.
//!
//! This crate contains pure data structures with no tracking logic: the pool
//! snapshot the host hands over every tick, the notifications the tracker
//! publishes, and the trace records used to replay host sessions.

pub mod notification;
pub mod slot;
pub mod trace;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export slot types
pub use slot::{EntitySlot, PoolSnapshot};

// Re-export notification types
pub use notification::{AggregateSnapshot, BossNotification, Channel, SpawnSource};

// Re-export trace types
pub use trace::TraceRecord;
