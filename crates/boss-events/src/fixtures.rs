//! Sample data fixtures for testing.
//!
//! Ready-made pools and traces for other crates to use. Enable the
//! `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // boss-events = { path = "../boss-events", features = ["test-fixtures"] }
//!
//! use boss_events::fixtures;
//!
//! let pool = fixtures::pool_with(10, &[fixtures::boss(3, fixtures::EYE_OF_CTHULHU)]);
//! let trace = fixtures::sample_trace();
//! ```

use crate::{EntitySlot, PoolSnapshot, TraceRecord};

/// A non-boss critter.
pub const BLUE_SLIME: i32 = 1;
/// A boss carrying the explicit boss attribute.
pub const EYE_OF_CTHULHU: i32 = 4;
/// Head of the segmented sample family.
pub const EATER_HEAD: i32 = 13;
/// Body of the segmented sample family.
pub const EATER_BODY: i32 = 14;
/// Tail of the segmented sample family.
pub const EATER_TAIL: i32 = 15;
/// A boss listed by type id only.
pub const KING_SLIME: i32 = 50;

/// An active entity flagged as a boss by the host.
pub fn boss(index: usize, type_id: i32) -> EntitySlot {
    EntitySlot::new(index, type_id)
        .with_boss(true)
        .with_vitality(1000)
}

/// An active entity without the boss attribute.
pub fn critter(index: usize, type_id: i32) -> EntitySlot {
    EntitySlot::new(index, type_id).with_vitality(25)
}

/// The same entity after a lethal blow.
pub fn dying(slot: EntitySlot) -> EntitySlot {
    slot.with_vitality(0)
}

/// A pool of `capacity` slots holding the given entities.
pub fn pool_with(capacity: usize, entities: &[EntitySlot]) -> PoolSnapshot {
    let mut pool = PoolSnapshot::empty(0, capacity);
    for slot in entities {
        pool.place(*slot);
    }
    pool
}

/// Head, body and tail segments starting at `start`.
pub fn eater_segments(start: usize, body_segments: usize) -> Vec<EntitySlot> {
    let mut segments = vec![critter(start, EATER_HEAD)];
    for i in 0..body_segments {
        segments.push(critter(start + 1 + i, EATER_BODY));
    }
    segments.push(critter(start + 1 + body_segments, EATER_TAIL));
    segments
}

/// Config TOML matching the fixture type ids.
pub fn sample_config_toml() -> &'static str {
    include_str!("../tests/fixtures/sample_config.toml")
}

/// Returns the sample trace from the fixtures file.
///
/// Six notifications come out of it when replayed with the sample config:
/// - 3 spawns (eye at slot 3, eater at slot 6, king slime at slot 1)
/// - 2 kills (eye, eater once its last segment dies)
/// - 1 despawn (king slime removed without a kill)
pub fn sample_trace() -> Vec<TraceRecord> {
    let jsonl = include_str!("../tests/fixtures/sample_trace.jsonl");
    TraceRecord::parse_all(jsonl).unwrap_or_else(|(line, e)| {
        panic!("Failed to parse trace line {}: {}", line, e)
    })
}
