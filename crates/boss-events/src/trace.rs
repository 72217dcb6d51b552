//! Trace Records
//!
//! A recorded sequence of host hook calls, one JSON object per line. Each
//! record carries the slot as it looks after the host applied the change, so
//! a replay can rebuild the pool without knowing the simulation.
//!
//! ```text
//! {"hook":"initialize","capacity":10}
//! {"hook":"created","slot":{"index":3,"type_id":4,"active":true,"boss":true},"source":"summoned"}
//! {"hook":"post_tick"}
//! {"hook":"eliminated","slot":{"index":3,"type_id":4,"active":true,"vitality":0,"boss":true}}
//! {"hook":"removed","index":3}
//! {"hook":"post_tick"}
//! ```

use serde::{Deserialize, Serialize};

use crate::{EntitySlot, SpawnSource};

/// One hook call in a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum TraceRecord {
    /// Sets up a pool of the given capacity
    Initialize { capacity: usize },
    /// An entity was written into a slot and the created hook fired
    Created {
        slot: EntitySlot,
        #[serde(default)]
        source: SpawnSource,
    },
    /// The eliminated hook fired; the entity is still in the pool
    Eliminated { slot: EntitySlot },
    /// The entity was hit; the slot carries its post-hit vitality
    Hit { slot: EntitySlot },
    /// A slot was emptied without any hook firing
    Removed { index: usize },
    /// The pool was resized; all slots become empty
    Resized { capacity: usize },
    /// End of tick: the post-tick pass runs
    PostTick,
}

impl TraceRecord {
    /// Serializes the record to a JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Parses every non-blank line of a JSONL document.
    ///
    /// Returns the 1-based line number alongside the error on failure.
    pub fn parse_all(jsonl: &str) -> Result<Vec<TraceRecord>, (usize, serde_json::Error)> {
        jsonl
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(n, l)| Self::from_jsonl(l).map_err(|e| (n + 1, e)))
            .collect()
    }
}
