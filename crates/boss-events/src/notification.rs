//! Notification Types
//!
//! What the tracker tells its subscribers: which channel fired, for which
//! entity, and what the aggregate looked like once the pass was applied.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EntitySlot;

/// Notification channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// A tracked boss appeared
    Spawn,
    /// A tracked boss was eliminated
    Kill,
    /// A tracked boss vanished without being eliminated
    Despawn,
}

impl Channel {
    /// Returns all channel variants.
    pub fn all() -> &'static [Channel] {
        &[Channel::Spawn, Channel::Kill, Channel::Despawn]
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Spawn => write!(f, "spawn"),
            Channel::Kill => write!(f, "kill"),
            Channel::Despawn => write!(f, "despawn"),
        }
    }
}

/// What caused an entity to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpawnSource {
    /// Natural spawning by the simulation
    Natural,
    /// Summoned by a player action or item
    Summoned,
    /// Spawned by another entity or a script
    Scripted,
    /// Source not reported by the host
    #[default]
    Unknown,
}

/// Cached aggregate view of tracked bosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Number of countable boss units present
    pub count: usize,
    /// True when at least one boss unit is present
    pub any_present: bool,
}

impl AggregateSnapshot {
    /// Builds a snapshot from a count, deriving `any_present`.
    pub fn from_count(count: usize) -> Self {
        Self {
            count,
            any_present: count > 0,
        }
    }
}

/// A single notification delivered on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BossNotification {
    /// Channel this notification was published on
    pub channel: Channel,
    /// Tick of the pool snapshot that produced it
    pub tick: u64,
    /// The entity as last observed
    pub entity: EntitySlot,
    /// Composite family name, if the entity is a segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Spawn source (spawn notifications only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SpawnSource>,
    /// Aggregate after the pass that fired this notification
    pub aggregate: AggregateSnapshot,
}

impl BossNotification {
    /// Creates a notification with no family and no source.
    pub fn new(channel: Channel, tick: u64, entity: EntitySlot) -> Self {
        Self {
            channel,
            tick,
            entity,
            family: None,
            source: None,
            aggregate: AggregateSnapshot::default(),
        }
    }

    /// Sets the composite family name.
    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Sets the spawn source.
    pub fn with_source(mut self, source: SpawnSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Serializes the notification to a JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a notification from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
