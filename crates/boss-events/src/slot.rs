//! Entity Slot Types
//!
//! The fixed-capacity entity pool as the host simulation exposes it once per
//! tick. The tracker only ever reads these values.
//!
//! # Example
//!
//! ```
//! use boss_events::{EntitySlot, PoolSnapshot};
//!
//! let mut pool = PoolSnapshot::empty(1, 10);
//! pool.place(EntitySlot::new(3, 50).with_vitality(2800));
//! assert!(pool.slot(3).unwrap().active);
//! assert_eq!(pool.active_count(), 1);
//! ```

use serde::{Deserialize, Serialize};

/// One slot of the entity pool.
///
/// An empty slot is represented by an inactive slot with type id `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySlot {
    /// Position in the pool
    pub index: usize,
    /// Host type identifier of the entity
    pub type_id: i32,
    /// Whether the slot currently holds a live entity
    pub active: bool,
    /// Remaining life of the entity
    #[serde(default)]
    pub vitality: i32,
    /// Explicit boss attribute set by the host
    #[serde(default)]
    pub boss: bool,
}

impl EntitySlot {
    /// Creates an active, non-boss entity at the given index.
    pub fn new(index: usize, type_id: i32) -> Self {
        Self {
            index,
            type_id,
            active: true,
            vitality: 1,
            boss: false,
        }
    }

    /// Creates an empty slot.
    pub fn empty(index: usize) -> Self {
        Self {
            index,
            type_id: 0,
            active: false,
            vitality: 0,
            boss: false,
        }
    }

    /// Sets the explicit boss attribute.
    pub fn with_boss(mut self, boss: bool) -> Self {
        self.boss = boss;
        self
    }

    /// Sets the vitality.
    pub fn with_vitality(mut self, vitality: i32) -> Self {
        self.vitality = vitality;
        self
    }

    /// Returns true if the slot holds nothing.
    pub fn is_empty(&self) -> bool {
        !self.active
    }
}

/// The whole pool at one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Host tick this snapshot belongs to
    pub tick: u64,
    /// Every slot of the pool, indexed by position
    pub slots: Vec<EntitySlot>,
}

impl PoolSnapshot {
    /// Creates a pool of `capacity` empty slots.
    pub fn empty(tick: u64, capacity: usize) -> Self {
        Self {
            tick,
            slots: (0..capacity).map(EntitySlot::empty).collect(),
        }
    }

    /// Number of slots (the pool capacity).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the pool has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Gets a slot by index.
    pub fn slot(&self, index: usize) -> Option<&EntitySlot> {
        self.slots.get(index)
    }

    /// Writes a slot at its own index. Out-of-range slots are ignored.
    pub fn place(&mut self, slot: EntitySlot) {
        if let Some(existing) = self.slots.get_mut(slot.index) {
            *existing = slot;
        }
    }

    /// Empties the slot at `index`.
    pub fn clear(&mut self, index: usize) {
        self.place(EntitySlot::empty(index));
    }

    /// Iterates over the active slots in index order.
    pub fn active(&self) -> impl Iterator<Item = &EntitySlot> {
        self.slots.iter().filter(|s| s.active)
    }

    /// Number of active slots.
    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}
