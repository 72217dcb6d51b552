//! Per-slot history.
//!
//! Records, for every pool slot, what the tracker last saw there and whether
//! the slot counts toward the aggregate.

use boss_events::EntitySlot;

use crate::classify::CompositeFamily;

/// History of one pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotHistory {
    /// Type id last observed in the slot
    pub type_id: i32,
    /// Boss attribute of the entity when it was counted
    pub boss: bool,
    /// Whether the slot counts as a present boss
    pub counted_as_present: bool,
    /// Eliminated hook fired; the host has not emptied the slot yet
    pub pending_elimination: bool,
}

/// Fixed-size table of slot histories, one per pool slot.
#[derive(Debug, Clone, Default)]
pub struct SlotHistoryTable {
    entries: Vec<SlotHistory>,
}

impl SlotHistoryTable {
    /// Creates a table of `capacity` empty entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![SlotHistory::default(); capacity],
        }
    }

    /// Discards all history and resizes to `capacity`.
    pub fn rebuild(&mut self, capacity: usize) {
        self.entries.clear();
        self.entries.resize(capacity, SlotHistory::default());
    }

    /// Number of slots tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table tracks no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets a slot's history.
    pub fn get(&self, index: usize) -> Option<&SlotHistory> {
        self.entries.get(index)
    }

    /// Checks if a slot is counted.
    pub fn is_counted(&self, index: usize) -> bool {
        self.get(index).is_some_and(|h| h.counted_as_present)
    }

    /// Checks if a slot has a pending elimination.
    pub fn is_pending(&self, index: usize) -> bool {
        self.get(index).is_some_and(|h| h.pending_elimination)
    }

    /// Marks an entity's slot as counted, remembering its type and boss
    /// attribute.
    ///
    /// Returns true if the counted flag changed.
    pub fn mark_counted(&mut self, entity: &EntitySlot) -> bool {
        match self.entries.get_mut(entity.index) {
            Some(entry) => {
                let changed = !entry.counted_as_present;
                entry.type_id = entity.type_id;
                entry.boss = entity.boss;
                entry.counted_as_present = true;
                changed
            }
            None => false,
        }
    }

    /// Clears a slot's counted flag.
    ///
    /// Returns true if the flag was set.
    pub fn clear_counted(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => std::mem::replace(&mut entry.counted_as_present, false),
            None => false,
        }
    }

    /// Records an observed type id without touching the counted flag.
    pub fn observe_type(&mut self, index: usize, type_id: i32) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.type_id = type_id;
        }
    }

    /// Sets or clears a slot's pending elimination marker.
    pub fn set_pending(&mut self, index: usize, pending: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.pending_elimination = pending;
        }
    }

    /// Indices of all counted slots, in index order.
    pub fn counted(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, h)| h.counted_as_present)
            .map(|(i, _)| i)
    }

    /// Number of counted slots.
    pub fn counted_count(&self) -> usize {
        self.counted().count()
    }

    /// Indices of counted slots whose recorded type belongs to a family.
    pub fn counted_in_family<'a>(
        &'a self,
        family: &'a CompositeFamily,
    ) -> impl Iterator<Item = usize> + 'a {
        self.counted()
            .filter(move |&i| family.contains(self.entries[i].type_id))
    }
}
