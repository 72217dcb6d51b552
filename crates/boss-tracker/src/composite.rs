//! Composite family reconciliation.
//!
//! A composite boss has no instance id in the host. Its state is inferred on
//! every pass from two sources: which of its slots the history counts, and
//! which of its segments are live in the pool right now.

use boss_events::PoolSnapshot;
use serde::{Deserialize, Serialize};

use crate::classify::CompositeFamily;
use crate::history::SlotHistoryTable;

/// Derived state of a composite family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// No counted slot, no live segment
    Absent,
    /// Live segments the history does not count yet
    Forming,
    /// Counted and live
    Present,
    /// Counted, but none of its segments is live any more
    Dissolving,
}

/// A family's counted and live slots at one point of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyView {
    /// Slots the history counts for this family
    pub counted: Vec<usize>,
    /// Active segments without a pending elimination
    pub live: Vec<usize>,
}

impl FamilyView {
    /// Observes a family, optionally ignoring one slot.
    ///
    /// The ignored slot is the one being eliminated or retired, so the view
    /// answers "what is left without it".
    pub fn observe(
        pool: &PoolSnapshot,
        history: &SlotHistoryTable,
        family: &CompositeFamily,
        exclude: Option<usize>,
    ) -> Self {
        let counted = history
            .counted_in_family(family)
            .filter(|&i| Some(i) != exclude)
            .collect();
        let live = pool
            .slots
            .iter()
            .filter(|s| s.active && family.contains(s.type_id))
            .filter(|s| Some(s.index) != exclude && !history.is_pending(s.index))
            .map(|s| s.index)
            .collect();
        Self { counted, live }
    }

    /// Derives the instance state.
    pub fn state(&self) -> InstanceState {
        match (self.counted.is_empty(), self.live.is_empty()) {
            (true, true) => InstanceState::Absent,
            (true, false) => InstanceState::Forming,
            (false, false) => InstanceState::Present,
            (false, true) => InstanceState::Dissolving,
        }
    }

    /// Canonical representative among the live segments: the lowest index.
    pub fn representative(&self) -> Option<usize> {
        self.live.first().copied()
    }

    /// Counted slots that are no longer live.
    pub fn stale(&self) -> Vec<usize> {
        self.counted
            .iter()
            .copied()
            .filter(|i| !self.live.contains(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountPolicy;
    use boss_events::fixtures::{eater_segments, pool_with};
    use boss_events::EntitySlot;

    fn eater() -> CompositeFamily {
        CompositeFamily {
            id: 0,
            name: "eater_of_worlds".to_string(),
            first_type_id: 13,
            last_type_id: 15,
            count_policy: CountPolicy::Unit,
        }
    }

    #[test]
    fn test_absent_family() {
        let pool = PoolSnapshot::empty(0, 10);
        let history = SlotHistoryTable::new(10);

        let view = FamilyView::observe(&pool, &history, &eater(), None);
        assert_eq!(view.state(), InstanceState::Absent);
        assert_eq!(view.representative(), None);
    }

    #[test]
    fn test_forming_then_present() {
        let pool = pool_with(10, &eater_segments(4, 1));
        let mut history = SlotHistoryTable::new(10);

        let view = FamilyView::observe(&pool, &history, &eater(), None);
        assert_eq!(view.state(), InstanceState::Forming);
        assert_eq!(view.live, vec![4, 5, 6]);
        assert_eq!(view.representative(), Some(4));

        history.mark_counted(&EntitySlot::new(4, 13));
        let view = FamilyView::observe(&pool, &history, &eater(), None);
        assert_eq!(view.state(), InstanceState::Present);
        assert!(view.stale().is_empty());
    }

    #[test]
    fn test_exclude_and_pending() {
        let pool = pool_with(10, &eater_segments(0, 1));
        let mut history = SlotHistoryTable::new(10);
        history.mark_counted(&EntitySlot::new(0, 13));
        history.set_pending(1, true);

        let view = FamilyView::observe(&pool, &history, &eater(), Some(0));
        assert!(view.counted.is_empty());
        assert_eq!(view.live, vec![2]);
        assert_eq!(view.state(), InstanceState::Forming);
    }

    #[test]
    fn test_dissolving() {
        let pool = PoolSnapshot::empty(0, 10);
        let mut history = SlotHistoryTable::new(10);
        history.mark_counted(&EntitySlot::new(3, 14));

        let view = FamilyView::observe(&pool, &history, &eater(), None);
        assert_eq!(view.state(), InstanceState::Dissolving);
        assert_eq!(view.stale(), vec![3]);
    }
}
