//! Aggregate cache.
//!
//! Holds the last computed boss count. Reads are field reads; a recompute is
//! a full pass over the pool, which is small and bounded.

use boss_events::{AggregateSnapshot, PoolSnapshot};

use crate::classify::BossRule;
use crate::config::CountPolicy;
use crate::history::SlotHistoryTable;

/// Cached aggregate with a full re-scan on demand.
#[derive(Debug, Clone, Default)]
pub struct AggregateCache {
    snapshot: AggregateSnapshot,
    rescans: u64,
}

impl AggregateCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of countable boss units.
    pub fn count(&self) -> usize {
        self.snapshot.count
    }

    /// True when at least one boss unit is present.
    pub fn any_present(&self) -> bool {
        self.snapshot.any_present
    }

    /// The cached snapshot.
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.snapshot
    }

    /// Number of full re-scans performed since creation or the last reset.
    pub fn rescans(&self) -> u64 {
        self.rescans
    }

    /// Recomputes the aggregate from the pool.
    ///
    /// A slot contributes when it holds a live boss that has no pending
    /// elimination. Composite families with the unit policy contribute once
    /// no matter how many segments are live.
    pub fn invalidate(
        &mut self,
        pool: &PoolSnapshot,
        history: &SlotHistoryTable,
        rule: &BossRule,
    ) -> AggregateSnapshot {
        let mut count = 0;
        let mut unit_families_seen = vec![false; rule.families().len()];

        for slot in &pool.slots {
            if !rule.qualifies(slot) || history.is_pending(slot.index) {
                continue;
            }
            match rule.family_of(slot.type_id) {
                Some(family) if family.count_policy == CountPolicy::Unit => {
                    unit_families_seen[family.id] = true;
                }
                _ => count += 1,
            }
        }
        count += unit_families_seen.iter().filter(|&&seen| seen).count();

        self.snapshot = AggregateSnapshot::from_count(count);
        self.rescans += 1;
        self.snapshot
    }

    /// Resets to an empty aggregate.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompositeFamilyConfig, RuleConfig};
    use boss_events::fixtures::{
        boss, critter, eater_segments, pool_with, BLUE_SLIME, EYE_OF_CTHULHU, KING_SLIME,
    };

    fn rule_with_policy(policy: CountPolicy) -> BossRule {
        BossRule::from_config(&RuleConfig {
            boss_types: vec![KING_SLIME],
            composite: vec![CompositeFamilyConfig {
                name: "eater_of_worlds".to_string(),
                first_type_id: 13,
                last_type_id: 15,
                count_policy: policy,
            }],
        })
    }

    #[test]
    fn test_empty_cache() {
        let cache = AggregateCache::new();

        assert_eq!(cache.count(), 0);
        assert!(!cache.any_present());
        assert_eq!(cache.rescans(), 0);
    }

    #[test]
    fn test_counts_plain_bosses() {
        let rule = rule_with_policy(CountPolicy::Unit);
        let pool = pool_with(
            10,
            &[boss(1, EYE_OF_CTHULHU), critter(2, KING_SLIME), critter(3, BLUE_SLIME)],
        );
        let history = SlotHistoryTable::new(10);
        let mut cache = AggregateCache::new();

        let snapshot = cache.invalidate(&pool, &history, &rule);

        assert_eq!(snapshot.count, 2);
        assert!(cache.any_present());
        assert_eq!(cache.rescans(), 1);
    }

    #[test]
    fn test_unit_family_counts_once() {
        let rule = rule_with_policy(CountPolicy::Unit);
        let pool = pool_with(10, &eater_segments(2, 3));
        let history = SlotHistoryTable::new(10);
        let mut cache = AggregateCache::new();

        assert_eq!(cache.invalidate(&pool, &history, &rule).count, 1);
    }

    #[test]
    fn test_per_segment_family_counts_each() {
        let rule = rule_with_policy(CountPolicy::PerSegment);
        let pool = pool_with(10, &eater_segments(2, 3));
        let history = SlotHistoryTable::new(10);
        let mut cache = AggregateCache::new();

        assert_eq!(cache.invalidate(&pool, &history, &rule).count, 5);
    }

    #[test]
    fn test_pending_elimination_excluded() {
        let rule = rule_with_policy(CountPolicy::Unit);
        let pool = pool_with(10, &[boss(4, EYE_OF_CTHULHU)]);
        let mut history = SlotHistoryTable::new(10);
        history.set_pending(4, true);
        let mut cache = AggregateCache::new();

        let snapshot = cache.invalidate(&pool, &history, &rule);
        assert_eq!(snapshot, AggregateSnapshot::from_count(0));
    }

    #[test]
    fn test_reset() {
        let rule = rule_with_policy(CountPolicy::Unit);
        let pool = pool_with(4, &[boss(0, EYE_OF_CTHULHU)]);
        let mut cache = AggregateCache::new();
        cache.invalidate(&pool, &SlotHistoryTable::new(4), &rule);

        cache.reset();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.rescans(), 0);
    }
}
