//! The boss tracker.
//!
//! Reacts to host hooks, keeps the slot history and aggregate cache in step
//! with the pool, and publishes Spawn, Kill and Despawn notifications.
//!
//! Every hook runs as one pass: history is updated, the cache is recomputed
//! if any counted flag changed, and only then are the notifications of the
//! pass delivered, each carrying the aggregate as it stands after the pass.

use boss_events::{
    AggregateSnapshot, BossNotification, Channel, EntitySlot, PoolSnapshot, SpawnSource,
};
use std::path::Path;

use crate::bus::{EventBus, HandlerResult, SubscriptionId};
use crate::cache::AggregateCache;
use crate::classify::{BossRule, CompositeFamily};
use crate::composite::{FamilyView, InstanceState};
use crate::config::{CountPolicy, TrackerConfig};
use crate::history::SlotHistoryTable;
use crate::hooks::{Hook, HookRegistrar};
use crate::sink::{ErrorSink, TracingSink};
use crate::TrackerError;

/// Work collected during one hook call.
#[derive(Debug, Default)]
struct Pass {
    /// A counted flag changed, or the table was rebuilt
    changed: bool,
    notifications: Vec<BossNotification>,
}

impl Pass {
    fn push(&mut self, notification: BossNotification) {
        self.notifications.push(notification);
    }
}

/// Tracks boss presence over a host entity pool.
///
/// Lifecycle: [`BossTracker::initialize`] registers the hooks it needs with
/// the host; the host then calls the `on_*` methods from its tick loop;
/// [`BossTracker::shutdown`] releases everything.
pub struct BossTracker {
    /// Configuration settings
    config: TrackerConfig,
    /// Boss classification rule built from config
    rule: BossRule,
    /// One history record per pool slot
    history: SlotHistoryTable,
    /// Cached aggregate
    cache: AggregateCache,
    /// Subscribers
    bus: EventBus,
    /// Recovered error reporting
    sink: Box<dyn ErrorSink>,
    /// Hooks registered with the host, in registration order
    registered: Vec<Hook>,
    /// Between initialize and shutdown
    initialized: bool,
}

impl BossTracker {
    /// Creates an uninitialized tracker reporting to `tracing`.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_sink(config, Box::new(TracingSink))
    }

    /// Creates an uninitialized tracker with a custom error sink.
    pub fn with_sink(config: TrackerConfig, sink: Box<dyn ErrorSink>) -> Self {
        let rule = BossRule::from_config(&config.rule);
        Self {
            config,
            rule,
            history: SlotHistoryTable::default(),
            cache: AggregateCache::new(),
            bus: EventBus::new(),
            sink,
            registered: Vec::new(),
            initialized: false,
        }
    }

    /// Creates a tracker from a configuration file.
    pub fn from_config_file(path: &Path) -> Result<Self, TrackerError> {
        let config = TrackerConfig::from_file(path)?;
        Ok(Self::new(config))
    }

    /// Creates a tracker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TrackerConfig::default())
    }

    /// Hooks this tracker needs for its configured role.
    pub fn required_hooks(&self) -> Vec<Hook> {
        let mut hooks = vec![Hook::EntityCreated, Hook::EntityEliminated, Hook::PostTick];
        if !self.config.network.role.is_authoritative() {
            hooks.push(Hook::EntityHit);
        }
        hooks
    }

    /// Sizes the history table and registers hooks with the host.
    ///
    /// Fails without side effects on a bad capacity or a refused hook; hooks
    /// registered before the refusal are released again.
    pub fn initialize(
        &mut self,
        pool_capacity: usize,
        hooks: &mut dyn HookRegistrar,
    ) -> Result<(), TrackerError> {
        if self.initialized {
            return Err(TrackerError::AlreadyInitialized);
        }
        if pool_capacity == 0 {
            return Err(TrackerError::ZeroCapacity);
        }
        if let Some(expected) = self.config.pool.capacity {
            if expected != pool_capacity {
                return Err(TrackerError::CapacityMismatch {
                    expected,
                    actual: pool_capacity,
                });
            }
        }

        for hook in self.required_hooks() {
            if let Err(source) = hooks.register(hook) {
                for done in self.registered.drain(..).rev() {
                    hooks.deregister(done);
                }
                return Err(TrackerError::HookRegistration { hook, source });
            }
            self.registered.push(hook);
        }

        self.history = SlotHistoryTable::new(pool_capacity);
        self.cache.reset();
        self.initialized = true;
        tracing::info!(
            "Boss tracker initialized: {} slots, {} composite families, role {:?}",
            pool_capacity,
            self.rule.families().len(),
            self.config.network.role
        );
        Ok(())
    }

    /// Releases hooks, subscriptions and history.
    ///
    /// Safe to call on a tracker that was never initialized.
    pub fn shutdown(&mut self, hooks: &mut dyn HookRegistrar) {
        for hook in self.registered.drain(..).rev() {
            hooks.deregister(hook);
        }
        self.bus.clear();
        self.history.rebuild(0);
        self.cache.reset();
        if std::mem::replace(&mut self.initialized, false) {
            tracing::info!("Boss tracker shut down");
        }
    }

    /// Number of countable boss units present.
    pub fn count(&self) -> usize {
        self.cache.count()
    }

    /// True when at least one boss is present.
    pub fn any_present(&self) -> bool {
        self.cache.any_present()
    }

    /// The cached aggregate.
    pub fn aggregate(&self) -> AggregateSnapshot {
        self.cache.snapshot()
    }

    /// Number of full re-scans the cache has performed.
    pub fn rescans(&self) -> u64 {
        self.cache.rescans()
    }

    /// Returns true between initialize and shutdown.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of slots the history table tracks.
    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    /// Read access to the slot history.
    pub fn history(&self) -> &SlotHistoryTable {
        &self.history
    }

    /// The classification rule in use.
    pub fn rule(&self) -> &BossRule {
        &self.rule
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Every active boss in the pool, in slot order.
    pub fn active_bosses<'a>(
        &'a self,
        pool: &'a PoolSnapshot,
    ) -> impl Iterator<Item = &'a EntitySlot> + 'a {
        pool.slots.iter().filter(move |s| self.rule.qualifies(s))
    }

    /// Derived state of a composite family, looked up by name.
    pub fn family_state(&self, pool: &PoolSnapshot, name: &str) -> Option<InstanceState> {
        let family = self.rule.families().iter().find(|f| f.name == name)?;
        Some(FamilyView::observe(pool, &self.history, family, None).state())
    }

    /// Forces a full re-scan, for hosts that change the pool outside hooks.
    pub fn refresh(&mut self, pool: &PoolSnapshot) -> Result<AggregateSnapshot, TrackerError> {
        self.ensure_initialized()?;
        self.sync_topology(pool);
        Ok(self.cache.invalidate(pool, &self.history, &self.rule))
    }

    /// Subscribes to a channel.
    pub fn subscribe<F>(&mut self, channel: Channel, handler: F) -> SubscriptionId
    where
        F: FnMut(&BossNotification) -> HandlerResult + Send + 'static,
    {
        self.bus.subscribe(channel, handler)
    }

    /// Unsubscribes from a channel. Returns false if not subscribed there.
    pub fn unsubscribe(&mut self, channel: Channel, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(channel, id)
    }

    /// Number of subscribers on a channel.
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.bus.subscriber_count(channel)
    }

    /// Entity-created hook. The pool already holds the new entity.
    pub fn on_entity_created(
        &mut self,
        pool: &PoolSnapshot,
        index: usize,
        source: SpawnSource,
    ) -> Result<(), TrackerError> {
        self.check_hook(Hook::EntityCreated, pool, Some(index))?;
        let mut pass = Pass {
            changed: self.sync_topology(pool),
            ..Pass::default()
        };

        self.history.set_pending(index, false);

        // The previous occupant left without a hook and before any reconcile.
        if self.history.is_counted(index) {
            let previous = self.remembered(index);
            self.release(pool, index, previous, Channel::Despawn, &mut pass);
        }

        let slot = pool.slots[index];
        self.history.observe_type(index, slot.type_id);

        if self.rule.qualifies(&slot) {
            match self.rule.family_of(slot.type_id).cloned() {
                None => {
                    self.history.mark_counted(&slot);
                    pass.changed = true;
                    pass.push(
                        BossNotification::new(Channel::Spawn, pool.tick, slot).with_source(source),
                    );
                }
                Some(family) => self.segment_created(pool, &family, slot, source, &mut pass),
            }
        }

        self.finish(pool, pass);
        Ok(())
    }

    /// Entity-eliminated hook. The pool still shows the entity.
    ///
    /// Ignored on clients, where eliminations are inferred from hits.
    pub fn on_entity_eliminated(
        &mut self,
        pool: &PoolSnapshot,
        index: usize,
    ) -> Result<(), TrackerError> {
        self.check_hook(Hook::EntityEliminated, pool, Some(index))?;
        let mut pass = Pass {
            changed: self.sync_topology(pool),
            ..Pass::default()
        };

        if self.config.network.role.is_authoritative() {
            self.eliminate(pool, index, &mut pass);
        } else {
            tracing::debug!("Ignoring elimination of slot {} on client", index);
        }

        self.finish(pool, pass);
        Ok(())
    }

    /// Entity-hit hook, registered on clients only.
    ///
    /// A hit that leaves a boss with no vitality counts as its elimination.
    pub fn on_entity_hit(&mut self, pool: &PoolSnapshot, index: usize) -> Result<(), TrackerError> {
        self.check_hook(Hook::EntityHit, pool, Some(index))?;
        let mut pass = Pass {
            changed: self.sync_topology(pool),
            ..Pass::default()
        };

        let slot = pool.slots[index];
        if slot.vitality <= 0 && self.rule.is_boss(&slot) {
            self.eliminate(pool, index, &mut pass);
        }

        self.finish(pool, pass);
        Ok(())
    }

    /// Post-tick hook: reconciles the history against the pool.
    pub fn on_post_tick(&mut self, pool: &PoolSnapshot) -> Result<(), TrackerError> {
        self.check_hook(Hook::PostTick, pool, None)?;
        self.reconcile_tick(pool);
        Ok(())
    }

    fn segment_created(
        &mut self,
        pool: &PoolSnapshot,
        family: &CompositeFamily,
        slot: EntitySlot,
        source: SpawnSource,
        pass: &mut Pass,
    ) {
        // Every counted segment of the previous instance vanished before a
        // reconcile could notice; close it out before the new one starts.
        let previous = FamilyView::observe(pool, &self.history, family, Some(slot.index));
        if previous.state() == InstanceState::Dissolving {
            let entity = self.remembered_or(pool, previous.counted[0]);
            for &index in &previous.counted {
                self.history.clear_counted(index);
            }
            pass.changed = true;
            pass.push(
                BossNotification::new(Channel::Despawn, pool.tick, entity)
                    .with_family(&family.name),
            );
        }

        // A new instance only when no other segment is live or counted.
        let others = FamilyView::observe(pool, &self.history, family, Some(slot.index));
        if others.state() == InstanceState::Absent {
            self.history.mark_counted(&slot);
            pass.changed = true;
            pass.push(
                BossNotification::new(Channel::Spawn, pool.tick, slot)
                    .with_family(&family.name)
                    .with_source(source),
            );
            return;
        }

        tracing::debug!(
            "Suppressed spawn of {} segment in slot {} ({:?})",
            family.name,
            slot.index,
            others.state()
        );
        match family.count_policy {
            CountPolicy::PerSegment => pass.changed |= self.history.mark_counted(&slot),
            // Segments already live but never counted: the boss was alive
            // before the tracker saw it, so count it without a Spawn.
            CountPolicy::Unit if others.counted.is_empty() => {
                let view = FamilyView::observe(pool, &self.history, family, None);
                if let Some(first) = view.representative() {
                    pass.changed |= self.history.mark_counted(&pool.slots[first]);
                }
            }
            CountPolicy::Unit => {}
        }
    }

    fn eliminate(&mut self, pool: &PoolSnapshot, index: usize, pass: &mut Pass) {
        let slot = pool.slots[index];
        if self.history.is_pending(index) || !self.rule.is_boss(&slot) {
            return;
        }
        self.history.set_pending(index, true);

        match self.rule.family_of(slot.type_id).cloned() {
            Some(family) => {
                let was_counted = self.history.clear_counted(index);
                pass.changed |= was_counted;
                let ended = BossNotification::new(Channel::Kill, pool.tick, slot);
                self.family_lost(pool, &family, index, was_counted, ended, pass);
            }
            None if self.history.clear_counted(index) => {
                pass.changed = true;
                pass.push(BossNotification::new(Channel::Kill, pool.tick, slot));
            }
            // Killed before a post-tick adopted it; a rescan may have seen it.
            None => pass.changed = true,
        }
    }

    /// Retires a counted slot whose occupant is gone.
    fn release(
        &mut self,
        pool: &PoolSnapshot,
        index: usize,
        entity: EntitySlot,
        channel: Channel,
        pass: &mut Pass,
    ) {
        let was_counted = self.history.clear_counted(index);
        pass.changed |= was_counted;

        match self.rule.family_of(entity.type_id).cloned() {
            Some(family) => {
                let ended = BossNotification::new(channel, pool.tick, entity);
                self.family_lost(pool, &family, index, was_counted, ended, pass);
            }
            None if was_counted => {
                pass.push(BossNotification::new(channel, pool.tick, entity));
            }
            None => {}
        }
    }

    /// Decides what losing one segment means for its family.
    ///
    /// The family ends (publishing `ended`) when no live segment is left;
    /// otherwise a unit family hands its counted flag to a survivor.
    fn family_lost(
        &mut self,
        pool: &PoolSnapshot,
        family: &CompositeFamily,
        index: usize,
        was_counted: bool,
        ended: BossNotification,
        pass: &mut Pass,
    ) {
        let view = FamilyView::observe(pool, &self.history, family, Some(index));
        match view.state() {
            InstanceState::Absent if was_counted => {
                pass.push(ended.with_family(&family.name));
            }
            InstanceState::Absent => pass.changed = true,
            InstanceState::Dissolving => {
                for stale in view.counted {
                    self.history.clear_counted(stale);
                }
                pass.changed = true;
                pass.push(ended.with_family(&family.name));
            }
            InstanceState::Forming if was_counted && family.count_policy == CountPolicy::Unit => {
                if let Some(next) = view.representative() {
                    self.history.mark_counted(&pool.slots[next]);
                    tracing::debug!(
                        "{} flag moved from slot {} to slot {}",
                        family.name,
                        index,
                        next
                    );
                }
            }
            _ => {}
        }
    }

    /// Brings the history in line with the pool after a tick.
    fn reconcile_tick(&mut self, pool: &PoolSnapshot) {
        let mut pass = Pass {
            changed: self.sync_topology(pool),
            ..Pass::default()
        };

        // Pending eliminations end once the host empties or reuses the slot.
        for slot in &pool.slots {
            let history = self.history.get(slot.index).copied().unwrap_or_default();
            if history.pending_elimination && (!slot.active || slot.type_id != history.type_id) {
                self.history.set_pending(slot.index, false);
            }
        }

        self.retire_plain(pool, &mut pass);
        for family in self.rule.families().to_vec() {
            self.reconcile_family(pool, &family, &mut pass);
        }
        self.adopt_plain(pool, &mut pass);

        self.finish(pool, pass);
    }

    /// Despawns counted plain bosses that are no longer in their slot.
    ///
    /// A slot whose boss changed type but still qualifies keeps its flag.
    fn retire_plain(&mut self, pool: &PoolSnapshot, pass: &mut Pass) {
        for slot in &pool.slots {
            let index = slot.index;
            let recorded = self.history.get(index).map(|h| h.type_id).unwrap_or_default();
            if !self.history.is_counted(index) || self.rule.family_of(recorded).is_some() {
                continue;
            }

            let still_here = slot.active
                && self.rule.is_boss(slot)
                && self.rule.family_of(slot.type_id).is_none();
            if still_here {
                if slot.type_id != recorded {
                    tracing::debug!(
                        "Slot {} reclassified from type {} to {}",
                        index,
                        recorded,
                        slot.type_id
                    );
                    self.history.mark_counted(slot);
                }
            } else {
                let entity = self.remembered_or(pool, index);
                self.history.clear_counted(index);
                pass.changed = true;
                pass.push(BossNotification::new(Channel::Despawn, pool.tick, entity));
            }
        }
    }

    /// Counts plain bosses that appeared without a created hook.
    fn adopt_plain(&mut self, pool: &PoolSnapshot, pass: &mut Pass) {
        for slot in &pool.slots {
            let index = slot.index;
            if self.rule.qualifies(slot)
                && self.rule.family_of(slot.type_id).is_none()
                && !self.history.is_counted(index)
                && !self.history.is_pending(index)
            {
                tracing::debug!("Adopting boss of type {} in slot {}", slot.type_id, index);
                self.history.mark_counted(slot);
                pass.changed = true;
            }
        }
    }

    fn reconcile_family(&mut self, pool: &PoolSnapshot, family: &CompositeFamily, pass: &mut Pass) {
        let view = FamilyView::observe(pool, &self.history, family, None);
        let stale = view.stale();

        if !stale.is_empty() {
            let entity = self.remembered_or(pool, stale[0]);
            for &index in &stale {
                self.history.clear_counted(index);
            }
            pass.changed = true;

            let after = FamilyView::observe(pool, &self.history, family, None);
            if after.state() == InstanceState::Absent {
                pass.push(
                    BossNotification::new(Channel::Despawn, pool.tick, entity)
                        .with_family(&family.name),
                );
            }
        }

        // Unit families keep exactly one counted segment while any is live;
        // per-segment families count every live segment.
        let view = FamilyView::observe(pool, &self.history, family, None);
        let adopt: Vec<usize> = match family.count_policy {
            CountPolicy::Unit if view.counted.is_empty() => {
                view.representative().into_iter().collect()
            }
            CountPolicy::Unit => Vec::new(),
            CountPolicy::PerSegment => view
                .live
                .iter()
                .copied()
                .filter(|i| !view.counted.contains(i))
                .collect(),
        };
        for index in adopt {
            tracing::debug!("{} counted via slot {}", family.name, index);
            self.history.mark_counted(&pool.slots[index]);
            pass.changed = true;
        }
    }

    /// Recomputes the cache if needed, then delivers the pass's notifications.
    fn finish(&mut self, pool: &PoolSnapshot, pass: Pass) {
        if pass.changed {
            self.cache.invalidate(pool, &self.history, &self.rule);
        }
        let aggregate = self.cache.snapshot();

        for mut notification in pass.notifications {
            notification.aggregate = aggregate;
            tracing::debug!(
                "{} boss type {} in slot {} at tick {} (count {})",
                notification.channel,
                notification.entity.type_id,
                notification.entity.index,
                notification.tick,
                aggregate.count
            );
            self.bus.publish(&notification, self.sink.as_ref());
        }
    }

    fn ensure_initialized(&self) -> Result<(), TrackerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TrackerError::NotInitialized)
        }
    }

    fn check_hook(
        &self,
        hook: Hook,
        pool: &PoolSnapshot,
        index: Option<usize>,
    ) -> Result<(), TrackerError> {
        self.ensure_initialized()?;
        if !self.registered.contains(&hook) {
            return Err(TrackerError::HookNotRegistered(hook));
        }
        match index {
            Some(index) if index >= pool.len() => Err(TrackerError::SlotOutOfRange {
                index,
                capacity: pool.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Rebuilds the history if the pool changed size. Returns true if it did.
    fn sync_topology(&mut self, pool: &PoolSnapshot) -> bool {
        if pool.len() == self.history.len() {
            return false;
        }
        let message = format!(
            "pool capacity changed from {} to {} at tick {}; slot history discarded",
            self.history.len(),
            pool.len(),
            pool.tick
        );
        tracing::info!("{}", message);
        self.sink.notice(&message);
        self.history.rebuild(pool.len());
        true
    }

    /// The entity the history remembers in a slot.
    fn remembered(&self, index: usize) -> EntitySlot {
        let history = self.history.get(index).copied().unwrap_or_default();
        EntitySlot {
            index,
            type_id: history.type_id,
            active: false,
            vitality: 0,
            boss: history.boss,
        }
    }

    /// The pool slot if it still holds the remembered type, else the memory.
    fn remembered_or(&self, pool: &PoolSnapshot, index: usize) -> EntitySlot {
        let remembered = self.remembered(index);
        match pool.slot(index) {
            Some(slot) if slot.type_id == remembered.type_id => *slot,
            _ => remembered,
        }
    }
}

impl std::fmt::Debug for BossTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BossTracker")
            .field("config", &self.config)
            .field("capacity", &self.history.len())
            .field("aggregate", &self.cache.snapshot())
            .field("bus", &self.bus)
            .field("registered", &self.registered)
            .field("initialized", &self.initialized)
            .finish()
    }
}
