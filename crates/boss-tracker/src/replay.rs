//! Trace replay.
//!
//! A [`ReplayHost`] plays the host's part for a recorded hook trace: it owns
//! the pool, applies each record to it, and delivers the hooks the tracker
//! registered. Notifications are collected in a [`NotificationLog`] and can be
//! written out as JSON Lines with a [`NotificationWriter`].

use boss_events::{BossNotification, Channel, PoolSnapshot, TraceRecord};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::hooks::{Hook, HookError, HookRegistrar, HookSet};
use crate::tracker::BossTracker;
use crate::TrackerError;

/// Errors that can occur while replaying a trace.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// IO error reading the trace or writing output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A trace line is not a valid record
    #[error("trace line {line}: {source}")]
    Trace {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    /// Error serializing a notification
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The tracker rejected a hook
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

/// Loads a JSONL trace from disk.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>, ReplayError> {
    let content = fs::read_to_string(path)?;
    TraceRecord::parse_all(&content).map_err(|(line, source)| ReplayError::Trace { line, source })
}

/// Collects every notification a tracker publishes. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    entries: Arc<Mutex<Vec<BossNotification>>>,
}

impl NotificationLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes the log to every channel of `tracker`.
    pub fn attach(&self, tracker: &mut BossTracker) {
        for &channel in Channel::all() {
            let entries = Arc::clone(&self.entries);
            tracker.subscribe(channel, move |notification| {
                entries
                    .lock()
                    .map_err(|_| "notification log poisoned")?
                    .push(notification.clone());
                Ok(())
            });
        }
    }

    /// Returns a copy of the collected notifications, in delivery order.
    pub fn entries(&self) -> Vec<BossNotification> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Number of collected notifications on one channel.
    pub fn count(&self, channel: Channel) -> usize {
        self.entries
            .lock()
            .map(|e| e.iter().filter(|n| n.channel == channel).count())
            .unwrap_or_default()
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    /// Records applied
    pub records: usize,
    /// Post-tick records seen
    pub ticks: u64,
    /// Hook records the tracker had not registered
    pub skipped: usize,
    pub spawns: usize,
    pub kills: usize,
    pub despawns: usize,
    /// Aggregate count after the last record
    pub final_count: usize,
    /// Full re-scans the cache performed
    pub rescans: u64,
    /// Every notification, in delivery order
    #[serde(skip)]
    pub notifications: Vec<BossNotification>,
}

/// Host stand-in that drives a tracker from trace records.
#[derive(Debug, Default)]
pub struct ReplayHost {
    pool: PoolSnapshot,
    hooks: HookSet,
    skipped: usize,
}

impl ReplayHost {
    /// Creates a host with an empty pool that offers every hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host that refuses the given hooks.
    pub fn without(hooks: &[Hook]) -> Self {
        Self {
            hooks: HookSet::without(hooks),
            ..Self::default()
        }
    }

    /// The pool as it stands after the last applied record.
    pub fn pool(&self) -> &PoolSnapshot {
        &self.pool
    }

    /// Hooks currently registered by the tracker.
    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    /// Applies one record to the pool and delivers its hook.
    pub fn apply(
        &mut self,
        tracker: &mut BossTracker,
        record: &TraceRecord,
    ) -> Result<(), ReplayError> {
        match record {
            TraceRecord::Initialize { capacity } => {
                self.pool = PoolSnapshot::empty(self.pool.tick, *capacity);
                tracker.initialize(*capacity, self)?;
            }
            TraceRecord::Created { slot, source } => {
                self.pool.place(*slot);
                if self.delivers(Hook::EntityCreated) {
                    tracker.on_entity_created(&self.pool, slot.index, *source)?;
                }
            }
            TraceRecord::Eliminated { slot } => {
                self.pool.place(*slot);
                if self.delivers(Hook::EntityEliminated) {
                    tracker.on_entity_eliminated(&self.pool, slot.index)?;
                }
            }
            TraceRecord::Hit { slot } => {
                self.pool.place(*slot);
                if self.delivers(Hook::EntityHit) {
                    tracker.on_entity_hit(&self.pool, slot.index)?;
                }
            }
            TraceRecord::Removed { index } => self.pool.clear(*index),
            TraceRecord::Resized { capacity } => {
                self.pool = PoolSnapshot::empty(self.pool.tick, *capacity);
            }
            TraceRecord::PostTick => {
                if self.delivers(Hook::PostTick) {
                    tracker.on_post_tick(&self.pool)?;
                }
                self.pool.tick += 1;
            }
        }
        Ok(())
    }

    /// Replays a whole trace and summarizes what the tracker published.
    pub fn run(
        &mut self,
        tracker: &mut BossTracker,
        records: &[TraceRecord],
    ) -> Result<ReplaySummary, ReplayError> {
        let log = NotificationLog::new();
        log.attach(tracker);
        let start_tick = self.pool.tick;

        for record in records {
            self.apply(tracker, record)?;
        }

        let notifications = log.entries();
        let summary = ReplaySummary {
            records: records.len(),
            ticks: self.pool.tick - start_tick,
            skipped: self.skipped,
            spawns: log.count(Channel::Spawn),
            kills: log.count(Channel::Kill),
            despawns: log.count(Channel::Despawn),
            final_count: tracker.count(),
            rescans: tracker.rescans(),
            notifications,
        };
        tracing::info!(
            "Replayed {} records over {} ticks: {} spawns, {} kills, {} despawns",
            summary.records,
            summary.ticks,
            summary.spawns,
            summary.kills,
            summary.despawns
        );
        Ok(summary)
    }

    fn delivers(&mut self, hook: Hook) -> bool {
        let registered = self.hooks.is_registered(hook);
        if !registered {
            self.skipped += 1;
            tracing::trace!("Host drops {} record, hook not registered", hook);
        }
        registered
    }
}

impl HookRegistrar for ReplayHost {
    fn register(&mut self, hook: Hook) -> Result<(), HookError> {
        self.hooks.register(hook)
    }

    fn deregister(&mut self, hook: Hook) {
        self.hooks.deregister(hook);
    }
}

/// Streams notifications as JSON Lines.
#[derive(Debug)]
pub struct NotificationWriter<W: Write> {
    writer: BufWriter<W>,
    written: u64,
}

impl NotificationWriter<File> {
    /// Creates (or truncates) a JSONL file, creating parent directories.
    pub fn create(path: &Path) -> Result<Self, ReplayError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> NotificationWriter<W> {
    /// Wraps any writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    /// Writes one notification as a single line.
    pub fn write(&mut self, notification: &BossNotification) -> Result<(), ReplayError> {
        let line = notification.to_jsonl()?;
        writeln!(self.writer, "{}", line)?;
        self.written += 1;
        Ok(())
    }

    /// Writes every notification in order.
    pub fn write_all(&mut self, notifications: &[BossNotification]) -> Result<(), ReplayError> {
        notifications.iter().try_for_each(|n| self.write(n))
    }

    /// Flushes buffered output.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of notifications written.
    pub fn written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetRole, TrackerConfig};
    use crate::sink::MemorySink;
    use boss_events::fixtures::{boss, dying, sample_config_toml, sample_trace};
    use boss_events::SpawnSource;
    use tempfile::tempdir;

    fn sample_tracker() -> BossTracker {
        let config = TrackerConfig::from_str(sample_config_toml()).unwrap();
        BossTracker::with_sink(config, Box::new(MemorySink::new()))
    }

    #[test]
    fn test_sample_trace_replay() {
        let mut tracker = sample_tracker();
        let mut host = ReplayHost::new();

        let summary = host.run(&mut tracker, &sample_trace()).unwrap();

        assert_eq!(summary.spawns, 3);
        assert_eq!(summary.kills, 2);
        assert_eq!(summary.despawns, 1);
        assert_eq!(summary.final_count, 0);
        assert_eq!(summary.ticks, 8);
        assert_eq!(summary.skipped, 0);

        let channels: Vec<Channel> = summary.notifications.iter().map(|n| n.channel).collect();
        assert_eq!(
            channels,
            vec![
                Channel::Spawn,
                Channel::Kill,
                Channel::Spawn,
                Channel::Kill,
                Channel::Spawn,
                Channel::Despawn,
            ]
        );
    }

    #[test]
    fn test_replay_carries_source_and_family() {
        let mut tracker = sample_tracker();
        let summary = ReplayHost::new().run(&mut tracker, &sample_trace()).unwrap();

        let first = &summary.notifications[0];
        assert_eq!(first.source, Some(SpawnSource::Summoned));
        assert_eq!(first.aggregate.count, 1);

        let eater_spawn = &summary.notifications[2];
        assert_eq!(eater_spawn.family.as_deref(), Some("eater_of_worlds"));
        assert_eq!(eater_spawn.entity.index, 6);
    }

    #[test]
    fn test_hooks_released_on_shutdown() {
        let mut tracker = sample_tracker();
        let mut host = ReplayHost::new();
        host.apply(&mut tracker, &TraceRecord::Initialize { capacity: 10 })
            .unwrap();
        assert!(host.hooks().is_registered(Hook::PostTick));
        assert!(!host.hooks().is_registered(Hook::EntityHit));

        tracker.shutdown(&mut host);
        assert!(host.hooks().is_empty());
    }

    #[test]
    fn test_unregistered_hooks_are_skipped() {
        let mut tracker = sample_tracker();
        let mut host = ReplayHost::new();
        let records = vec![
            TraceRecord::Initialize { capacity: 10 },
            TraceRecord::Hit {
                slot: dying(boss(2, 4)),
            },
            TraceRecord::PostTick,
        ];

        let summary = host.run(&mut tracker, &records).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(host.pool().slots[2].vitality, 0);
    }

    #[test]
    fn test_client_role_uses_hits() {
        let mut config = TrackerConfig::from_str(sample_config_toml()).unwrap();
        config.network.role = NetRole::Client;
        let mut tracker = BossTracker::with_sink(config, Box::new(MemorySink::new()));
        let mut host = ReplayHost::new();
        let records = vec![
            TraceRecord::Initialize { capacity: 10 },
            TraceRecord::Created {
                slot: boss(2, 4),
                source: SpawnSource::Natural,
            },
            TraceRecord::Eliminated {
                slot: dying(boss(2, 4)),
            },
            TraceRecord::Hit {
                slot: dying(boss(2, 4)),
            },
            TraceRecord::PostTick,
        ];

        let summary = host.run(&mut tracker, &records).unwrap();

        assert_eq!(summary.spawns, 1);
        assert_eq!(summary.kills, 1);
        assert_eq!(summary.final_count, 0);
    }

    #[test]
    fn test_refused_hook_fails_initialize() {
        let mut tracker = sample_tracker();
        let mut host = ReplayHost::without(&[Hook::PostTick]);

        let err = host
            .apply(&mut tracker, &TraceRecord::Initialize { capacity: 10 })
            .unwrap_err();

        assert!(matches!(
            err,
            ReplayError::Tracker(TrackerError::HookRegistration {
                hook: Hook::PostTick,
                ..
            })
        ));
        assert!(host.hooks().is_empty());
    }

    #[test]
    fn test_hook_before_initialize_is_skipped() {
        let mut tracker = sample_tracker();
        let mut host = ReplayHost::new();

        host.apply(&mut tracker, &TraceRecord::PostTick).unwrap();

        assert!(!tracker.is_initialized());
        assert_eq!(host.pool().tick, 1);
    }

    #[test]
    fn test_load_trace_reports_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        fs::write(&path, "{\"hook\":\"post_tick\"}\n\n{\"hook\":\"exploded\"}\n").unwrap();

        let err = load_trace(&path).unwrap_err();
        assert!(matches!(err, ReplayError::Trace { line: 3, .. }));
    }

    #[test]
    fn test_notification_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("notifications.jsonl");

        let mut tracker = sample_tracker();
        let summary = ReplayHost::new().run(&mut tracker, &sample_trace()).unwrap();

        let mut writer = NotificationWriter::create(&path).unwrap();
        writer.write_all(&summary.notifications).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 6);

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<BossNotification> = content
            .lines()
            .map(|l| BossNotification::from_jsonl(l).unwrap())
            .collect();
        assert_eq!(parsed, summary.notifications);
    }
}
