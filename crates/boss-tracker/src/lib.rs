//! Boss tracker: presence counting and lifecycle notifications.
//!
//! The tracker sits next to a host simulation that owns a fixed-capacity
//! entity pool. It listens to the host's lifecycle hooks, remembers what each
//! slot held, and keeps a cached count of the bosses that are present.
//! Subscribers hear about every boss that spawns, is killed, or despawns
//! without being killed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   hooks + pool   ┌─────────────┐   Spawn/Kill/Despawn   ┌─────────────┐
//! │   host   │ ───────────────▶ │ BossTracker │ ─────────────────────▶ │ subscribers │
//! └──────────┘                  └─────────────┘                        └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML configuration for the pool, boss rule and network role
//! - [`classify`]: Which entities are bosses and which form composite families
//! - [`history`]: Per-slot memory of what was counted
//! - [`cache`]: Cached aggregate count
//! - [`composite`]: Derived state of multi-segment bosses
//! - [`bus`]: Spawn, Kill and Despawn channels
//! - [`hooks`]: Host hook registration
//! - [`sink`]: Reporting of recovered errors
//! - [`tracker`]: The tracker itself
//! - [`replay`]: Driving a tracker from a recorded hook trace

pub mod bus;
pub mod cache;
pub mod classify;
pub mod composite;
pub mod config;
pub mod history;
pub mod hooks;
pub mod replay;
pub mod sink;
pub mod tracker;

pub use bus::{EventBus, HandlerError, HandlerResult, SubscriptionId};
pub use cache::AggregateCache;
pub use classify::{BossRule, CompositeFamily, FamilyId, SegmentRole};
pub use composite::{FamilyView, InstanceState};
pub use config::{
    default_config_toml, CompositeFamilyConfig, ConfigError, CountPolicy, NetRole, NetworkConfig,
    PoolConfig, RuleConfig, TomlSerializeError, TrackerConfig,
};
pub use history::{SlotHistory, SlotHistoryTable};
pub use hooks::{Hook, HookError, HookRegistrar, HookSet};
pub use replay::{
    load_trace, NotificationLog, NotificationWriter, ReplayError, ReplayHost, ReplaySummary,
};
pub use sink::{ErrorSink, MemorySink, TracingSink};
pub use tracker::BossTracker;

use thiserror::Error;

/// Errors returned by tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Initialize called twice without a shutdown in between
    #[error("tracker is already initialized")]
    AlreadyInitialized,
    /// Hook delivered before initialize or after shutdown
    #[error("tracker is not initialized")]
    NotInitialized,
    /// Pool without slots
    #[error("pool capacity must be at least 1")]
    ZeroCapacity,
    /// Host pool differs from the configured capacity
    #[error("pool capacity {actual} does not match configured capacity {expected}")]
    CapacityMismatch { expected: usize, actual: usize },
    /// Host refused a hook the tracker needs
    #[error("failed to register the {hook} hook")]
    HookRegistration {
        hook: Hook,
        #[source]
        source: HookError,
    },
    /// Host delivered a hook the tracker never registered
    #[error("{0} hook delivered but not registered")]
    HookNotRegistered(Hook),
    /// Hook names a slot outside the pool
    #[error("slot {index} is outside the pool of {capacity} slots")]
    SlotOutOfRange { index: usize, capacity: usize },
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}
