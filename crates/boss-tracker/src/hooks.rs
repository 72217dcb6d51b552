//! Host hook registration.
//!
//! The host simulation owns the hook points. The tracker asks it to deliver
//! the ones it needs at initialization and releases them at shutdown.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Lifecycle hook points offered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// An entity was written into a slot
    EntityCreated,
    /// An entity was eliminated; it is still visible in the pool
    EntityEliminated,
    /// An entity took a hit
    EntityHit,
    /// All entities of the tick have been updated
    PostTick,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::EntityCreated => write!(f, "entity_created"),
            Hook::EntityEliminated => write!(f, "entity_eliminated"),
            Hook::EntityHit => write!(f, "entity_hit"),
            Hook::PostTick => write!(f, "post_tick"),
        }
    }
}

/// Errors a host can return when asked to deliver a hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// Host has no such hook point
    #[error("host does not offer the {0} hook")]
    Unsupported(Hook),
    /// Hook already delivered to another handler
    #[error("{0} hook is already registered")]
    AlreadyRegistered(Hook),
}

/// Host side of hook registration.
pub trait HookRegistrar {
    /// Starts delivering `hook` to the tracker.
    fn register(&mut self, hook: Hook) -> Result<(), HookError>;

    /// Stops delivering `hook`. Unknown hooks are ignored.
    fn deregister(&mut self, hook: Hook);
}

/// In-process registrar that remembers which hooks are live.
#[derive(Debug, Clone, Default)]
pub struct HookSet {
    registered: HashSet<Hook>,
    unsupported: HashSet<Hook>,
}

impl HookSet {
    /// Creates a registrar that offers every hook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registrar that refuses the given hooks.
    pub fn without(hooks: &[Hook]) -> Self {
        Self {
            registered: HashSet::new(),
            unsupported: hooks.iter().copied().collect(),
        }
    }

    /// Checks if a hook is currently registered.
    pub fn is_registered(&self, hook: Hook) -> bool {
        self.registered.contains(&hook)
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl HookRegistrar for HookSet {
    fn register(&mut self, hook: Hook) -> Result<(), HookError> {
        if self.unsupported.contains(&hook) {
            return Err(HookError::Unsupported(hook));
        }
        if !self.registered.insert(hook) {
            return Err(HookError::AlreadyRegistered(hook));
        }
        Ok(())
    }

    fn deregister(&mut self, hook: Hook) {
        self.registered.remove(&hook);
    }
}
