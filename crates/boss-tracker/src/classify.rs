//! Boss classification.
//!
//! Decides from an entity's attributes alone whether it is a tracked boss,
//! and whether it is a segment of a known composite family.

use boss_events::EntitySlot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{CompositeFamilyConfig, CountPolicy, RuleConfig};

/// Position of a composite family in the rule's family list.
pub type FamilyId = usize;

/// Role of an entity within a composite family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRole {
    /// Not part of any composite family
    #[default]
    None,
    /// Leading segment
    Head,
    /// Interior segment
    Body,
    /// Trailing segment
    Tail,
}

impl SegmentRole {
    /// Returns true for head, body and tail.
    pub fn is_segment(self) -> bool {
        !matches!(self, SegmentRole::None)
    }
}

/// A composite family resolved from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeFamily {
    /// Index into the rule's family list
    pub id: FamilyId,
    /// Family name
    pub name: String,
    /// Head type id
    pub first_type_id: i32,
    /// Tail type id
    pub last_type_id: i32,
    /// Count contribution policy
    pub count_policy: CountPolicy,
}

impl CompositeFamily {
    fn from_config(id: FamilyId, config: &CompositeFamilyConfig) -> Self {
        Self {
            id,
            name: config.name.clone(),
            first_type_id: config.first_type_id,
            last_type_id: config.last_type_id,
            count_policy: config.count_policy,
        }
    }

    /// Checks if a type id falls in this family's range.
    pub fn contains(&self, type_id: i32) -> bool {
        (self.first_type_id..=self.last_type_id).contains(&type_id)
    }

    /// Role of a type id within this family.
    pub fn role_of(&self, type_id: i32) -> SegmentRole {
        if !self.contains(type_id) {
            SegmentRole::None
        } else if type_id == self.first_type_id {
            SegmentRole::Head
        } else if type_id == self.last_type_id {
            SegmentRole::Tail
        } else {
            SegmentRole::Body
        }
    }
}

/// The boss classification rule.
#[derive(Debug, Clone, Default)]
pub struct BossRule {
    /// Type ids that always count as bosses
    boss_types: HashSet<i32>,
    /// Known composite families
    families: Vec<CompositeFamily>,
}

impl BossRule {
    /// Builds the rule from config.
    pub fn from_config(config: &RuleConfig) -> Self {
        Self {
            boss_types: config.boss_types.iter().copied().collect(),
            families: config
                .composite
                .iter()
                .enumerate()
                .map(|(id, f)| CompositeFamily::from_config(id, f))
                .collect(),
        }
    }

    /// Checks whether an entity qualifies as a boss.
    ///
    /// True for the explicit boss attribute, an allow-listed type id, or
    /// membership in a composite family. Ignores the active flag.
    pub fn is_boss(&self, entity: &EntitySlot) -> bool {
        entity.boss
            || self.boss_types.contains(&entity.type_id)
            || self.family_of(entity.type_id).is_some()
    }

    /// Checks whether a slot holds a live boss.
    pub fn qualifies(&self, entity: &EntitySlot) -> bool {
        entity.active && self.is_boss(entity)
    }

    /// Classifies an entity's composite segment role.
    pub fn segment_role(&self, entity: &EntitySlot) -> SegmentRole {
        self.family_of(entity.type_id)
            .map(|f| f.role_of(entity.type_id))
            .unwrap_or_default()
    }

    /// Finds the composite family a type id belongs to.
    pub fn family_of(&self, type_id: i32) -> Option<&CompositeFamily> {
        self.families.iter().find(|f| f.contains(type_id))
    }

    /// Gets a family by id.
    pub fn family(&self, id: FamilyId) -> Option<&CompositeFamily> {
        self.families.get(id)
    }

    /// All known composite families.
    pub fn families(&self) -> &[CompositeFamily] {
        &self.families
    }
}
