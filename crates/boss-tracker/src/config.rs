//! Configuration loading for the tracker.
//!
//! All tracker settings are loaded from a TOML configuration file. Every
//! section is optional and falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Complete tracker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Pool settings
    #[serde(default)]
    pub pool: PoolConfig,
    /// Boss classification settings
    #[serde(default)]
    pub rule: RuleConfig,
    /// Network role settings
    #[serde(default)]
    pub network: NetworkConfig,
}

impl TrackerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, TomlSerializeError> {
        toml::to_string_pretty(self).map_err(TomlSerializeError)
    }

    /// Checks composite family ranges.
    ///
    /// Ranges must not be inverted and must not overlap each other, since a
    /// type id can only belong to one family.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let families = &self.rule.composite;
        for family in families {
            if family.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "composite family with an empty name".to_string(),
                ));
            }
            if family.first_type_id > family.last_type_id {
                return Err(ConfigError::Invalid(format!(
                    "composite family '{}' has first_type_id {} after last_type_id {}",
                    family.name, family.first_type_id, family.last_type_id
                )));
            }
        }

        for (i, a) in families.iter().enumerate() {
            for b in &families[i + 1..] {
                if a.first_type_id <= b.last_type_id && b.first_type_id <= a.last_type_id {
                    return Err(ConfigError::Invalid(format!(
                        "composite families '{}' and '{}' overlap",
                        a.name, b.name
                    )));
                }
            }
        }

        if self.pool.capacity == Some(0) {
            return Err(ConfigError::Invalid("pool capacity must be positive".to_string()));
        }

        Ok(())
    }
}

/// Pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Expected pool capacity; `initialize` fails when the host disagrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Boss classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Type ids that count as bosses without the explicit attribute
    pub boss_types: Vec<i32>,
    /// Multi-segment families counted as one unit
    pub composite: Vec<CompositeFamilyConfig>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            boss_types: Vec::new(),
            composite: vec![CompositeFamilyConfig {
                name: "eater_of_worlds".to_string(),
                first_type_id: 13,
                last_type_id: 15,
                count_policy: CountPolicy::Unit,
            }],
        }
    }
}

/// A multi-segment family, identified by a contiguous type-id range.
///
/// The first id is the head segment, the last id the tail, anything in
/// between a body segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeFamilyConfig {
    /// Family name reported in notifications
    pub name: String,
    /// Type id of the head segment
    pub first_type_id: i32,
    /// Type id of the tail segment
    pub last_type_id: i32,
    /// How live segments contribute to the count
    #[serde(default)]
    pub count_policy: CountPolicy,
}

/// How a composite family contributes to the boss count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// The whole family counts once while any segment lives
    #[default]
    Unit,
    /// Every live segment counts
    PerSegment,
}

/// Network role settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Which side of the host session this tracker runs on
    pub role: NetRole,
}

/// Role of the host process.
///
/// Clients never receive an authoritative elimination; they detect kills
/// from lethal hits instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetRole {
    /// Local game, authoritative
    #[default]
    SinglePlayer,
    /// Dedicated or hosting server, authoritative
    Server,
    /// Remote client, kills inferred from hits
    Client,
}

impl NetRole {
    /// Returns true if elimination hooks are authoritative for this role.
    pub fn is_authoritative(self) -> bool {
        !matches!(self, NetRole::Client)
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error parsing TOML config
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Config parsed but is inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Error that can occur during TOML serialization.
#[derive(Debug, Error)]
#[error("TOML serialize error: {0}")]
pub struct TomlSerializeError(#[source] pub toml::ser::Error);

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Boss Tracker Configuration

[pool]
# capacity = 200

[rule]
boss_types = []

[[rule.composite]]
name = "eater_of_worlds"
first_type_id = 13
last_type_id = 15
count_policy = "unit"

[network]
role = "single_player"
"#
    .to_string()
}
