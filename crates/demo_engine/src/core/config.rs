//! # Unified Configuration System
//!
//! Configuration structures for the rendering core. Every structure here
//! implements [`Config`], so it can be loaded from or saved to TOML and RON
//! files.
//!
//! ## Configuration Categories
//!
//! - **Render Queue Config**: Capacity policy, tie ordering and state
//!   elimination for the per-frame render queue
//! - **Engine Config**: Logging and allocator budgets

use serde::{Serialize, Deserialize};

// File support lives in the top-level config module
pub use crate::config::{Config, ConfigError, ConfigFormat};

/// Default upper bound on the number of state layers per render item
///
/// Matches the global → instance → model → material → mesh hierarchy with
/// room for a few extra passes.
pub const DEFAULT_MAX_STATE_LAYERS: usize = 8;

/// How items with equal sort keys are ordered during a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortPolicy {
    /// Equal keys keep their submission order
    #[default]
    Stable,
    /// Equal keys end up in whatever order the sort produces
    Unstable,
}

/// # Render Queue Configuration
///
/// Controls how the render queue stores submissions and how aggressively
/// it removes redundant state commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderQueueConfig {
    /// Items reserved up front; storage grows by 1.5x beyond this
    pub initial_item_capacity: usize,
    /// Maximum number of state layers a single item may reference
    pub max_state_layers: usize,
    /// Slot capacity of freshly created flattened output buffers
    pub initial_output_capacity: usize,
    /// Tie-break for equal sort keys
    pub sort_policy: SortPolicy,
    /// Drop state commands that a later layer of the same item overrides
    pub eliminate_shadowed_state: bool,
}

impl RenderQueueConfig {
    /// Create a render queue configuration with default values
    pub fn new() -> Self {
        Self {
            initial_item_capacity: 256,
            max_state_layers: DEFAULT_MAX_STATE_LAYERS,
            initial_output_capacity: 1024,
            sort_policy: SortPolicy::Stable,
            eliminate_shadowed_state: true,
        }
    }

    /// Set the initial item capacity
    pub fn with_initial_item_capacity(mut self, capacity: usize) -> Self {
        self.initial_item_capacity = capacity;
        self
    }

    /// Set the maximum state stack depth
    pub fn with_max_state_layers(mut self, layers: usize) -> Self {
        self.max_state_layers = layers;
        self
    }

    /// Set the tie-break policy for equal keys
    pub fn with_sort_policy(mut self, policy: SortPolicy) -> Self {
        self.sort_policy = policy;
        self
    }

    /// Enable or disable shadowed state elimination
    pub fn with_shadowed_state_elimination(mut self, enabled: bool) -> Self {
        self.eliminate_shadowed_state = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_state_layers == 0 {
            return Err(ConfigError::Invalid(
                "max_state_layers must be at least 1".to_string(),
            ));
        }

        if self.max_state_layers > u8::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "max_state_layers must not exceed {}",
                u8::MAX
            )));
        }

        Ok(())
    }
}

impl Default for RenderQueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for RenderQueueConfig {}

/// # Engine Configuration
///
/// Core engine behavior configuration: logging and the memory budgets of
/// the command allocators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Size in bytes of the arena used for static command buffers
    pub arena_size: usize,
    /// Render queue settings
    pub queue: RenderQueueConfig,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            arena_size: 1 << 20,
            queue: RenderQueueConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the arena budget in bytes
    pub fn with_arena_size(mut self, bytes: usize) -> Self {
        self.arena_size = bytes;
        self
    }

    /// Set render queue configuration
    pub fn with_queue(mut self, queue: RenderQueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena_size == 0 {
            return Err(ConfigError::Invalid("arena_size must be non-zero".to_string()));
        }
        self.queue.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for EngineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queue_config_is_valid() {
        let config = RenderQueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_state_layers, DEFAULT_MAX_STATE_LAYERS);
        assert_eq!(config.sort_policy, SortPolicy::Stable);
    }

    #[test]
    fn test_zero_state_layers_rejected() {
        let config = RenderQueueConfig::default().with_max_state_layers(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            log_level = "debug"

            [queue]
            sort_policy = "Unstable"
            max_state_layers = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.arena_size, 1 << 20);
        assert_eq!(config.queue.sort_policy, SortPolicy::Unstable);
        assert_eq!(config.queue.max_state_layers, 5);
        assert!(config.queue.eliminate_shadowed_state);
    }

    #[test]
    fn test_ron_config_parses() {
        let config = RenderQueueConfig::from_ron_str(
            "(max_state_layers: 4, eliminate_shadowed_state: false)",
        )
        .unwrap();

        assert_eq!(config.max_state_layers, 4);
        assert!(!config.eliminate_shadowed_state);
        assert_eq!(config.initial_item_capacity, 256);
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "demo_engine_config_{}.toml",
            std::process::id()
        ));
        let path = path.to_string_lossy().into_owned();

        let config = EngineConfig::new()
            .with_log_level("trace")
            .with_arena_size(4096);
        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = EngineConfig::load_from_file("engine.yaml");
        assert!(result.is_err());
    }
}
