//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use crate::core::config::EngineConfig;

/// Initialize the logging system with the `info` level
///
/// `RUST_LOG` takes precedence when set.
pub fn init() {
    init_with_level("info");
}

/// Initialize the logging system from the engine configuration
pub fn init_from_config(config: &EngineConfig) {
    init_with_level(&config.log_level);
}

/// Initialize the logging system with a default filter
///
/// `level` uses the `env_logger` filter syntax (e.g. `"debug"` or
/// `"demo_engine::render=trace"`). Calling this more than once is harmless;
/// only the first call installs a logger.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::debug!("Logging initialized (default filter: {})", level);
    }
}
