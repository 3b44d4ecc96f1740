//! Configuration for the Lectern session and cache core.
//!
//! Provides TOML-based configuration with:
//! - `[session]`, `[cache]`, `[tier2]` and `[logging]` sections, each optional
//! - Config file layering (user config dir + project-local overrides)
//! - Implementations of the `lectern-types` capability traits, so each
//!   component reads only the section it needs

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
