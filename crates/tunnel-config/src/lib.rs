//! Configuration loading, overrides and validation for quick-tunnel.
//!
//! Settings are layered in this order, later layers winning:
//! built-in defaults, an optional config file (json/jsonc/yaml/toml),
//! the `LISTEN` environment variable, then command-line overrides.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{
    ConfigError, apply_env, apply_env_from, load_config, load_or_default, normalize_listen,
};
pub use types::*;
pub use validate::validate_config;
