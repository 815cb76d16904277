//! Configuration system for the relativistic renderer.
//!
//! Settings persist to disk as RON files and can be overridden from the command line
//! via clap. Unknown fields are ignored and missing fields fall back to defaults, so
//! older config files keep loading as new settings are added.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CompensationConfig, Config, DebugConfig, DisplayMode, RelativityConfig, RenderConfig,
    StarfieldConfig, StarfieldStrategy, WindowConfig, default_config_dir,
};
pub use error::ConfigError;
