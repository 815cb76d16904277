//! Command-line overrides for settings loaded from `config.ron`.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, DisplayMode, StarfieldStrategy};

/// Redshift command-line arguments.
///
/// Anything left unset keeps the value from the config file.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "redshift", about = "Relativistic render compositor")]
pub struct CliArgs {
    /// Output width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// View mode on the first frame.
    #[arg(long, value_enum)]
    pub mode: Option<DisplayMode>,

    /// Background starfield strategy.
    #[arg(long, value_enum)]
    pub strategy: Option<StarfieldStrategy>,

    /// Skip the GPU warp stage and use the CPU reference stage.
    #[arg(long)]
    pub cpu_warp: bool,

    /// Starfield seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w.max(1);
        }
        if let Some(h) = args.height {
            self.window.height = h.max(1);
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(mode) = args.mode {
            self.relativity.start_mode = mode;
        }
        if let Some(strategy) = args.strategy {
            self.starfield.strategy = strategy;
        }
        if args.cpu_warp {
            self.render.gpu_warp = false;
        }
        if let Some(seed) = args.seed {
            self.starfield.seed = seed;
        }
    }
}
