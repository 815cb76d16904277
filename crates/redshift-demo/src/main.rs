//! Headless demo: fly a scripted acceleration past a ringed planet and write
//! the composited frames as PNG files.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p redshift-demo -- --frames 90 --beta 0.95 --cpu-warp`.

mod flight;

use std::path::PathBuf;

use clap::Parser;
use redshift_compositor::{FrameTelemetry, RelativisticCompositor};
use redshift_config::{CliArgs, Config, default_config_dir};
use redshift_relativity::ViewMode;
use tracing::{error, info, warn};

use crate::flight::{FlightScript, planet_foreground, save_png};

#[derive(Parser, Debug)]
#[command(name = "redshift-demo", about = "Render a scripted relativistic flyby")]
struct DemoArgs {
    #[command(flatten)]
    cli: CliArgs,

    /// Number of frames to render.
    #[arg(long, default_value_t = 120)]
    frames: u32,

    /// Top speed reached at the end of the script, as a fraction of c.
    #[arg(long, default_value_t = 0.9)]
    beta: f32,

    /// Directory the PNG frames are written to.
    #[arg(long, default_value = "frames")]
    output: PathBuf,

    /// Write every Nth frame.
    #[arg(long, default_value_t = 10)]
    save_every: u32,

    /// Switch to the other view mode halfway through.
    #[arg(long)]
    toggle_mode: bool,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Png {
        path: PathBuf,
        source: image::ImageError,
    },
}

fn main() {
    let args = DemoArgs::parse();

    let config_dir = args.cli.config.clone().or_else(|| {
        default_config_dir()
            .map_err(|e| eprintln!("No config directory ({e}), using defaults"))
            .ok()
    });
    let mut config = match &config_dir {
        Some(dir) => Config::load_or_create(dir).unwrap_or_else(|e| {
            eprintln!("Failed to load config: {e}, using defaults");
            Config::default()
        }),
        None => Config::default(),
    };
    config.apply_cli_overrides(&args.cli);
    let config = config.validated();

    let log_dir = config_dir.as_ref().map(|dir| dir.join("logs"));
    redshift_log::init_logging(log_dir.as_deref(), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(&args, &config) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &DemoArgs, config: &Config) -> Result<(), DemoError> {
    std::fs::create_dir_all(&args.output).map_err(|source| DemoError::OutputDir {
        path: args.output.clone(),
        source,
    })?;

    let mut compositor = RelativisticCompositor::from_config(config);
    let (width, height) = compositor.dimensions();
    info!(
        "Rendering {} frames at {width}x{height} with the `{}` warp stage",
        args.frames,
        compositor.stage_label()
    );

    let script = FlightScript {
        frames: args.frames,
        max_beta: args.beta,
    };
    let fov_y = config.render.fov_y_degrees.to_radians();
    let save_every = args.save_every.max(1);
    let mut warped = 0u32;

    for frame in 0..args.frames {
        let sample = script.sample(frame);
        compositor.set_forward_velocity(sample.beta);
        compositor.set_view_angle(sample.heading_angle);
        if args.toggle_mode && frame == args.frames / 2 {
            let next = compositor.mode().toggled();
            compositor.set_mode(next);
        }

        let foreground = planet_foreground(sample.camera, fov_y, width, height);
        let telemetry = FrameTelemetry {
            camera: sample.camera,
            ..FrameTelemetry::default()
        };
        let report = compositor.render_frame(&telemetry, Some(&foreground));
        if report.outcome.warped() {
            warped += 1;
        }

        let last = frame + 1 == args.frames;
        if frame % save_every == 0 || last {
            let path = args.output.join(format!("frame_{frame:04}.png"));
            save_png(compositor.output(), &path).map_err(|source| DemoError::Png {
                path: path.clone(),
                source,
            })?;
            info!(
                "frame {frame:4}: beta={:.3} gamma={:.3} mode={} -> {}",
                report.beta,
                report.gamma,
                report.mode.label(),
                path.display()
            );
        }
    }

    if warped == 0 && args.beta > config.relativity.activation_threshold {
        warn!("No frame was warped; the warp stage was unavailable for the whole run");
    }
    info!(
        "Done: {warped}/{} frames warped, final mode {}",
        args.frames,
        match compositor.mode() {
            ViewMode::Raw => "raw",
            ViewMode::Compensated => "compensated",
        }
    );
    Ok(())
}
