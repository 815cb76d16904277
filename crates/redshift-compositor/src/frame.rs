//! What goes into a frame and what comes back out.

use glam::Vec3;
use redshift_relativity::{VelocityIssue, ViewMode};
use redshift_render::Raster;

use crate::hud::HudReadout;
use crate::phase::FramePhase;

/// Camera orientation supplied by the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub forward: Vec3,
    pub up: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
        }
    }
}

/// Per-frame input from the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTelemetry {
    pub camera: CameraPose,
    /// Ship velocity as a fraction of c. `None` keeps what the host last set.
    pub boost: Option<Vec3>,
    /// Lensing strength, forwarded to the background untouched.
    pub gr_intensity: f32,
    /// Wall time since the previous frame, for the HUD frame-rate readout.
    pub dt_seconds: f32,
}

impl Default for FrameTelemetry {
    fn default() -> Self {
        Self {
            camera: CameraPose::default(),
            boost: None,
            gr_intensity: 0.0,
            dt_seconds: 1.0 / 60.0,
        }
    }
}

/// Output of the external scene rasterizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ForegroundFrame {
    /// Straight-alpha RGBA; transparent where the background should show.
    pub image: Raster,
    /// Camera the image was rendered with. Overrides the telemetry pose.
    pub forward: Vec3,
    pub up: Vec3,
}

impl ForegroundFrame {
    pub fn new(image: Raster, camera: CameraPose) -> Self {
        Self {
            image,
            forward: camera.forward,
            up: camera.up,
        }
    }

    pub fn camera(&self) -> CameraPose {
        CameraPose {
            forward: self.forward,
            up: self.up,
        }
    }
}

/// Why the warp pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The host switched the effect off.
    Disabled,
    /// No usable warp stage.
    Unavailable,
    /// Effective speed at or below the activation threshold.
    BelowThreshold,
    /// Input did not match the buffer size; buffers are reallocated next frame.
    SizeMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShaderOutcome {
    Applied { stage: &'static str },
    Skipped(SkipReason),
    /// The stage was tried and failed; the frame was presented unwarped.
    Failed { stage: &'static str, error: String },
}

impl ShaderOutcome {
    pub fn warped(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub phases: Vec<FramePhase>,
    pub outcome: ShaderOutcome,
    pub mode: ViewMode,
    /// Latched speed after the ceiling clamp.
    pub beta: f32,
    /// Speed the transform actually used, after the mode's damping.
    pub effective_beta: f32,
    pub gamma: f32,
    pub velocity_issue: Option<VelocityIssue>,
    /// The HUD readout drawn this frame, if the HUD is shown.
    pub hud: Option<HudReadout>,
}
