//! The relativistic render compositor.
//!
//! Owns the velocity and view state, the layer stack and the warp stage, and
//! sequences them through [`FramePhase`]. No error leaves this type: a frame
//! that cannot be warped is presented unwarped and reported in [`FrameReport`].

use std::mem::discriminant;

use glam::{Quat, Vec3};
use redshift_config::Config;
use redshift_relativity::{
    RelativisticTransform, ShaderParameters, TransformSettings, VelocityIssue, VelocityState,
    ViewMode, ViewState,
};
use redshift_render::{Raster, ViewCamera, WarpError, WarpStage, preferred_warp_stage};
use redshift_space::BackgroundLayer;

use crate::frame::{
    CameraPose, ForegroundFrame, FrameReport, FrameTelemetry, ShaderOutcome, SkipReason,
};
use crate::hud::{FrameRateEma, HudReadout, hud_commands};
use crate::phase::{FramePhase, PhaseLog};
use crate::stack::{BACKGROUND_LAYER, FOREGROUND_LAYER, FrameBufferStack, HUD_LAYER};

/// Motion as the host last described it. Resolved against the camera at latch time.
#[derive(Debug, Clone, Copy, PartialEq)]
enum MotionRequest {
    /// Speed along the camera forward, turned `angle` radians about camera up.
    Heading { beta: f32, angle: f32 },
    /// World-frame boost vector; length is the speed fraction.
    Boost(Vec3),
}

pub struct RelativisticCompositor {
    settings: TransformSettings,
    ceiling: f32,
    activation_threshold: f32,
    fov_y: f32,
    show_hud: bool,
    enabled: bool,

    stage: Box<dyn WarpStage>,
    stage_failing: bool,
    background: BackgroundLayer,
    stack: FrameBufferStack,
    pending_resize: Option<(u32, u32)>,

    // Host input, applied at the next latch.
    motion: MotionRequest,
    requested: VelocityState,
    requested_mode: ViewMode,
    last_issue: Option<VelocityIssue>,

    // Latched for the frame in progress.
    pose: CameraPose,
    velocity: VelocityState,
    view: ViewState,

    frame_rate: FrameRateEma,
    frame_index: u64,
}

impl RelativisticCompositor {
    /// Build the background from config and pick the warp stage for this host.
    pub fn from_config(config: &Config) -> Self {
        let settings = TransformSettings::from(&config.relativity);
        let background = BackgroundLayer::from_config(&config.starfield, settings);
        let stage = preferred_warp_stage(config.render.gpu_warp);
        Self::new(config, stage, background)
    }

    /// Take ownership of `stage` and size everything to the configured output.
    ///
    /// A stage that fails to initialise is reported here, once; later frames
    /// quietly go out unwarped.
    pub fn new(config: &Config, mut stage: Box<dyn WarpStage>, background: BackgroundLayer) -> Self {
        let config = config.clone().validated();
        let (width, height) = (config.window.width.max(1), config.window.height.max(1));

        stage.set_environment(background.warp_environment());
        match stage.init(width, height) {
            Ok(()) => log::info!(
                "Relativistic warp stage `{}` ready at {width}x{height}",
                stage.label()
            ),
            Err(err) => log::warn!(
                "Relativistic warp stage `{}` unavailable: {err}. Frames will be presented unwarped",
                stage.label()
            ),
        }

        let mode = ViewMode::from(config.relativity.start_mode);
        Self {
            settings: TransformSettings::from(&config.relativity),
            ceiling: config.relativity.beta_ceiling,
            activation_threshold: config.relativity.activation_threshold,
            fov_y: config.render.fov_y_degrees.to_radians(),
            show_hud: config.debug.show_hud,
            enabled: true,
            stage,
            stage_failing: false,
            stack: FrameBufferStack::standard(background.strategy(), width, height),
            background,
            pending_resize: None,
            motion: MotionRequest::Heading {
                beta: 0.0,
                angle: 0.0,
            },
            requested: VelocityState::at_rest(),
            requested_mode: mode,
            last_issue: None,
            pose: CameraPose::default(),
            velocity: VelocityState::at_rest(),
            view: ViewState {
                forward: Vec3::NEG_Z,
                mode,
            },
            frame_rate: FrameRateEma::default(),
            frame_index: 0,
        }
    }

    /// Speed fraction along the current heading.
    pub fn set_forward_velocity(&mut self, beta: f32) {
        let angle = match self.motion {
            MotionRequest::Heading { angle, .. } => angle,
            MotionRequest::Boost(_) => 0.0,
        };
        self.motion = MotionRequest::Heading { beta, angle };
        self.resolve_motion();
    }

    /// Angle in radians between the camera forward and the heading, about camera up.
    pub fn set_view_angle(&mut self, angle: f32) {
        let beta = match self.motion {
            MotionRequest::Heading { beta, .. } => beta,
            MotionRequest::Boost(boost) => boost.length(),
        };
        self.motion = MotionRequest::Heading { beta, angle };
        self.resolve_motion();
    }

    /// World-frame boost vector; its length is the speed fraction.
    pub fn set_boost(&mut self, boost: Vec3) {
        self.motion = MotionRequest::Boost(boost);
        self.resolve_motion();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            log::info!(
                "Relativistic effects {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Lorentz factor of the most recent velocity request.
    pub fn gamma(&self) -> f32 {
        self.requested.gamma()
    }

    /// Takes effect when the next frame starts.
    pub fn set_mode(&mut self, mode: ViewMode) {
        self.requested_mode = mode;
    }

    /// Mode of the frame in progress (or the last one rendered).
    pub fn mode(&self) -> ViewMode {
        self.view.mode
    }

    pub fn set_gr_intensity(&mut self, intensity: f32) {
        self.background.set_gr_intensity(intensity);
    }

    pub fn set_show_hud(&mut self, show: bool) {
        self.show_hud = show;
    }

    /// Reallocate buffers before the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width.max(1), height.max(1)));
    }

    /// Velocity latched for the current frame.
    pub fn velocity(&self) -> &VelocityState {
        &self.velocity
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.stack.dimensions()
    }

    pub fn stage_label(&self) -> &'static str {
        self.stage.label()
    }

    pub fn is_stage_available(&self) -> bool {
        self.stage.is_available()
    }

    pub fn background(&self) -> &BackgroundLayer {
        &self.background
    }

    pub fn stack(&self) -> &FrameBufferStack {
        &self.stack
    }

    /// Final image of the last frame.
    pub fn output(&self) -> &Raster {
        self.stack.output()
    }

    /// Warp `source` into `target` with the latest velocity and mode.
    ///
    /// Returns `false` when the warp stage could not run (disabled, unavailable,
    /// failed, or `target` and `source` differ in size); `target` then holds an
    /// unwarped copy of `source`, clipped if the sizes differ. Below the
    /// activation threshold the copy is the correct result and `true` is
    /// returned. A buffer pair of another size than the frame stack is warped
    /// at its own size; the stack is left alone.
    pub fn apply(&mut self, target: &mut Raster, source: &Raster) -> bool {
        self.apply_pending_resize();
        self.latch_request();

        if !target.same_size(source) {
            let (w, h) = target.blit_clipped(source);
            log::debug!(
                "apply: {}x{} source into {}x{} target, copied {w}x{h} unwarped",
                source.width(),
                source.height(),
                target.width(),
                target.height()
            );
            return false;
        }

        let params = self.shader_parameters();
        if !self.enabled || !self.stage.is_available() {
            copy_unwarped(target, source);
            return false;
        }
        if !params.is_active(self.activation_threshold) {
            copy_unwarped(target, source);
            return true;
        }

        let (width, height) = source.dimensions();
        let stack_size = self.stack.dimensions();
        let foreign_size = (width, height) != stack_size;
        if foreign_size {
            if let Err(err) = self.stage.init(width, height) {
                log::debug!("apply: warp stage cannot run at {width}x{height}: {err}");
                self.restore_stage_size(stack_size);
                copy_unwarped(target, source);
                return false;
            }
        }

        let camera = self.camera(width, height);
        let result = self.stage.apply(&params, &camera, source, target);
        if foreign_size {
            self.restore_stage_size(stack_size);
        }
        match result {
            Ok(()) => {
                self.note_stage_result(None);
                true
            }
            Err(err) => {
                self.note_stage_result(Some(&err));
                copy_unwarped(target, source);
                false
            }
        }
    }

    /// Render one full frame into the stack's output buffer.
    pub fn render_frame(
        &mut self,
        telemetry: &FrameTelemetry,
        foreground: Option<&ForegroundFrame>,
    ) -> FrameReport {
        let mut phases = PhaseLog::start();

        phases.advance(false);
        self.latch(telemetry, foreground);
        self.stack.clear();
        let (width, height) = self.stack.dimensions();
        let camera = self.camera(width, height);
        let params = self.shader_parameters();

        phases.advance(false);
        if let Some(layer) = self.stack.layer_mut(BACKGROUND_LAYER) {
            self.background.draw(layer, &camera);
        }

        phases.advance(false);
        let mut size_mismatch = false;
        if let (Some(frame), Some(layer)) = (foreground, self.stack.layer_mut(FOREGROUND_LAYER)) {
            if layer.copy_from(&frame.image).is_err() {
                let (w, h) = layer.blit_clipped(&frame.image);
                log::debug!(
                    "Foreground is {}x{}, buffers are {width}x{height}; copied {w}x{h}",
                    frame.image.width(),
                    frame.image.height()
                );
                size_mismatch = true;
                self.pending_resize = Some(frame.image.dimensions());
            }
        }
        self.stack.compose_pre_shader();

        let outcome = match self.skip_reason(&params, size_mismatch) {
            Some(reason) => {
                phases.advance(false);
                self.stack.copy_unwarped();
                ShaderOutcome::Skipped(reason)
            }
            None => {
                phases.advance(true);
                self.run_stage(&params, &camera)
            }
        };

        phases.advance(false);
        let fps = self.frame_rate.update(telemetry.dt_seconds);
        let hud = self
            .show_hud
            .then(|| self.hud_readout(&camera, &outcome, fps));
        if let (Some(readout), Some(layer)) = (&hud, self.stack.layer_mut(HUD_LAYER)) {
            layer.draw_all(&hud_commands(readout, width, height));
        }
        self.stack.compose_exempt();

        phases.advance(false);
        let report = FrameReport {
            frame_index: self.frame_index,
            phases: Vec::new(),
            outcome,
            mode: self.view.mode,
            beta: self.velocity.beta(),
            effective_beta: params.beta,
            gamma: self.velocity.gamma(),
            velocity_issue: self.last_issue,
            hud,
        };
        self.frame_index += 1;
        log::trace!(
            "frame {} beta={:.4} mode={} outcome={:?}",
            report.frame_index,
            report.beta,
            report.mode.label(),
            report.outcome
        );

        phases.advance(false);
        debug_assert_eq!(phases.current(), FramePhase::Idle);
        FrameReport {
            phases: phases.into_phases(),
            ..report
        }
    }

    fn latch(&mut self, telemetry: &FrameTelemetry, foreground: Option<&ForegroundFrame>) {
        self.apply_pending_resize();

        self.pose = foreground.map_or(telemetry.camera, ForegroundFrame::camera);
        if let Some(boost) = telemetry.boost {
            self.motion = MotionRequest::Boost(boost);
        }
        // Heading requests follow the camera, so resolve against the new pose.
        self.resolve_motion();
        self.latch_request();

        // A disabled effect leaves the CPU-side stars unshifted too.
        let background_velocity = if self.enabled {
            self.velocity
        } else {
            VelocityState::at_rest()
        };
        self.background.set_velocity(background_velocity);
        self.background.set_view_mode(self.view.mode);
        self.background.set_gr_intensity(telemetry.gr_intensity);
    }

    fn latch_request(&mut self) {
        if self.requested_mode != self.view.mode {
            log::info!(
                "View mode {} -> {}",
                self.view.mode.label(),
                self.requested_mode.label()
            );
        }
        self.velocity = self.requested;
        self.view = ViewState {
            forward: self.pose.forward.try_normalize().unwrap_or(Vec3::NEG_Z),
            mode: self.requested_mode,
        };
    }

    fn apply_pending_resize(&mut self) {
        let Some((width, height)) = self.pending_resize.take() else {
            return;
        };
        if (width, height) == self.stack.dimensions() {
            return;
        }
        self.stack.resize(width, height);
        let was_available = self.stage.is_available();
        if let Err(err) = self.stage.init(width, height) {
            if was_available {
                log::warn!("Warp stage lost on resize to {width}x{height}: {err}");
            } else {
                log::debug!("Warp stage still unavailable after resize: {err}");
            }
        }
    }

    /// Size the stage back to the frame stack after a one-off `apply`.
    fn restore_stage_size(&mut self, (width, height): (u32, u32)) {
        if let Err(err) = self.stage.init(width, height) {
            log::warn!("Warp stage could not return to {width}x{height}: {err}");
        }
    }

    fn resolve_motion(&mut self) {
        let (velocity, issue) = match self.motion {
            MotionRequest::Heading { beta, angle } => {
                VelocityState::from_speed(heading_direction(self.pose, angle), beta, self.ceiling)
            }
            MotionRequest::Boost(boost) => VelocityState::from_boost(boost, self.ceiling),
        };
        self.requested = velocity;
        self.note_velocity_issue(issue);
    }

    /// Warn when the kind of velocity problem changes, not on every frame it persists.
    fn note_velocity_issue(&mut self, issue: Option<VelocityIssue>) {
        let changed = match (&self.last_issue, &issue) {
            (Some(old), Some(new)) => discriminant(old) != discriminant(new),
            (None, None) => false,
            _ => true,
        };
        if changed {
            match &issue {
                Some(issue) => log::warn!("Velocity input: {issue}"),
                None => log::info!("Velocity input valid again"),
            }
        }
        self.last_issue = issue;
    }

    fn note_stage_result(&mut self, error: Option<&WarpError>) {
        match error {
            Some(err) if !self.stage_failing => {
                log::warn!(
                    "Warp stage `{}` failed: {err}. Presenting unwarped",
                    self.stage.label()
                );
                self.stage_failing = true;
            }
            Some(err) => log::trace!("Warp stage still failing: {err}"),
            None if self.stage_failing => {
                log::info!("Warp stage `{}` recovered", self.stage.label());
                self.stage_failing = false;
            }
            None => {}
        }
    }

    fn shader_parameters(&self) -> ShaderParameters {
        ShaderParameters::new(&self.velocity, &self.view, &self.settings, self.enabled)
    }

    fn camera(&self, width: u32, height: u32) -> ViewCamera {
        ViewCamera::new(self.pose.forward, self.pose.up, self.fov_y, width, height)
    }

    fn skip_reason(&self, params: &ShaderParameters, size_mismatch: bool) -> Option<SkipReason> {
        if size_mismatch {
            Some(SkipReason::SizeMismatch)
        } else if !self.enabled {
            Some(SkipReason::Disabled)
        } else if !self.stage.is_available() {
            Some(SkipReason::Unavailable)
        } else if !params.is_active(self.activation_threshold) {
            Some(SkipReason::BelowThreshold)
        } else {
            None
        }
    }

    fn run_stage(&mut self, params: &ShaderParameters, camera: &ViewCamera) -> ShaderOutcome {
        let stage = self.stage.label();
        let (source, target) = self.stack.shader_io();
        let result = self.stage.apply(params, camera, source, target);
        match result {
            Ok(()) => {
                self.note_stage_result(None);
                ShaderOutcome::Applied { stage }
            }
            Err(err) => {
                self.note_stage_result(Some(&err));
                self.stack.copy_unwarped();
                ShaderOutcome::Failed {
                    stage,
                    error: err.to_string(),
                }
            }
        }
    }

    fn hud_readout(&self, camera: &ViewCamera, outcome: &ShaderOutcome, fps: f32) -> HudReadout {
        let physical = RelativisticTransform::new(&self.velocity, ViewMode::Raw, &self.settings);
        let heading = self.velocity.boost_direction();
        HudReadout {
            beta: self.velocity.beta(),
            gamma: self.velocity.gamma(),
            forward_doppler: physical.doppler_factor(heading),
            mode: self.view.mode,
            fps,
            warp_stage: match outcome {
                ShaderOutcome::Applied { stage } => Some(*stage),
                _ => None,
            },
            gr_intensity: self.background.gr_intensity(),
            heading_pixel: if self.velocity.is_at_rest() {
                None
            } else {
                camera.project(heading)
            },
        }
    }
}

/// Camera forward turned `angle` radians about camera up.
fn heading_direction(pose: CameraPose, angle: f32) -> Vec3 {
    let forward = pose.forward.try_normalize().unwrap_or(Vec3::NEG_Z);
    if angle == 0.0 {
        return forward;
    }
    let up = pose.up.try_normalize().unwrap_or(Vec3::Y);
    Quat::from_axis_angle(up, angle) * forward
}

fn copy_unwarped(target: &mut Raster, source: &Raster) {
    target.as_bytes_mut().copy_from_slice(source.as_bytes());
}
