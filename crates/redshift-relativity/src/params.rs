use glam::Vec3;

use crate::transform::{ModeShading, RelativisticTransform, TransformLimits, TransformSettings};
use crate::velocity::{VelocityState, lorentz_gamma};
use crate::view::{ViewMode, ViewState};

/// Per-frame input to the warp stage.
///
/// Always rebuilt from the latched velocity and view; never carried across frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderParameters {
    pub boost_direction: Vec3,
    /// Speed after the mode's damping curve. This is what the warp uses.
    pub beta: f32,
    /// Speed as reported by telemetry (after ceiling clamp).
    pub physical_beta: f32,
    /// Lorentz factor of `beta`.
    pub gamma: f32,
    pub enabled: bool,
    pub mode: ViewMode,
    pub beaming_exponent: f32,
    pub tint_strength: f32,
    pub min_intensity: f32,
    pub max_intensity: f32,
}

impl ShaderParameters {
    pub fn new(
        velocity: &VelocityState,
        view: &ViewState,
        settings: &TransformSettings,
        enabled: bool,
    ) -> Self {
        let beta = settings.effective_beta(view.mode, velocity.beta());
        let shading = settings.shading(view.mode);
        Self {
            boost_direction: velocity.boost_direction(),
            beta,
            physical_beta: velocity.beta(),
            gamma: if beta == 0.0 { 1.0 } else { lorentz_gamma(beta) },
            enabled,
            mode: view.mode,
            beaming_exponent: shading.beaming_exponent,
            tint_strength: shading.tint_strength,
            min_intensity: settings.limits.min_intensity,
            max_intensity: settings.limits.max_intensity,
        }
    }

    /// True when the warp would visibly change the frame.
    pub fn is_active(&self, activation_threshold: f32) -> bool {
        self.enabled && self.beta > activation_threshold
    }

    /// The CPU transform equivalent to these parameters.
    pub fn transform(&self) -> RelativisticTransform {
        RelativisticTransform::from_parts(
            self.boost_direction,
            self.beta,
            ModeShading {
                beaming_exponent: self.beaming_exponent,
                tint_strength: self.tint_strength,
            },
            TransformLimits {
                min_intensity: self.min_intensity,
                max_intensity: self.max_intensity,
            },
        )
    }
}
