//! View mode selection and the compensated-view damping curve.

use glam::Vec3;
use redshift_config::DisplayMode;

/// Which rendition of the same velocity is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// Physically derived aberration, Doppler and beaming.
    #[default]
    Raw,
    /// Navigation display: speed damped before the transform, gentler shading.
    Compensated,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Compensated => "NAV",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Raw => Self::Compensated,
            Self::Compensated => Self::Raw,
        }
    }
}

impl From<DisplayMode> for ViewMode {
    fn from(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Raw => Self::Raw,
            DisplayMode::Compensated => Self::Compensated,
        }
    }
}

/// Camera forward direction plus the active mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub forward: Vec3,
    pub mode: ViewMode,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            forward: Vec3::NEG_Z,
            mode: ViewMode::Raw,
        }
    }
}

/// Monotonic damping `beta_eff = L * tanh(beta / L)`.
///
/// Slope 1 at rest, so low speeds look the same in both modes, and the output
/// never exceeds `L`. Strictly below `beta` for any `beta > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensationCurve {
    limit: f32,
}

impl CompensationCurve {
    /// `limit` outside `(0, 1)` falls back to 0.6.
    pub fn new(limit: f32) -> Self {
        let limit = if limit > 0.0 && limit < 1.0 { limit } else { 0.6 };
        Self { limit }
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn damp(&self, beta: f32) -> f32 {
        if beta <= 0.0 {
            return 0.0;
        }
        self.limit * (beta / self.limit).tanh()
    }
}

impl Default for CompensationCurve {
    fn default() -> Self {
        Self::new(0.6)
    }
}
