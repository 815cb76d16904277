//! Frame phases, in the order they run.

/// One step of a compositor frame.
///
/// `Idle -> ClearBuffer -> DrawBackground -> DrawForeground -> {ApplyShader | Skip}
/// -> DrawHud -> Present -> Idle`. Exactly one of `ApplyShader` and `Skip` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    /// Latch inputs, clear every buffer.
    ClearBuffer,
    DrawBackground,
    /// Foreground image into its layer, then the pre-shader flatten.
    DrawForeground,
    /// The one warp pass.
    ApplyShader,
    /// Unwarped copy of the pre-shader buffer.
    Skip,
    /// Exempt layers over the final output.
    DrawHud,
    Present,
}

impl FramePhase {
    /// The phase after `self`. `shader_active` only matters after `DrawForeground`.
    pub fn next(self, shader_active: bool) -> Self {
        match self {
            Self::Idle => Self::ClearBuffer,
            Self::ClearBuffer => Self::DrawBackground,
            Self::DrawBackground => Self::DrawForeground,
            Self::DrawForeground if shader_active => Self::ApplyShader,
            Self::DrawForeground => Self::Skip,
            Self::ApplyShader | Self::Skip => Self::DrawHud,
            Self::DrawHud => Self::Present,
            Self::Present => Self::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ClearBuffer => "clear",
            Self::DrawBackground => "background",
            Self::DrawForeground => "foreground",
            Self::ApplyShader => "shader",
            Self::Skip => "skip",
            Self::DrawHud => "hud",
            Self::Present => "present",
        }
    }

    /// True for phases that may write the output buffer before the HUD.
    pub fn writes_output(self) -> bool {
        matches!(self, Self::ApplyShader | Self::Skip)
    }
}

/// Phases a frame walks through, recorded as it goes.
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseLog {
    phases: Vec<FramePhase>,
}

impl PhaseLog {
    pub(crate) fn start() -> Self {
        Self {
            phases: vec![FramePhase::Idle],
        }
    }

    pub(crate) fn current(&self) -> FramePhase {
        self.phases.last().copied().unwrap_or(FramePhase::Idle)
    }

    /// Step to the next phase and return it.
    pub(crate) fn advance(&mut self, shader_active: bool) -> FramePhase {
        let next = self.current().next(shader_active);
        log::trace!("frame phase -> {}", next.label());
        self.phases.push(next);
        next
    }

    pub(crate) fn into_phases(self) -> Vec<FramePhase> {
        self.phases
    }
}
