//! Per-frame orchestration of the relativistic view.
//!
//! [`RelativisticCompositor`] latches the velocity and view mode at the start of
//! each frame, draws the background and foreground into a pre-shader buffer,
//! runs the warp stage over it at most once, and only then draws the HUD.

mod compositor;
mod frame;
mod hud;
mod phase;
mod stack;

pub use compositor::RelativisticCompositor;
pub use frame::{CameraPose, ForegroundFrame, FrameReport, FrameTelemetry, ShaderOutcome, SkipReason};
pub use hud::{FrameRateEma, HudReadout, hud_commands, hud_lines};
pub use phase::FramePhase;
pub use stack::{
    BACKGROUND_LAYER, Blend, FOREGROUND_LAYER, FrameBufferStack, HUD_LAYER, Layer, StackError,
};
