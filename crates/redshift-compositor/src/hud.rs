//! Flight readout drawn over the final frame.
//!
//! Values come from the latched frame state, never from the warped image, and
//! the commands are rasterized into an exempt layer.

use redshift_relativity::ViewMode;
use redshift_render::{DrawCommand, Rgba, font};

const PANEL_COLOR: Rgba = [8, 12, 24, 170];
const TEXT_COLOR: Rgba = [190, 235, 255, 255];
const WARN_COLOR: Rgba = [255, 170, 60, 255];
const RETICLE_COLOR: Rgba = [120, 255, 160, 200];
const MARGIN: i32 = 6;
const PADDING: i32 = 4;
const TEXT_SCALE: u32 = 2;
const RETICLE_RADIUS: f32 = 9.0;

/// Smoothed frames per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRateEma {
    frame_time: f32,
}

impl Default for FrameRateEma {
    fn default() -> Self {
        Self {
            frame_time: 1.0 / 60.0,
        }
    }
}

impl FrameRateEma {
    /// Fold in one frame time and return the smoothed rate.
    pub fn update(&mut self, dt_seconds: f32) -> f32 {
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            // alpha = 0.1
            self.frame_time = self.frame_time * 0.9 + dt_seconds * 0.1;
        }
        self.fps()
    }

    pub fn fps(&self) -> f32 {
        1.0 / self.frame_time
    }
}

/// Everything the HUD shows for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HudReadout {
    /// Latched speed, not the damped one.
    pub beta: f32,
    pub gamma: f32,
    /// Doppler factor straight ahead along the heading.
    pub forward_doppler: f32,
    pub mode: ViewMode,
    pub fps: f32,
    /// Warp stage label, or `None` when the frame went out unwarped.
    pub warp_stage: Option<&'static str>,
    pub gr_intensity: f32,
    /// Pixel where the heading projects, if it is on screen.
    pub heading_pixel: Option<(f32, f32)>,
}

/// Text lines of the readout panel, top to bottom.
pub fn hud_lines(readout: &HudReadout) -> Vec<String> {
    let mut lines = vec![
        format!("BETA {:.3}", readout.beta),
        format!("GAMMA {:.3}", readout.gamma),
        format!("DOPP {:.2}", readout.forward_doppler),
        format!("MODE {}", readout.mode.label()),
        format!("FPS {:.0}", readout.fps),
        match readout.warp_stage {
            Some(stage) => format!("WARP {}", stage.to_uppercase()),
            None => "WARP OFF".to_string(),
        },
    ];
    if readout.gr_intensity > 0.0 {
        lines.push(format!("GR {:.2}", readout.gr_intensity));
    }
    lines
}

/// Draw commands for the panel and the heading reticle on a `width` x `height` frame.
pub fn hud_commands(readout: &HudReadout, width: u32, height: u32) -> Vec<DrawCommand> {
    let lines = hud_lines(readout);
    let line_height = (font::LINE_HEIGHT * TEXT_SCALE) as i32;
    let text_width = lines
        .iter()
        .map(|l| font::measure(l, TEXT_SCALE).0)
        .max()
        .unwrap_or(0);

    let mut commands = Vec::with_capacity(lines.len() + 4);
    commands.push(DrawCommand::Rect {
        x: MARGIN,
        y: MARGIN,
        width: text_width + 2 * PADDING as u32,
        height: (lines.len() as i32 * line_height + 2 * PADDING) as u32,
        color: PANEL_COLOR,
        filled: true,
    });

    for (i, line) in lines.into_iter().enumerate() {
        let color = if line.starts_with("WARP OFF") {
            WARN_COLOR
        } else {
            TEXT_COLOR
        };
        commands.push(DrawCommand::Text {
            x: MARGIN + PADDING,
            y: MARGIN + PADDING + i as i32 * line_height,
            text: line,
            color,
            scale: TEXT_SCALE,
        });
    }

    if let Some((x, y)) = readout.heading_pixel {
        let on_screen = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;
        if on_screen {
            commands.push(DrawCommand::Circle {
                center: (x, y),
                radius: RETICLE_RADIUS,
                color: RETICLE_COLOR,
                filled: false,
            });
            let arm = RETICLE_RADIUS * 0.5;
            commands.push(DrawCommand::Line {
                from: (x - arm, y),
                to: (x + arm, y),
                color: RETICLE_COLOR,
            });
            commands.push(DrawCommand::Line {
                from: (x, y - arm),
                to: (x, y + arm),
                color: RETICLE_COLOR,
            });
        }
    }
    commands
}
