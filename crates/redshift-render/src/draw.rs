//! Closed set of 2D draw primitives and their rasterizer.

use std::sync::Arc;

use crate::font::{GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH, LINE_HEIGHT, glyph};
use crate::raster::{Raster, Rgba};

/// One drawable primitive. Every variant is handled by [`Raster::draw`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Axis-aligned rectangle, filled or one pixel outline.
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Rgba,
        filled: bool,
    },
    /// Pre-rendered image composited with its top-left corner at `(x, y)`.
    Sprite { x: i32, y: i32, image: Arc<Raster> },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Rgba,
    },
    Circle {
        center: (f32, f32),
        radius: f32,
        color: Rgba,
        filled: bool,
    },
    /// Bitmap-font text; `scale` multiplies the 3x5 glyph cell.
    Text {
        x: i32,
        y: i32,
        text: String,
        color: Rgba,
        scale: u32,
    },
}

impl Raster {
    /// Rasterize one command with source-over blending.
    pub fn draw(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::Rect {
                x,
                y,
                width,
                height,
                color,
                filled,
            } => self.draw_rect(*x, *y, *width, *height, *color, *filled),
            DrawCommand::Sprite { x, y, image } => self.composite_over_at(image, *x, *y),
            DrawCommand::Line { from, to, color } => self.draw_line(*from, *to, *color),
            DrawCommand::Circle {
                center,
                radius,
                color,
                filled,
            } => self.draw_circle(*center, *radius, *color, *filled),
            DrawCommand::Text {
                x,
                y,
                text,
                color,
                scale,
            } => self.draw_text(*x, *y, text, *color, *scale),
        }
    }

    pub fn draw_all<'a>(&mut self, commands: impl IntoIterator<Item = &'a DrawCommand>) {
        for command in commands {
            self.draw(command);
        }
    }

    fn draw_rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgba, filled: bool) {
        if width == 0 || height == 0 {
            return;
        }
        // Far edges in i64 so huge sizes or offsets cannot wrap.
        let (left, top) = (i64::from(x), i64::from(y));
        let right = left + i64::from(width) - 1;
        let bottom = top + i64::from(height) - 1;
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = right.min(i64::from(self.width()) - 1);
        let y1 = bottom.min(i64::from(self.height()) - 1);
        for py in y0..=y1 {
            for px in x0..=x1 {
                let edge = px == left || px == right || py == top || py == bottom;
                if filled || edge {
                    self.blend_pixel(px as i32, py as i32, color);
                }
            }
        }
    }

    /// Bresenham between rounded endpoints.
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba) {
        if !(from.0.is_finite() && from.1.is_finite() && to.0.is_finite() && to.1.is_finite()) {
            return;
        }
        let limit = 1 << 20;
        let clampi = |v: f32| (v.round() as i64).clamp(-limit, limit);
        let (mut x0, mut y0) = (clampi(from.0), clampi(from.1));
        let (x1, y1) = (clampi(to.0), clampi(to.1));
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.blend_pixel(x0 as i32, y0 as i32, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn draw_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba, filled: bool) {
        if !(radius.is_finite() && radius > 0.0 && center.0.is_finite() && center.1.is_finite()) {
            return;
        }
        let r2 = radius * radius;
        let inner2 = (radius - 1.0).max(0.0).powi(2);
        let x0 = ((center.0 - radius).floor() as i32).max(0);
        let y0 = ((center.1 - radius).floor() as i32).max(0);
        let x1 = ((center.0 + radius).ceil() as i32).min(self.width() as i32 - 1);
        let y1 = ((center.1 + radius).ceil() as i32).min(self.height() as i32 - 1);
        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f32 + 0.5 - center.0;
                let dy = py as f32 + 0.5 - center.1;
                let d2 = dx * dx + dy * dy;
                if d2 <= r2 && (filled || d2 >= inner2) {
                    self.blend_pixel(px, py, color);
                }
            }
        }
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgba, scale: u32) {
        let scale = scale.max(1) as i32;
        for (line_index, line) in text.lines().enumerate() {
            let line_y = y + line_index as i32 * LINE_HEIGHT as i32 * scale;
            for (i, c) in line.chars().enumerate() {
                let gx = x + i as i32 * GLYPH_ADVANCE as i32 * scale;
                let rows = glyph(c);
                for (row, bits) in rows.iter().enumerate().take(GLYPH_HEIGHT as usize) {
                    for col in 0..GLYPH_WIDTH {
                        if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                            continue;
                        }
                        for sy in 0..scale {
                            for sx in 0..scale {
                                self.blend_pixel(
                                    gx + col as i32 * scale + sx,
                                    line_y + row as i32 * scale + sy,
                                    color,
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [255, 255, 255, 255];

    fn lit(r: &Raster) -> usize {
        r.as_bytes().chunks_exact(4).filter(|p| p[3] > 0).count()
    }

    #[test]
    fn test_filled_rect_covers_area() {
        let mut r = Raster::new(10, 10);
        r.draw(&DrawCommand::Rect {
            x: 2,
            y: 3,
            width: 4,
            height: 2,
            color: WHITE,
            filled: true,
        });
        assert_eq!(lit(&r), 8);
        assert_eq!(r.get_pixel(2, 3), Some(WHITE));
        assert_eq!(r.get_pixel(6, 3), Some([0; 4]));
    }

    #[test]
    fn test_outline_rect_leaves_interior() {
        let mut r = Raster::new(10, 10);
        r.draw(&DrawCommand::Rect {
            x: 0,
            y: 0,
            width: 5,
            height: 5,
            color: WHITE,
            filled: false,
        });
        assert_eq!(lit(&r), 16);
        assert_eq!(r.get_pixel(2, 2), Some([0; 4]));
    }

    #[test]
    fn test_rect_clipped_at_edges() {
        let mut r = Raster::new(4, 4);
        r.draw(&DrawCommand::Rect {
            x: -2,
            y: -2,
            width: 100,
            height: 100,
            color: WHITE,
            filled: true,
        });
        assert_eq!(lit(&r), 16);
    }

    #[test]
    fn test_rect_extreme_size_does_not_wrap() {
        let mut r = Raster::new(4, 4);
        r.draw(&DrawCommand::Rect {
            x: i32::MAX - 1,
            y: 0,
            width: u32::MAX,
            height: 2,
            color: WHITE,
            filled: true,
        });
        assert_eq!(lit(&r), 0, "rect starting right of the raster stays off it");

        r.draw(&DrawCommand::Rect {
            x: 1,
            y: 1,
            width: u32::MAX,
            height: u32::MAX,
            color: WHITE,
            filled: true,
        });
        assert_eq!(lit(&r), 9);

        let mut outline = Raster::new(4, 4);
        outline.draw(&DrawCommand::Rect {
            x: 0,
            y: 0,
            width: u32::MAX,
            height: u32::MAX,
            color: WHITE,
            filled: false,
        });
        assert_eq!(lit(&outline), 7, "only the near edges fall on the raster");
    }

    #[test]
    fn test_line_hits_both_endpoints() {
        let mut r = Raster::new(10, 10);
        r.draw(&DrawCommand::Line {
            from: (1.0, 1.0),
            to: (8.0, 5.0),
            color: WHITE,
        });
        assert_eq!(r.get_pixel(1, 1), Some(WHITE));
        assert_eq!(r.get_pixel(8, 5), Some(WHITE));
        assert_eq!(lit(&r), 8);
    }

    #[test]
    fn test_non_finite_line_is_ignored() {
        let mut r = Raster::new(4, 4);
        r.draw(&DrawCommand::Line {
            from: (f32::NAN, 0.0),
            to: (3.0, 3.0),
            color: WHITE,
        });
        assert_eq!(lit(&r), 0);
    }

    #[test]
    fn test_circle_filled_vs_ring() {
        let mut disc = Raster::new(21, 21);
        disc.draw(&DrawCommand::Circle {
            center: (10.5, 10.5),
            radius: 8.0,
            color: WHITE,
            filled: true,
        });
        let mut ring = Raster::new(21, 21);
        ring.draw(&DrawCommand::Circle {
            center: (10.5, 10.5),
            radius: 8.0,
            color: WHITE,
            filled: false,
        });
        assert!(lit(&disc) > lit(&ring));
        assert_eq!(disc.get_pixel(10, 10), Some(WHITE));
        assert_eq!(ring.get_pixel(10, 10), Some([0; 4]));
    }

    #[test]
    fn test_text_draws_glyph_bits() {
        let mut r = Raster::new(8, 8);
        r.draw(&DrawCommand::Text {
            x: 0,
            y: 0,
            text: "1".to_string(),
            color: WHITE,
            scale: 1,
        });
        // '1' is 010 / 110 / 010 / 010 / 111
        assert_eq!(lit(&r), 8);
        assert_eq!(r.get_pixel(1, 0), Some(WHITE));
        assert_eq!(r.get_pixel(0, 0), Some([0; 4]));
    }

    #[test]
    fn test_sprite_composites_at_offset() {
        let mut r = Raster::new(6, 6);
        let image = Arc::new(Raster::filled(2, 2, WHITE));
        r.draw(&DrawCommand::Sprite { x: 4, y: 4, image });
        assert_eq!(lit(&r), 4);
        assert_eq!(r.get_pixel(5, 5), Some(WHITE));
    }
}
