//! Scripted flight and a stand-in scene rasterizer for the headless demo.

use std::path::Path;

use glam::{Quat, Vec3};
use redshift_compositor::{CameraPose, ForegroundFrame};
use redshift_render::{DrawCommand, OPAQUE_BLACK, Raster, ViewCamera};

const PLANET_DIRECTION: Vec3 = Vec3::new(0.35, -0.12, -1.0);
const PLANET_ANGULAR_RADIUS: f32 = 0.09;
const PLANET_COLOR: [u8; 4] = [170, 110, 70, 255];
const RING_COLOR: [u8; 4] = [225, 215, 190, 230];
const RING_SEGMENTS: usize = 48;

/// Ship state at one point of the script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSample {
    pub beta: f32,
    /// Heading offset from the camera forward, radians about camera up.
    pub heading_angle: f32,
    pub camera: CameraPose,
}

/// Accelerate from rest to `max_beta` with a gentle weave and camera yaw.
#[derive(Debug, Clone, Copy)]
pub struct FlightScript {
    pub frames: u32,
    pub max_beta: f32,
}

impl FlightScript {
    pub fn sample(&self, frame: u32) -> FlightSample {
        let t = if self.frames > 1 {
            frame.min(self.frames - 1) as f32 / (self.frames - 1) as f32
        } else {
            1.0
        };
        let ramp = t * t * (3.0 - 2.0 * t);
        let yaw = Quat::from_rotation_y(-0.15 * t);
        FlightSample {
            beta: self.max_beta * ramp,
            heading_angle: 0.2 * (t * std::f32::consts::TAU).sin(),
            camera: CameraPose {
                forward: yaw * Vec3::NEG_Z,
                up: Vec3::Y,
            },
        }
    }
}

/// A ringed planet drawn as flat primitives, as the scene rasterizer would.
pub fn planet_foreground(camera: CameraPose, fov_y: f32, width: u32, height: u32) -> ForegroundFrame {
    let view = ViewCamera::new(camera.forward, camera.up, fov_y, width, height);
    let mut image = Raster::new(width, height);

    let center_dir = PLANET_DIRECTION.normalize();
    if let Some(center) = view.project(center_dir) {
        let pixels_per_radian = height as f32 / fov_y;
        let radius = PLANET_ANGULAR_RADIUS * pixels_per_radian;

        let mut commands = vec![DrawCommand::Circle {
            center,
            radius,
            color: PLANET_COLOR,
            filled: true,
        }];
        let ring: Vec<(f32, f32)> = (0..=RING_SEGMENTS)
            .map(|i| {
                let a = i as f32 / RING_SEGMENTS as f32 * std::f32::consts::TAU;
                (
                    center.0 + a.cos() * radius * 1.9,
                    center.1 + a.sin() * radius * 0.45,
                )
            })
            .collect();
        commands.extend(ring.windows(2).map(|seg| DrawCommand::Line {
            from: seg[0],
            to: seg[1],
            color: RING_COLOR,
        }));
        image.draw_all(&commands);
    }
    ForegroundFrame::new(image, camera)
}

/// Write `raster` as an opaque PNG, flattened over black.
pub fn save_png(raster: &Raster, path: &Path) -> Result<(), image::ImageError> {
    let mut flat = Raster::filled(raster.width(), raster.height(), OPAQUE_BLACK);
    flat.composite_over(raster);
    let (width, height) = flat.dimensions();
    image::save_buffer(
        path,
        flat.as_bytes(),
        width,
        height,
        image::ExtendedColorType::Rgba8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_starts_at_rest_and_ends_at_max() {
        let script = FlightScript {
            frames: 60,
            max_beta: 0.9,
        };
        assert_eq!(script.sample(0).beta, 0.0);
        assert!((script.sample(59).beta - 0.9).abs() < 1e-6);
        assert!((script.sample(500).beta - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_script_speed_never_decreases() {
        let script = FlightScript {
            frames: 100,
            max_beta: 0.8,
        };
        let betas: Vec<f32> = (0..100).map(|f| script.sample(f).beta).collect();
        assert!(betas.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_planet_is_drawn_in_view() {
        let frame = planet_foreground(CameraPose::default(), 70f32.to_radians(), 160, 120);
        let opaque = frame
            .image
            .as_bytes()
            .chunks_exact(4)
            .filter(|px| px[3] == 255)
            .count();
        assert!(opaque > 50, "planet should cover pixels, got {opaque}");
    }

    #[test]
    fn test_planet_behind_camera_leaves_image_clear() {
        let camera = CameraPose {
            forward: Vec3::Z,
            up: Vec3::Y,
        };
        let frame = planet_foreground(camera, 70f32.to_radians(), 64, 48);
        assert!(frame.image.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_png_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        save_png(&Raster::filled(8, 4, [10, 20, 30, 128]), &path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(0, 0)[3], 255);
    }
}
