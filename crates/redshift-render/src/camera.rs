//! Pinhole camera used to turn pixels into look directions and back.

use glam::Vec3;

/// Orthonormal camera basis plus a symmetric perspective frustum.
///
/// Pixel `(x, y)` addresses the top-left corner; the ray through its center is
/// [`pixel_direction(x, y)`](Self::pixel_direction). [`project`](Self::project)
/// is the exact inverse for directions in front of the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCamera {
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    fov_y: f32,
    tan_half_y: f32,
    aspect: f32,
    width: u32,
    height: u32,
}

impl ViewCamera {
    /// Build from a forward and approximate up vector; `fov_y` in radians.
    ///
    /// Degenerate input is repaired: a zero forward becomes `-Z` and an up
    /// vector parallel to forward is replaced with any perpendicular one.
    pub fn new(forward: Vec3, up: Vec3, fov_y: f32, width: u32, height: u32) -> Self {
        let forward = forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        let right = forward
            .cross(up)
            .try_normalize()
            .unwrap_or_else(|| forward.any_orthonormal_vector());
        let up = right.cross(forward);
        let fov_y = if fov_y.is_finite() && fov_y > 0.01 && fov_y < 3.1 {
            fov_y
        } else {
            70f32.to_radians()
        };
        let (width, height) = (width.max(1), height.max(1));
        Self {
            forward,
            up,
            right,
            fov_y,
            tan_half_y: (fov_y * 0.5).tan(),
            aspect: width as f32 / height as f32,
            width,
            height,
        }
    }

    /// Same orientation and frustum at another resolution.
    pub fn with_size(&self, width: u32, height: u32) -> Self {
        Self::new(self.forward, self.up, self.fov_y, width, height)
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// `tan(fov_x / 2)`.
    pub fn tan_half_x(&self) -> f32 {
        self.tan_half_y * self.aspect
    }

    pub fn tan_half_y(&self) -> f32 {
        self.tan_half_y
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Unit look direction through the center of pixel `(x, y)`.
    pub fn pixel_direction(&self, x: f32, y: f32) -> Vec3 {
        let sx = ((x + 0.5) / self.width as f32 * 2.0 - 1.0) * self.tan_half_x();
        let sy = (1.0 - (y + 0.5) / self.height as f32 * 2.0) * self.tan_half_y;
        (self.forward + self.right * sx + self.up * sy).normalize()
    }

    /// Continuous pixel coordinates of `dir`, or `None` if it is not in front.
    ///
    /// The result may lie outside the image; callers clip.
    pub fn project(&self, dir: Vec3) -> Option<(f32, f32)> {
        let depth = dir.dot(self.forward);
        if !(depth > 1e-6) {
            return None;
        }
        let sx = dir.dot(self.right) / depth / self.tan_half_x();
        let sy = dir.dot(self.up) / depth / self.tan_half_y;
        Some((
            (sx + 1.0) * 0.5 * self.width as f32 - 0.5,
            (1.0 - sy) * 0.5 * self.height as f32 - 0.5,
        ))
    }

    /// Pixel that `dir` lands in, if it lands in the image.
    pub fn project_to_pixel(&self, dir: Vec3) -> Option<(u32, u32)> {
        let (px, py) = self.project(dir)?;
        let (x, y) = (px.round(), py.round());
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some((x as u32, y as u32))
    }
}
