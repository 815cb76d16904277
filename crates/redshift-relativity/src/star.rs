use glam::Vec3;

/// A point light source in the galaxy frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarSample {
    /// Unit look direction toward the star.
    pub direction: Vec3,
    /// Intrinsic brightness, 0.0 to 1.0 for catalog stars.
    pub brightness: f32,
    /// Linear RGB color.
    pub color: [f32; 3],
    /// Apparent angular radius in radians, used for splat size.
    pub angular_radius: f32,
}
