//! Aberration, Doppler factor and beaming for a single observer velocity.

use glam::Vec3;
use redshift_config::RelativityConfig;

use crate::doppler::doppler_tint;
use crate::star::StarSample;
use crate::velocity::{VelocityState, lorentz_gamma};
use crate::view::{CompensationCurve, ViewMode};

/// Physical beaming exponent for point sources.
const RAW_BEAMING_EXPONENT: f32 = 3.0;

/// Bounds on the beaming multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformLimits {
    pub min_intensity: f32,
    pub max_intensity: f32,
}

impl Default for TransformLimits {
    fn default() -> Self {
        Self {
            min_intensity: 1.0e-5,
            max_intensity: 1.0e5,
        }
    }
}

/// Shading curve of one view mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeShading {
    pub beaming_exponent: f32,
    pub tint_strength: f32,
}

/// Everything besides velocity that shapes the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSettings {
    pub limits: TransformLimits,
    pub raw: ModeShading,
    pub compensated: ModeShading,
    pub compensation: CompensationCurve,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self::from(&RelativityConfig::default())
    }
}

impl From<&RelativityConfig> for TransformSettings {
    fn from(config: &RelativityConfig) -> Self {
        Self {
            limits: TransformLimits {
                min_intensity: config.min_intensity,
                max_intensity: config.max_intensity,
            },
            raw: ModeShading {
                beaming_exponent: RAW_BEAMING_EXPONENT,
                tint_strength: 1.0,
            },
            compensated: ModeShading {
                beaming_exponent: config.compensation.beaming_exponent,
                tint_strength: config.compensation.tint_strength,
            },
            compensation: CompensationCurve::new(config.compensation.beta_limit),
        }
    }
}

impl TransformSettings {
    pub fn shading(&self, mode: ViewMode) -> ModeShading {
        match mode {
            ViewMode::Raw => self.raw,
            ViewMode::Compensated => self.compensated,
        }
    }

    /// Speed fed to the transform for `mode`.
    pub fn effective_beta(&self, mode: ViewMode, beta: f32) -> f32 {
        match mode {
            ViewMode::Raw => beta,
            ViewMode::Compensated => self.compensation.damp(beta),
        }
    }
}

/// Aberrate look direction `n` for an observer moving along unit `boost` at `beta`.
///
/// Negative `beta` gives the inverse map (apparent back to source). `beta == 0`
/// returns `n` untouched.
pub fn aberrate(n: Vec3, boost: Vec3, beta: f32) -> Vec3 {
    if beta == 0.0 {
        return n;
    }
    let mu = n.dot(boost);
    let n_perp = n - boost * mu;
    let denom = 1.0 + beta * mu;
    let parallel = (mu + beta) / denom;
    let perp_scale = (1.0 - beta * beta).sqrt() / denom;
    (boost * parallel + n_perp * perp_scale)
        .try_normalize()
        .unwrap_or(n)
}

/// What an observer sees for one galaxy-frame direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApparentSource {
    pub direction: Vec3,
    pub doppler: f32,
    pub intensity: f32,
    pub tint: [f32; 3],
}

/// The per-frame transform: velocity and mode resolved into closed-form maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativisticTransform {
    boost: Vec3,
    beta: f32,
    gamma: f32,
    shading: ModeShading,
    limits: TransformLimits,
}

impl RelativisticTransform {
    pub fn new(velocity: &VelocityState, mode: ViewMode, settings: &TransformSettings) -> Self {
        let beta = settings.effective_beta(mode, velocity.beta());
        Self::from_parts(
            velocity.boost_direction(),
            beta,
            settings.shading(mode),
            settings.limits,
        )
    }

    /// Build from an already-effective speed. `beta` must lie in `[0, 1)`.
    pub fn from_parts(boost: Vec3, beta: f32, shading: ModeShading, limits: TransformLimits) -> Self {
        let gamma = if beta == 0.0 { 1.0 } else { lorentz_gamma(beta) };
        Self {
            boost,
            beta,
            gamma,
            shading,
            limits,
        }
    }

    /// Transform for an observer at rest.
    pub fn identity(settings: &TransformSettings) -> Self {
        Self::new(&VelocityState::at_rest(), ViewMode::Raw, settings)
    }

    pub fn is_identity(&self) -> bool {
        self.beta == 0.0
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn boost_direction(&self) -> Vec3 {
        self.boost
    }

    /// Galaxy-frame direction to apparent direction.
    pub fn aberrate(&self, n: Vec3) -> Vec3 {
        aberrate(n, self.boost, self.beta)
    }

    /// Apparent direction back to the galaxy-frame direction it came from.
    pub fn source_direction(&self, apparent: Vec3) -> Vec3 {
        aberrate(apparent, self.boost, -self.beta)
    }

    /// Doppler factor for a galaxy-frame direction.
    pub fn doppler_factor(&self, n: Vec3) -> f32 {
        if self.is_identity() {
            return 1.0;
        }
        self.gamma * (1.0 + self.beta * n.dot(self.boost))
    }

    /// Doppler factor expressed through the apparent direction.
    pub fn doppler_factor_apparent(&self, apparent: Vec3) -> f32 {
        if self.is_identity() {
            return 1.0;
        }
        1.0 / (self.gamma * (1.0 - self.beta * apparent.dot(self.boost)))
    }

    /// Brightness multiplier `clamp(d^p)`.
    pub fn beaming(&self, d: f32) -> f32 {
        if d == 1.0 {
            return 1.0;
        }
        let intensity = d.powf(self.shading.beaming_exponent);
        if intensity.is_nan() {
            return self.limits.min_intensity;
        }
        intensity.clamp(self.limits.min_intensity, self.limits.max_intensity)
    }

    pub fn tint(&self, d: f32) -> [f32; 3] {
        doppler_tint(d, self.shading.tint_strength)
    }

    pub fn apply(&self, n: Vec3) -> ApparentSource {
        if self.is_identity() {
            return ApparentSource {
                direction: n,
                doppler: 1.0,
                intensity: 1.0,
                tint: [1.0; 3],
            };
        }
        let doppler = self.doppler_factor(n);
        ApparentSource {
            direction: self.aberrate(n),
            doppler,
            intensity: self.beaming(doppler),
            tint: self.tint(doppler),
        }
    }

    /// Transformed copy of `star`. Brightness carries the beaming, color the tint.
    pub fn transform_star(&self, star: &StarSample) -> StarSample {
        let seen = self.apply(star.direction);
        StarSample {
            direction: seen.direction,
            brightness: star.brightness * seen.intensity,
            color: [
                star.color[0] * seen.tint[0],
                star.color[1] * seen.tint[1],
                star.color[2] * seen.tint[2],
            ],
            angular_radius: star.angular_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CEILING: f32 = 0.999;

    fn sample_directions() -> Vec<Vec3> {
        let mut dirs = vec![Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        for i in 0..24 {
            let theta = i as f32 * 0.37;
            let phi = i as f32 * 1.13;
            dirs.push(
                Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()).normalize(),
            );
        }
        dirs
    }

    fn transform_at(boost: Vec3, beta: f32, mode: ViewMode) -> RelativisticTransform {
        let (velocity, _) = VelocityState::from_speed(boost, beta, CEILING);
        RelativisticTransform::new(&velocity, mode, &TransformSettings::default())
    }

    #[test]
    fn test_identity_at_rest_is_exact() {
        let t = transform_at(Vec3::new(0.3, -0.2, 0.9), 0.0, ViewMode::Raw);
        for n in sample_directions() {
            let seen = t.apply(n);
            assert_eq!(seen.direction, n, "direction moved at rest");
            assert_eq!(seen.doppler, 1.0);
            assert_eq!(seen.intensity, 1.0);
            assert_eq!(seen.tint, [1.0; 3]);
        }
    }

    #[test]
    fn test_aberrated_directions_stay_unit() {
        for beta in [0.1_f32, 0.5, 0.9, 0.99, CEILING] {
            let t = transform_at(Vec3::new(1.0, 2.0, -0.5), beta, ViewMode::Raw);
            for n in sample_directions() {
                let out = t.aberrate(n);
                assert!(
                    (out.length() - 1.0).abs() < 1e-6,
                    "beta {beta}, n {n:?}: |n'| = {}",
                    out.length()
                );
            }
        }
    }

    #[test]
    fn test_forward_brightening_is_monotonic() {
        let mut previous = 1.0;
        for i in 1..=999 {
            let beta = i as f32 * 0.001;
            let t = transform_at(Vec3::Z, beta, ViewMode::Raw);
            let intensity = t.apply(Vec3::Z).intensity;
            assert!(
                intensity > previous,
                "forward beaming not increasing at beta {beta}: {intensity} <= {previous}"
            );
            previous = intensity;
        }
    }

    #[test]
    fn test_rear_darkening_is_monotonic_and_below_forward() {
        let mut previous = 1.0;
        for i in 1..=999 {
            let beta = i as f32 * 0.001;
            let t = transform_at(Vec3::Z, beta, ViewMode::Raw);
            let rear = t.apply(Vec3::NEG_Z).intensity;
            let forward = t.apply(Vec3::Z).intensity;
            assert!(rear < previous, "rear beaming not decreasing at beta {beta}");
            assert!(rear <= forward, "rear brighter than forward at beta {beta}");
            previous = rear;
        }
    }

    #[test]
    fn test_ceiling_produces_finite_values() {
        for requested in [CEILING, 1.0, 1.5, f32::MAX] {
            let t = transform_at(Vec3::X, requested, ViewMode::Raw);
            assert!(t.gamma().is_finite());
            for n in sample_directions() {
                let seen = t.apply(n);
                assert!(seen.direction.is_finite(), "requested {requested}, n {n:?}");
                assert!(seen.doppler.is_finite());
                assert!(seen.intensity.is_finite());
                assert!(seen.intensity >= 1.0e-5 && seen.intensity <= 1.0e5);
            }
        }
    }

    #[test]
    fn test_cruise_keeps_axis_fixed() {
        let t = transform_at(Vec3::Z, 0.5, ViewMode::Raw);
        assert!((t.gamma() - 1.154_700_5).abs() < 1e-5);

        let ahead = t.apply(Vec3::Z);
        assert!((ahead.direction - Vec3::Z).length() < 1e-6);
        assert!(ahead.intensity > 1.0);

        let behind = t.apply(Vec3::NEG_Z);
        assert!((behind.direction - Vec3::NEG_Z).length() < 1e-6);
        assert!(behind.intensity < 1.0);
    }

    #[test]
    fn test_side_star_moves_toward_heading() {
        let t = transform_at(Vec3::Z, 0.5, ViewMode::Raw);
        let seen = t.aberrate(Vec3::X);
        // cos of the apparent angle from the heading equals beta for a perpendicular source
        assert!((seen.dot(Vec3::Z) - 0.5).abs() < 1e-6, "got {seen:?}");
    }

    #[test]
    fn test_source_direction_inverts_aberration() {
        let t = transform_at(Vec3::new(0.2, 0.5, -1.0), 0.8, ViewMode::Raw);
        for n in sample_directions() {
            let back = t.source_direction(t.aberrate(n));
            assert!((back - n).length() < 1e-4, "n {n:?} came back as {back:?}");
        }
    }

    #[test]
    fn test_doppler_forms_agree() {
        let t = transform_at(Vec3::Y, 0.7, ViewMode::Raw);
        for n in sample_directions() {
            let from_source = t.doppler_factor(n);
            let from_apparent = t.doppler_factor_apparent(t.aberrate(n));
            assert!(
                (from_source - from_apparent).abs() < 1e-3 * from_source.max(1.0),
                "n {n:?}: {from_source} vs {from_apparent}"
            );
        }
    }

    #[test]
    fn test_compensated_is_gentler() {
        let raw = transform_at(Vec3::Z, 0.8, ViewMode::Raw);
        let nav = transform_at(Vec3::Z, 0.8, ViewMode::Compensated);
        assert!(nav.beta() < raw.beta());

        let side = Vec3::X;
        let raw_shift = raw.aberrate(side).angle_between(side);
        let nav_shift = nav.aberrate(side).angle_between(side);
        assert!(nav_shift < raw_shift, "nav {nav_shift} vs raw {raw_shift}");

        assert!(nav.apply(Vec3::Z).intensity < raw.apply(Vec3::Z).intensity);
    }

    #[test]
    fn test_transform_star_scales_brightness() {
        let t = transform_at(Vec3::Z, 0.5, ViewMode::Raw);
        let star = StarSample {
            direction: Vec3::Z,
            brightness: 0.5,
            color: [1.0, 1.0, 1.0],
            angular_radius: 0.001,
        };
        let seen = t.transform_star(&star);
        let d = t.doppler_factor(Vec3::Z);
        assert!((seen.brightness - 0.5 * d.powi(3)).abs() < 1e-4);
        assert!(seen.color[2] > seen.color[0], "forward star should be bluer");
        assert_eq!(seen.angular_radius, star.angular_radius);
    }
}
