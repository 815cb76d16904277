//! The background sky layer.
//!
//! Two strategies share one catalog. `Skybox` paints the baked cubemap unwarped
//! and leaves aberration to the warp pass. `DiscreteStars` moves each bright
//! star analytically, so its output must never go through the warp pass again.

use std::sync::Arc;

use redshift_config::{StarfieldConfig, StarfieldStrategy};
use redshift_relativity::{
    RelativisticTransform, StarSample, TransformSettings, VelocityState, ViewMode,
};
use redshift_render::{EnvironmentMap, Raster, ViewCamera};

use crate::starfield::{StarfieldCubemap, StarfieldGenerator, brightest};

/// Stars above this brightness (after beaming) get a soft cross.
const SPLAT_GLOW_THRESHOLD: f32 = 0.3;
const SPLAT_GLOW_FRACTION: f32 = 0.3;

pub struct BackgroundLayer {
    strategy: StarfieldStrategy,
    environment: Arc<EnvironmentMap>,
    bright_stars: Vec<StarSample>,
    settings: TransformSettings,
    velocity: VelocityState,
    mode: ViewMode,
    gr_intensity: f32,
}

impl BackgroundLayer {
    /// Generate the catalog, bake the cubemap and keep the brightest stars.
    pub fn from_config(config: &StarfieldConfig, settings: TransformSettings) -> Self {
        let stars = StarfieldGenerator::new(config.seed, config.star_count).generate();
        let environment = StarfieldCubemap::render(&stars, config.cubemap_face_size).bake();
        let bright = brightest(&stars, config.bright_star_count as usize);
        log::info!(
            "Starfield ready: {} stars, {} bright, {}px faces, {:?} strategy",
            stars.len(),
            bright.len(),
            environment.face_size(),
            config.strategy
        );
        Self::new(config.strategy, Arc::new(environment), bright, settings)
    }

    pub fn new(
        strategy: StarfieldStrategy,
        environment: Arc<EnvironmentMap>,
        bright_stars: Vec<StarSample>,
        settings: TransformSettings,
    ) -> Self {
        Self {
            strategy,
            environment,
            bright_stars,
            settings,
            velocity: VelocityState::at_rest(),
            mode: ViewMode::Raw,
            gr_intensity: 0.0,
        }
    }

    pub fn strategy(&self) -> StarfieldStrategy {
        self.strategy
    }

    /// Velocity used by the next [`draw`](Self::draw).
    pub fn set_velocity(&mut self, velocity: VelocityState) {
        self.velocity = velocity;
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// Lensing strength from the simulation. Stored and reported; not rendered.
    pub fn set_gr_intensity(&mut self, intensity: f32) {
        self.gr_intensity = if intensity.is_finite() {
            intensity.max(0.0)
        } else {
            0.0
        };
    }

    pub fn gr_intensity(&self) -> f32 {
        self.gr_intensity
    }

    pub fn environment(&self) -> &Arc<EnvironmentMap> {
        &self.environment
    }

    /// Environment the warp pass may sample for off-frame source directions.
    ///
    /// `None` for discrete stars: their sky is already transformed, and sampling
    /// the unwarped cubemap would show every star twice.
    pub fn warp_environment(&self) -> Option<Arc<EnvironmentMap>> {
        match self.strategy {
            StarfieldStrategy::Skybox => Some(Arc::clone(&self.environment)),
            StarfieldStrategy::DiscreteStars => None,
        }
    }

    pub fn bright_stars(&self) -> &[StarSample] {
        &self.bright_stars
    }

    /// Paint the sky into `target` as seen through `camera`.
    pub fn draw(&self, target: &mut Raster, camera: &ViewCamera) {
        let camera = camera.with_size(target.width(), target.height());
        match self.strategy {
            StarfieldStrategy::Skybox => self.draw_skybox(target, &camera),
            StarfieldStrategy::DiscreteStars => self.draw_stars(target, &camera),
        }
    }

    fn draw_skybox(&self, target: &mut Raster, camera: &ViewCamera) {
        for y in 0..target.height() {
            for x in 0..target.width() {
                let dir = camera.pixel_direction(x as f32, y as f32);
                target.set_pixel(x, y, self.environment.sample(dir));
            }
        }
    }

    fn draw_stars(&self, target: &mut Raster, camera: &ViewCamera) {
        let transform = RelativisticTransform::new(&self.velocity, self.mode, &self.settings);
        let mut drawn = 0usize;
        for star in &self.bright_stars {
            let seen = transform.transform_star(star);
            let Some((x, y)) = camera.project_to_pixel(seen.direction) else {
                continue;
            };
            let (x, y) = (x as i32, y as i32);
            let level = seen.brightness.min(1.0) * 255.0;
            let rgb = seen.color.map(|c| c * level);
            target.add_pixel(x, y, rgb);

            if seen.brightness > SPLAT_GLOW_THRESHOLD {
                let glow = rgb.map(|c| c * SPLAT_GLOW_FRACTION);
                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    target.add_pixel(x + dx, y + dy, glow);
                }
            }
            drawn += 1;
        }
        log::trace!("Splatted {drawn}/{} bright stars", self.bright_stars.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const W: u32 = 64;
    const H: u32 = 48;

    fn camera() -> ViewCamera {
        ViewCamera::new(Vec3::NEG_Z, Vec3::Y, 70f32.to_radians(), W, H)
    }

    fn star(direction: Vec3) -> StarSample {
        StarSample {
            direction: direction.normalize(),
            brightness: 0.2,
            color: [1.0, 1.0, 1.0],
            angular_radius: 0.001,
        }
    }

    fn discrete(stars: Vec<StarSample>) -> BackgroundLayer {
        BackgroundLayer::new(
            StarfieldStrategy::DiscreteStars,
            Arc::new(EnvironmentMap::uniform(2, [0, 0, 0, 255])),
            stars,
            TransformSettings::default(),
        )
    }

    fn lit_pixels(raster: &Raster) -> Vec<(u32, u32)> {
        let mut lit = Vec::new();
        for y in 0..raster.height() {
            for x in 0..raster.width() {
                if raster.get_pixel(x, y).is_some_and(|px| px[3] > 0) {
                    lit.push((x, y));
                }
            }
        }
        lit
    }

    #[test]
    fn test_skybox_fills_every_pixel() {
        let layer = BackgroundLayer::new(
            StarfieldStrategy::Skybox,
            Arc::new(EnvironmentMap::uniform(4, [10, 20, 30, 255])),
            Vec::new(),
            TransformSettings::default(),
        );
        let mut raster = Raster::new(W, H);
        layer.draw(&mut raster, &camera());
        assert_eq!(raster, Raster::filled(W, H, [10, 20, 30, 255]));
    }

    #[test]
    fn test_skybox_is_not_transformed_by_velocity() {
        let env = Arc::new(EnvironmentMap::uniform(4, [10, 20, 30, 255]));
        let mut layer = BackgroundLayer::new(
            StarfieldStrategy::Skybox,
            env,
            Vec::new(),
            TransformSettings::default(),
        );
        let mut at_rest = Raster::new(W, H);
        layer.draw(&mut at_rest, &camera());

        let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.8, 0.999);
        layer.set_velocity(velocity);
        let mut moving = Raster::new(W, H);
        layer.draw(&mut moving, &camera());
        assert_eq!(at_rest, moving);
    }

    #[test]
    fn test_warp_environment_per_strategy() {
        let sky = BackgroundLayer::new(
            StarfieldStrategy::Skybox,
            Arc::new(EnvironmentMap::uniform(2, [0, 0, 0, 255])),
            Vec::new(),
            TransformSettings::default(),
        );
        assert!(sky.warp_environment().is_some());
        assert!(discrete(Vec::new()).warp_environment().is_none());
    }

    #[test]
    fn test_star_at_rest_lands_on_its_projection() {
        let dir = Vec3::new(0.2, 0.1, -1.0);
        let layer = discrete(vec![star(dir)]);
        let mut raster = Raster::new(W, H);
        layer.draw(&mut raster, &camera());

        let expected = camera().project_to_pixel(dir.normalize()).unwrap();
        assert_eq!(lit_pixels(&raster), vec![expected]);
        let px = raster.get_pixel(expected.0, expected.1).unwrap();
        assert_eq!(px, [51, 51, 51, 255]);
    }

    #[test]
    fn test_stars_crowd_toward_heading() {
        let dir = Vec3::new(0.4, 0.0, -1.0);
        let mut layer = discrete(vec![star(dir)]);
        let mut rest = Raster::new(W, H);
        layer.draw(&mut rest, &camera());
        let (rest_x, _) = lit_pixels(&rest)[0];

        let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.5, 0.999);
        layer.set_velocity(velocity);
        let mut moving = Raster::new(W, H);
        layer.draw(&mut moving, &camera());
        let lit = lit_pixels(&moving);
        let center_x = W / 2;
        assert!(
            lit.iter().all(|&(x, _)| x.abs_diff(center_x) < rest_x.abs_diff(center_x)),
            "star should move toward the center: rest x={rest_x}, moving {lit:?}"
        );
    }

    #[test]
    fn test_star_ahead_brightens() {
        let mut layer = discrete(vec![star(Vec3::NEG_Z)]);
        let (velocity, _) = VelocityState::from_speed(Vec3::NEG_Z, 0.3, 0.999);
        layer.set_velocity(velocity);
        let mut raster = Raster::new(W, H);
        layer.draw(&mut raster, &camera());
        let (x, y) = camera().project_to_pixel(Vec3::NEG_Z).unwrap();
        let [_, _, b, _] = raster.get_pixel(x, y).unwrap();
        assert!(b > 51, "star ahead should brighten, got b={b}");
    }

    #[test]
    fn test_star_behind_camera_is_skipped() {
        let layer = discrete(vec![star(Vec3::Z)]);
        let mut raster = Raster::new(W, H);
        layer.draw(&mut raster, &camera());
        assert!(lit_pixels(&raster).is_empty());
    }

    #[test]
    fn test_gr_intensity_is_sanitized() {
        let mut layer = discrete(Vec::new());
        layer.set_gr_intensity(0.4);
        assert_eq!(layer.gr_intensity(), 0.4);
        layer.set_gr_intensity(f32::NAN);
        assert_eq!(layer.gr_intensity(), 0.0);
        layer.set_gr_intensity(-2.0);
        assert_eq!(layer.gr_intensity(), 0.0);
    }

    #[test]
    fn test_from_config_keeps_bright_stars() {
        let config = StarfieldConfig {
            seed: 5,
            star_count: 500,
            bright_star_count: 20,
            cubemap_face_size: 8,
            strategy: StarfieldStrategy::DiscreteStars,
        };
        let layer = BackgroundLayer::from_config(&config, TransformSettings::default());
        assert_eq!(layer.bright_stars().len(), 20);
        assert_eq!(layer.environment().face_size(), 8);
        assert_eq!(layer.strategy(), StarfieldStrategy::DiscreteStars);
    }
}
