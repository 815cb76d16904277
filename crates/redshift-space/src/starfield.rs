//! Procedural star catalog and its cubemap bake.
//!
//! The catalog is a pure function of the seed, so every run (and every test)
//! sees the same sky.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use redshift_relativity::StarSample;
use redshift_render::{EnvironmentMap, direction_to_cube_face_uv};

/// Catalog brightness to baked pixel level. Dim stars still get a visible floor.
const BAKE_GAIN: f32 = 8.0;
const BAKE_FLOOR: f32 = 0.4;
/// Stars brighter than this bleed into their four neighbours.
const GLOW_THRESHOLD: f32 = 0.3;

/// Deterministic star catalog generator.
pub struct StarfieldGenerator {
    seed: u64,
    star_count: u32,
}

impl StarfieldGenerator {
    pub fn new(seed: u64, star_count: u32) -> Self {
        Self { seed, star_count }
    }

    /// Uniform on the sphere, power-law brightness, blackbody color.
    pub fn generate(&self) -> Vec<StarSample> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        (0..self.star_count)
            .map(|_| {
                let azimuth = rng.random::<f32>() * std::f32::consts::TAU;
                let z: f32 = 1.0 - 2.0 * rng.random::<f32>();
                let ring = (1.0 - z * z).max(0.0).sqrt();
                let direction = Vec3::new(ring * azimuth.cos(), ring * azimuth.sin(), z).normalize();

                let brightness = rng.random::<f32>().powi(4);
                StarSample {
                    direction,
                    brightness,
                    color: blackbody_to_rgb(2000.0 + brightness * 28000.0),
                    angular_radius: 0.0001 + brightness * 0.001,
                }
            })
            .collect()
    }
}

/// The `count` brightest stars, brightest first.
pub fn brightest(stars: &[StarSample], count: usize) -> Vec<StarSample> {
    let mut sorted = stars.to_vec();
    sorted.sort_by(|a, b| b.brightness.total_cmp(&a.brightness));
    sorted.truncate(count);
    sorted
}

/// Approximate color of a blackbody at `temperature_k` Kelvin (Tanner Helland fit).
pub fn blackbody_to_rgb(temperature_k: f32) -> [f32; 3] {
    let t = temperature_k / 100.0;
    let r = if t <= 66.0 {
        1.0
    } else {
        (329.698_73 * (t - 60.0).powf(-0.133_204_76) / 255.0).clamp(0.0, 1.0)
    };
    let g = if t <= 66.0 {
        (99.470_8 * t.ln() - 161.119_57).clamp(0.0, 255.0) / 255.0
    } else {
        (288.122_17 * (t - 60.0).powf(-0.075_514_85) / 255.0).clamp(0.0, 1.0)
    };
    let b = if t >= 66.0 {
        1.0
    } else if t <= 19.0 {
        0.0
    } else {
        (138.517_73 * (t - 10.0).ln() - 305.044_8).clamp(0.0, 255.0) / 255.0
    };
    [r, g, b]
}

/// Linear RGB cubemap of a star catalog, before quantisation.
pub struct StarfieldCubemap {
    pub face_size: u32,
    /// Six faces of `face_size * face_size` RGB texels, 0+X 1-X 2+Y 3-Y 4+Z 5-Z.
    pub faces: [Vec<[f32; 3]>; 6],
}

impl StarfieldCubemap {
    /// Splat every star into the face its direction hits.
    pub fn render(stars: &[StarSample], face_size: u32) -> Self {
        let face_size = face_size.max(1);
        let texels = face_size as usize * face_size as usize;
        let mut cubemap = Self {
            face_size,
            faces: std::array::from_fn(|_| vec![[0.0; 3]; texels]),
        };

        for star in stars {
            let (face, u, v) = direction_to_cube_face_uv(star.direction);
            let last = face_size as f32 - 1.0;
            let px = (u * face_size as f32).min(last) as i32;
            let py = (v * face_size as f32).min(last) as i32;

            let level = star.brightness * BAKE_GAIN + BAKE_FLOOR;
            cubemap.accumulate(face, px, py, star.color, level);

            if star.brightness > GLOW_THRESHOLD {
                let glow = star.brightness * 0.6;
                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    cubemap.accumulate(face, px + dx, py + dy, star.color, glow);
                }
            }
        }
        cubemap
    }

    fn accumulate(&mut self, face: usize, x: i32, y: i32, color: [f32; 3], level: f32) {
        let size = self.face_size as i32;
        if x < 0 || y < 0 || x >= size || y >= size {
            return;
        }
        let texel = &mut self.faces[face][(y * size + x) as usize];
        for (c, add) in texel.iter_mut().zip(color) {
            *c = (*c + add * level).min(1.0);
        }
    }

    /// Quantise to an opaque RGBA8 environment map.
    pub fn bake(&self) -> EnvironmentMap {
        let faces = std::array::from_fn(|i| {
            self.faces[i]
                .iter()
                .flat_map(|rgb| {
                    let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                    [q(rgb[0]), q(rgb[1]), q(rgb[2]), 255]
                })
                .collect()
        });
        // Faces are built from `face_size`, so the shape always matches.
        match EnvironmentMap::from_faces(self.face_size, faces) {
            Ok(env) => env,
            Err(err) => {
                log::error!("starfield bake produced malformed faces: {err}");
                EnvironmentMap::uniform(self.face_size, [0, 0, 0, 255])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<StarSample> {
        StarfieldGenerator::new(42, 5000).generate()
    }

    #[test]
    fn test_star_count() {
        assert_eq!(catalog().len(), 5000);
    }

    #[test]
    fn test_star_brightness_in_valid_range() {
        for (i, star) in catalog().iter().enumerate() {
            assert!(
                (0.0..=1.0).contains(&star.brightness),
                "Star {i} has brightness {} outside [0, 1]",
                star.brightness
            );
        }
    }

    #[test]
    fn test_star_directions_are_unit_vectors() {
        for (i, star) in catalog().iter().enumerate() {
            let len = star.direction.length();
            assert!(
                (len - 1.0).abs() < 1e-5,
                "Star {i} direction is not a unit vector: length = {len}"
            );
        }
    }

    #[test]
    fn test_star_distribution_covers_full_sky() {
        let mut octant_counts = [0u32; 8];
        for star in &catalog() {
            let d = star.direction;
            let octant = ((d.x >= 0.0) as usize)
                | (((d.y >= 0.0) as usize) << 1)
                | (((d.z >= 0.0) as usize) << 2);
            octant_counts[octant] += 1;
        }
        for (i, &count) in octant_counts.iter().enumerate() {
            assert!(
                (300..=900).contains(&count),
                "Octant {i} has {count} stars, expected roughly 625"
            );
        }
    }

    #[test]
    fn test_same_seed_same_sky() {
        let a = StarfieldGenerator::new(123, 1000).generate();
        let b = StarfieldGenerator::new(123, 1000).generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_sky() {
        let a = StarfieldGenerator::new(1, 1000).generate();
        let b = StarfieldGenerator::new(9999, 1000).generate();
        let differences = a
            .iter()
            .zip(&b)
            .filter(|(a, b)| (a.direction - b.direction).length() > 0.01)
            .count();
        assert!(
            differences > 500,
            "Expected most stars to differ between seeds, only {differences}/1000 differed"
        );
    }

    #[test]
    fn test_brightness_distribution_skews_dim() {
        let stars = catalog();
        let dim = stars.iter().filter(|s| s.brightness < 0.1).count();
        let bright = stars.iter().filter(|s| s.brightness > 0.5).count();
        assert!(
            dim > bright * 3,
            "Expected many more dim stars ({dim}) than bright stars ({bright})"
        );
    }

    #[test]
    fn test_brightest_is_sorted_and_truncated() {
        let stars = catalog();
        let top = brightest(&stars, 50);
        assert_eq!(top.len(), 50);
        assert!(top.windows(2).all(|w| w[0].brightness >= w[1].brightness));
        let faintest_kept = top[49].brightness;
        let brighter_elsewhere = stars.iter().filter(|s| s.brightness > faintest_kept).count();
        assert!(brighter_elsewhere < 50);
    }

    #[test]
    fn test_brightest_more_than_catalog() {
        let stars = StarfieldGenerator::new(7, 10).generate();
        assert_eq!(brightest(&stars, 100).len(), 10);
    }

    #[test]
    fn test_blackbody_red_at_low_temperature() {
        let color = blackbody_to_rgb(2000.0);
        assert!(color[0] > color[2], "At 2000K red should exceed blue: {color:?}");
    }

    #[test]
    fn test_blackbody_blue_at_high_temperature() {
        let color = blackbody_to_rgb(30000.0);
        assert!(color[2] > 0.5, "At 30000K blue should be high: {color:?}");
    }

    #[test]
    fn test_cubemap_has_lit_texels() {
        let cubemap = StarfieldCubemap::render(&catalog(), 128);
        let lit: usize = cubemap
            .faces
            .iter()
            .map(|face| face.iter().filter(|t| t.iter().any(|&c| c > 0.0)).count())
            .sum();
        assert!(lit > 100, "Expected many lit texels, got {lit}");
    }

    #[test]
    fn test_bake_is_opaque_and_sized() {
        let stars = StarfieldGenerator::new(42, 100).generate();
        let env = StarfieldCubemap::render(&stars, 16).bake();
        assert_eq!(env.face_size(), 16);
        for face in env.faces() {
            assert_eq!(face.len(), 16 * 16 * 4);
            assert!(face.chunks_exact(4).all(|px| px[3] == 255));
        }
    }

    #[test]
    fn test_single_star_lands_where_sampled() {
        let star = StarSample {
            direction: Vec3::new(0.1, 0.2, -1.0).normalize(),
            brightness: 1.0,
            color: [1.0, 1.0, 1.0],
            angular_radius: 0.001,
        };
        let env = StarfieldCubemap::render(&[star], 64).bake();
        assert_eq!(env.sample(star.direction), [255, 255, 255, 255]);
    }
}
