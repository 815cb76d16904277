use std::sync::Arc;

use redshift_relativity::ShaderParameters;

use super::{WarpError, WarpStage, check_sizes};
use crate::camera::ViewCamera;
use crate::cubemap::EnvironmentMap;
use crate::raster::{Raster, Rgba, TRANSPARENT};

/// Reference warp on the CPU. Deterministic; always available once initialised.
#[derive(Debug, Default)]
pub struct CpuWarpStage {
    size: Option<(u32, u32)>,
    environment: Option<Arc<EnvironmentMap>>,
}

impl CpuWarpStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WarpStage for CpuWarpStage {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn init(&mut self, width: u32, height: u32) -> Result<(), WarpError> {
        self.size = Some((width.max(1), height.max(1)));
        log::debug!("CPU warp stage sized to {width}x{height}");
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.size.is_some()
    }

    fn set_environment(&mut self, environment: Option<Arc<EnvironmentMap>>) {
        self.environment = environment;
    }

    fn apply(
        &mut self,
        params: &ShaderParameters,
        camera: &ViewCamera,
        source: &Raster,
        target: &mut Raster,
    ) -> Result<(), WarpError> {
        let size = self.size.ok_or(WarpError::Unavailable("cpu"))?;
        check_sizes(size, source, target)?;

        let transform = params.transform();
        if !params.enabled || transform.is_identity() {
            target.as_bytes_mut().copy_from_slice(source.as_bytes());
            return Ok(());
        }
        let camera = camera.with_size(size.0, size.1);

        for y in 0..size.1 {
            for x in 0..size.0 {
                let apparent = camera.pixel_direction(x as f32, y as f32);
                let source_dir = transform.source_direction(apparent);
                let sample = match camera.project_to_pixel(source_dir) {
                    Some((sx, sy)) => source.get_pixel(sx, sy).unwrap_or(TRANSPARENT),
                    None => self
                        .environment
                        .as_deref()
                        .map_or(TRANSPARENT, |env| env.sample(source_dir)),
                };

                let d = transform.doppler_factor_apparent(apparent);
                let intensity = transform.beaming(d);
                let tint = transform.tint(d);
                target.set_pixel(x, y, shade(sample, tint, intensity));
            }
        }
        Ok(())
    }

    fn teardown(&mut self) {
        self.size = None;
        self.environment = None;
    }
}

fn shade(sample: Rgba, tint: [f32; 3], intensity: f32) -> Rgba {
    let channel = |c: u8, t: f32| (c as f32 * t * intensity).clamp(0.0, 255.0).round() as u8;
    [
        channel(sample[0], tint[0]),
        channel(sample[1], tint[1]),
        channel(sample[2], tint[2]),
        sample[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use redshift_relativity::{TransformSettings, VelocityState, ViewMode, ViewState};

    const W: u32 = 48;
    const H: u32 = 32;

    fn camera() -> ViewCamera {
        ViewCamera::new(Vec3::NEG_Z, Vec3::Y, 70f32.to_radians(), W, H)
    }

    fn params(beta: f32, boost: Vec3, mode: ViewMode) -> ShaderParameters {
        let (velocity, _) = VelocityState::from_speed(boost, beta, 0.999);
        let view = ViewState {
            forward: Vec3::NEG_Z,
            mode,
        };
        ShaderParameters::new(&velocity, &view, &TransformSettings::default(), true)
    }

    fn gradient() -> Raster {
        let mut r = Raster::new(W, H);
        for y in 0..H {
            for x in 0..W {
                r.set_pixel(x, y, [(x * 5) as u8, (y * 7) as u8, 90, 255]);
            }
        }
        r
    }

    fn ready_stage() -> CpuWarpStage {
        let mut stage = CpuWarpStage::new();
        stage.init(W, H).unwrap();
        stage
    }

    #[test]
    fn test_unavailable_before_init() {
        let mut stage = CpuWarpStage::new();
        assert!(!stage.is_available());
        let src = gradient();
        let mut dst = Raster::new(W, H);
        let result = stage.apply(&params(0.5, Vec3::NEG_Z, ViewMode::Raw), &camera(), &src, &mut dst);
        assert!(matches!(result, Err(WarpError::Unavailable(_))));
    }

    #[test]
    fn test_rest_is_exact_copy() {
        let mut stage = ready_stage();
        let src = gradient();
        let mut dst = Raster::new(W, H);
        stage
            .apply(&params(0.0, Vec3::X, ViewMode::Raw), &camera(), &src, &mut dst)
            .unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut stage = ready_stage();
        let src = Raster::new(W + 1, H);
        let mut dst = Raster::new(W + 1, H);
        let result = stage.apply(&params(0.5, Vec3::NEG_Z, ViewMode::Raw), &camera(), &src, &mut dst);
        assert!(matches!(result, Err(WarpError::SizeMismatch { .. })));
    }

    #[test]
    fn test_forward_motion_brightens_and_blues_center() {
        let mut stage = ready_stage();
        let src = Raster::filled(W, H, [100, 100, 100, 255]);
        let mut dst = Raster::new(W, H);
        stage
            .apply(&params(0.3, Vec3::NEG_Z, ViewMode::Raw), &camera(), &src, &mut dst)
            .unwrap();
        let [r, _, b, a] = dst.get_pixel(W / 2, H / 2).unwrap();
        assert_eq!(a, 255);
        assert!(b > 100, "center should brighten, got b={b}");
        assert!(b >= r, "center should lean blue, got r={r} b={b}");
    }

    #[test]
    fn test_backward_motion_darkens_center() {
        let mut stage = ready_stage();
        let src = Raster::filled(W, H, [100, 100, 100, 255]);
        let mut dst = Raster::new(W, H);
        stage
            .apply(&params(0.3, Vec3::Z, ViewMode::Raw), &camera(), &src, &mut dst)
            .unwrap();
        let [r, g, b, _] = dst.get_pixel(W / 2, H / 2).unwrap();
        assert!(r < 100 && g < 100 && b < 100, "center should darken, got {r},{g},{b}");
    }

    #[test]
    fn test_edges_fall_back_to_environment() {
        // Moving forward, edge pixels look at sources outside the frame.
        let mut stage = ready_stage();
        let src = Raster::filled(W, H, [0, 0, 0, 0]);
        let mut dst = Raster::new(W, H);
        let p = params(0.9, Vec3::NEG_Z, ViewMode::Raw);

        stage.apply(&p, &camera(), &src, &mut dst).unwrap();
        assert_eq!(dst.get_pixel(0, 0).map(|px| px[3]), Some(0));

        stage.set_environment(Some(Arc::new(EnvironmentMap::uniform(4, [40, 40, 40, 255]))));
        stage.apply(&p, &camera(), &src, &mut dst).unwrap();
        assert_eq!(dst.get_pixel(0, 0).map(|px| px[3]), Some(255));
    }

    #[test]
    fn test_compensated_changes_fewer_pixels() {
        let src = gradient();
        let mut raw = Raster::new(W, H);
        let mut nav = Raster::new(W, H);
        let mut stage = ready_stage();
        let boost = Vec3::new(0.3, 0.0, -1.0);
        stage
            .apply(&params(0.8, boost, ViewMode::Raw), &camera(), &src, &mut raw)
            .unwrap();
        stage
            .apply(&params(0.8, boost, ViewMode::Compensated), &camera(), &src, &mut nav)
            .unwrap();

        let diff = |out: &Raster| -> u64 {
            out.as_bytes()
                .iter()
                .zip(src.as_bytes())
                .map(|(a, b)| (*a as i64 - *b as i64).unsigned_abs())
                .sum()
        };
        assert!(diff(&nav) < diff(&raw));
    }

    #[test]
    fn test_teardown_makes_unavailable() {
        let mut stage = ready_stage();
        stage.teardown();
        assert!(!stage.is_available());
    }
}
