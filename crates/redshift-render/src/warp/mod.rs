//! The relativistic warp pass: one full-frame remap of the pre-shader buffer.
//!
//! Each output pixel's apparent look direction is mapped back to the galaxy-frame
//! direction it came from, the pre-shader buffer (or the environment map, for
//! directions that fell outside the frame) is sampled there, and the sample is
//! tinted and scaled by the Doppler factor. Stages implement [`WarpStage`] so the
//! compositor can own one without caring which backend runs it.

mod cpu;
mod disabled;
mod gpu;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use redshift_relativity::{ShaderParameters, TINT_OCTAVES, ViewMode};

use crate::camera::ViewCamera;
use crate::cubemap::EnvironmentMap;
use crate::gpu::GpuContextError;
use crate::raster::Raster;

pub use cpu::CpuWarpStage;
pub use disabled::DisabledWarpStage;
pub use gpu::GpuWarpStage;

/// Failure of a warp stage. The compositor absorbs all of these.
#[derive(Debug, thiserror::Error)]
pub enum WarpError {
    /// The stage cannot run at all (no device, forced off, never initialised).
    #[error("warp stage `{0}` is unavailable")]
    Unavailable(&'static str),

    /// Frame size differs from the size the stage was initialised for.
    #[error(
        "frame is {width}x{height} but warp stage was sized for {expected_width}x{expected_height}"
    )]
    SizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("GPU setup failed: {0}")]
    Context(#[from] GpuContextError),

    /// Shader compile or pipeline link failed.
    #[error("warp pipeline creation failed: {0}")]
    Pipeline(String),

    /// Mapping the readback buffer failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

/// A backend that can warp a frame.
///
/// Lifecycle: [`init`](Self::init) sizes the stage (again after every resize),
/// [`apply`](Self::apply) runs once per frame, [`teardown`](Self::teardown)
/// releases everything. A stage that failed `init` reports
/// [`is_available`](Self::is_available) as false until a later `init` succeeds.
pub trait WarpStage {
    fn label(&self) -> &'static str;

    fn init(&mut self, width: u32, height: u32) -> Result<(), WarpError>;

    fn is_available(&self) -> bool;

    /// Environment sampled where a source direction is outside the frame.
    fn set_environment(&mut self, environment: Option<Arc<EnvironmentMap>>);

    /// Write the warped `source` into `target`. Both must match the init size.
    fn apply(
        &mut self,
        params: &ShaderParameters,
        camera: &ViewCamera,
        source: &Raster,
        target: &mut Raster,
    ) -> Result<(), WarpError>;

    fn teardown(&mut self);
}

/// Pick a stage for this host: the GPU one when requested and a device exists,
/// otherwise the CPU reference stage.
pub fn preferred_warp_stage(prefer_gpu: bool) -> Box<dyn WarpStage> {
    if prefer_gpu {
        match GpuWarpStage::probe() {
            Ok(stage) => return Box::new(stage),
            Err(err) => log::info!("GPU warp stage unavailable ({err}), using CPU stage"),
        }
    }
    Box::new(CpuWarpStage::new())
}

/// Size check shared by every stage.
pub(crate) fn check_sizes(
    expected: (u32, u32),
    source: &Raster,
    target: &Raster,
) -> Result<(), WarpError> {
    for (width, height) in [source.dimensions(), target.dimensions()] {
        if (width, height) != expected {
            return Err(WarpError::SizeMismatch {
                expected_width: expected.0,
                expected_height: expected.1,
                width,
                height,
            });
        }
    }
    Ok(())
}

/// Uniform block read by `fs_warp`. Every member is a `vec4<f32>`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct WarpUniforms {
    /// xyz: unit boost direction, w: effective beta.
    pub boost_beta: [f32; 4],
    /// xyz: camera forward, w: gamma of the effective beta.
    pub forward_gamma: [f32; 4],
    /// xyz: camera right, w: tan(fov_x / 2).
    pub right_tan_x: [f32; 4],
    /// xyz: camera up, w: tan(fov_y / 2).
    pub up_tan_y: [f32; 4],
    /// Beaming exponent, tint strength, min intensity, max intensity.
    pub shading: [f32; 4],
    /// Enabled, has environment, width, height.
    pub flags: [f32; 4],
    /// x: 0 raw / 1 compensated, y: tint octaves.
    pub mode: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<WarpUniforms>(), 112);

impl WarpUniforms {
    pub fn new(params: &ShaderParameters, camera: &ViewCamera, has_environment: bool) -> Self {
        let b = params.boost_direction;
        let f = camera.forward();
        let r = camera.right();
        let u = camera.up();
        let (width, height) = camera.size();
        let flag = |on: bool| if on { 1.0 } else { 0.0 };
        Self {
            boost_beta: [b.x, b.y, b.z, params.beta],
            forward_gamma: [f.x, f.y, f.z, params.gamma],
            right_tan_x: [r.x, r.y, r.z, camera.tan_half_x()],
            up_tan_y: [u.x, u.y, u.z, camera.tan_half_y()],
            shading: [
                params.beaming_exponent,
                params.tint_strength,
                params.min_intensity,
                params.max_intensity,
            ],
            flags: [
                flag(params.enabled),
                flag(has_environment),
                width as f32,
                height as f32,
            ],
            mode: [
                flag(params.mode == ViewMode::Compensated),
                TINT_OCTAVES,
                0.0,
                0.0,
            ],
        }
    }
}

/// WGSL for the warp pass. Mirrors [`CpuWarpStage`] pixel for pixel in intent.
pub const WARP_SHADER_SOURCE: &str = r#"
struct WarpUniforms {
    boost_beta: vec4<f32>,
    forward_gamma: vec4<f32>,
    right_tan_x: vec4<f32>,
    up_tan_y: vec4<f32>,
    shading: vec4<f32>,
    flags: vec4<f32>,
    mode: vec4<f32>,
};

@group(0) @binding(0) var<uniform> warp: WarpUniforms;
@group(0) @binding(1) var source_tex: texture_2d<f32>;
@group(0) @binding(2) var environment_tex: texture_cube<f32>;
@group(0) @binding(3) var environment_sampler: sampler;

const BLUE_SHIFT_TINT: vec3<f32> = vec3<f32>(0.55, 0.7, 1.0);
const RED_SHIFT_TINT: vec3<f32> = vec3<f32>(1.0, 0.45, 0.2);

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    return out;
}

fn aberrate(n: vec3<f32>, b: vec3<f32>, beta: f32) -> vec3<f32> {
    let mu = dot(n, b);
    let n_perp = n - b * mu;
    let denom = 1.0 + beta * mu;
    let parallel = (mu + beta) / denom;
    let perp_scale = sqrt(1.0 - beta * beta) / denom;
    return normalize(b * parallel + n_perp * perp_scale);
}

fn pixel_direction(pixel: vec2<f32>) -> vec3<f32> {
    let size = warp.flags.zw;
    let sx = (pixel.x / size.x * 2.0 - 1.0) * warp.right_tan_x.w;
    let sy = (1.0 - pixel.y / size.y * 2.0) * warp.up_tan_y.w;
    return normalize(warp.forward_gamma.xyz + warp.right_tan_x.xyz * sx + warp.up_tan_y.xyz * sy);
}

fn doppler_tint(d: f32, strength: f32) -> vec3<f32> {
    let s = clamp(log2(d) / warp.mode.y, -1.0, 1.0) * strength;
    if (s >= 0.0) {
        return mix(vec3<f32>(1.0), BLUE_SHIFT_TINT, s);
    }
    return mix(vec3<f32>(1.0), RED_SHIFT_TINT, -s);
}

@fragment
fn fs_warp(in: VertexOutput) -> @location(0) vec4<f32> {
    let pixel = in.position.xy;
    let original = textureLoad(source_tex, vec2<i32>(floor(pixel)), 0);
    let beta = warp.boost_beta.w;
    if (warp.flags.x < 0.5 || beta <= 0.0) {
        return original;
    }

    let b = warp.boost_beta.xyz;
    let apparent = pixel_direction(pixel);
    let source_dir = aberrate(apparent, b, -beta);

    var color = vec4<f32>(0.0);
    var on_screen = false;
    let depth = dot(source_dir, warp.forward_gamma.xyz);
    if (depth > 1e-6) {
        let size = warp.flags.zw;
        let sx = dot(source_dir, warp.right_tan_x.xyz) / depth / warp.right_tan_x.w;
        let sy = dot(source_dir, warp.up_tan_y.xyz) / depth / warp.up_tan_y.w;
        let p = vec2<f32>((sx + 1.0) * 0.5 * size.x, (1.0 - sy) * 0.5 * size.y);
        if (all(p >= vec2<f32>(0.0)) && all(p < size)) {
            color = textureLoad(source_tex, vec2<i32>(floor(p)), 0);
            on_screen = true;
        }
    }
    if (!on_screen && warp.flags.y > 0.5) {
        color = textureSampleLevel(environment_tex, environment_sampler, source_dir, 0.0);
    }

    let d = 1.0 / (warp.forward_gamma.w * (1.0 - beta * dot(apparent, b)));
    let intensity = clamp(pow(d, warp.shading.x), warp.shading.z, warp.shading.w);
    let tint = doppler_tint(d, warp.shading.y);
    return vec4<f32>(clamp(color.rgb * tint * intensity, vec3<f32>(0.0), vec3<f32>(1.0)), color.a);
}
"#;
