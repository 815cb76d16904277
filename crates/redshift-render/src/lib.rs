//! CPU rasters, 2D draw commands, the view camera, environment cubemaps, and the
//! warp stages (wgpu and CPU) that apply the relativistic remap to a frame.

pub mod camera;
pub mod cubemap;
pub mod draw;
pub mod font;
pub mod gpu;
pub mod raster;
pub mod warp;

pub use camera::ViewCamera;
pub use cubemap::{EnvironmentMap, direction_to_cube_face_uv};
pub use draw::DrawCommand;
pub use gpu::{GpuContext, GpuContextError};
pub use raster::{OPAQUE_BLACK, Raster, RasterError, Rgba, TRANSPARENT};
pub use warp::{
    CpuWarpStage, DisabledWarpStage, GpuWarpStage, WARP_SHADER_SOURCE, WarpError, WarpStage,
    WarpUniforms, preferred_warp_stage,
};
