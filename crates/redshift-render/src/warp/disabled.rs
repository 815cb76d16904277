use std::sync::Arc;

use redshift_relativity::ShaderParameters;

use super::{WarpError, WarpStage};
use crate::camera::ViewCamera;
use crate::cubemap::EnvironmentMap;
use crate::raster::Raster;

/// A stage that never runs. Used when warping is switched off at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledWarpStage;

impl WarpStage for DisabledWarpStage {
    fn label(&self) -> &'static str {
        "disabled"
    }

    fn init(&mut self, _width: u32, _height: u32) -> Result<(), WarpError> {
        Err(WarpError::Unavailable("disabled"))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn set_environment(&mut self, _environment: Option<Arc<EnvironmentMap>>) {}

    fn apply(
        &mut self,
        _params: &ShaderParameters,
        _camera: &ViewCamera,
        _source: &Raster,
        _target: &mut Raster,
    ) -> Result<(), WarpError> {
        Err(WarpError::Unavailable("disabled"))
    }

    fn teardown(&mut self) {}
}
