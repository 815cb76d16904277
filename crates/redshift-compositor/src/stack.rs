//! Layered offscreen buffers with a single warp boundary.
//!
//! Layers are kept in draw order. Every warped layer precedes every exempt
//! layer, so the one shader pass has exactly one place to run: after the warped
//! layers are flattened into the pre-shader buffer and before any exempt layer
//! touches the output.

use redshift_config::StarfieldStrategy;
use redshift_render::{Raster, TRANSPARENT};

pub const BACKGROUND_LAYER: &str = "background";
pub const FOREGROUND_LAYER: &str = "foreground";
pub const HUD_LAYER: &str = "hud";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("warped layer `{layer}` cannot be drawn after exempt layer `{exempt}`")]
    ExemptBeforeWarped {
        layer: &'static str,
        exempt: &'static str,
    },

    #[error("layer `{0}` already exists")]
    DuplicateLayer(&'static str),
}

/// How a layer is flattened onto what lies below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    /// Source-over: the layer covers what is already there.
    Over,
    /// The layer only shows through where the accumulated image is not opaque.
    Under,
}

#[derive(Debug, Clone)]
pub struct Layer {
    name: &'static str,
    warp_exempt: bool,
    blend: Blend,
    raster: Raster,
}

impl Layer {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_warp_exempt(&self) -> bool {
        self.warp_exempt
    }

    pub fn blend(&self) -> Blend {
        self.blend
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    fn flatten_onto(&self, target: &mut Raster) {
        match self.blend {
            Blend::Over => target.composite_over(&self.raster),
            Blend::Under => target.composite_under(&self.raster),
        }
    }
}

/// The compositor's buffers: named layers, the pre-shader buffer and the output.
///
/// Allocated once at output resolution. [`clear`](Self::clear) reuses every
/// allocation; only [`resize`](Self::resize) reallocates.
#[derive(Debug, Clone)]
pub struct FrameBufferStack {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    pre_shader: Raster,
    output: Raster,
}

impl FrameBufferStack {
    /// An empty stack; add layers with [`push_layer`](Self::push_layer).
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            layers: Vec::new(),
            pre_shader: Raster::new(width, height),
            output: Raster::new(width, height),
        }
    }

    /// The layer order the compositor uses for a background strategy.
    ///
    /// With discrete stars the sky is already transformed on the CPU, so the
    /// background becomes an exempt layer slid under the warped foreground.
    pub fn standard(strategy: StarfieldStrategy, width: u32, height: u32) -> Self {
        let mut stack = Self::new(width, height);
        let order: &[(&'static str, bool, Blend)] = match strategy {
            StarfieldStrategy::Skybox => &[
                (BACKGROUND_LAYER, false, Blend::Over),
                (FOREGROUND_LAYER, false, Blend::Over),
                (HUD_LAYER, true, Blend::Over),
            ],
            StarfieldStrategy::DiscreteStars => &[
                (FOREGROUND_LAYER, false, Blend::Over),
                (BACKGROUND_LAYER, true, Blend::Under),
                (HUD_LAYER, true, Blend::Over),
            ],
        };
        for &(name, warp_exempt, blend) in order {
            stack.layers.push(Layer {
                name,
                warp_exempt,
                blend,
                raster: Raster::new(stack.width, stack.height),
            });
        }
        stack
    }

    /// Append a layer on top of the existing ones.
    pub fn push_layer(
        &mut self,
        name: &'static str,
        warp_exempt: bool,
        blend: Blend,
    ) -> Result<(), StackError> {
        if self.layers.iter().any(|l| l.name == name) {
            return Err(StackError::DuplicateLayer(name));
        }
        if !warp_exempt {
            if let Some(exempt) = self.layers.iter().find(|l| l.warp_exempt) {
                return Err(StackError::ExemptBeforeWarped {
                    layer: name,
                    exempt: exempt.name,
                });
            }
        }
        self.layers.push(Layer {
            name,
            warp_exempt,
            blend,
            raster: Raster::new(self.width, self.height),
        });
        Ok(())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&Raster> {
        self.layers.iter().find(|l| l.name == name).map(|l| &l.raster)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Raster> {
        self.layers
            .iter_mut()
            .find(|l| l.name == name)
            .map(|l| &mut l.raster)
    }

    pub fn is_warp_exempt(&self, name: &str) -> Option<bool> {
        self.layers
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.warp_exempt)
    }

    /// Clear every buffer to transparent without reallocating.
    pub fn clear(&mut self) {
        for layer in &mut self.layers {
            layer.raster.clear(TRANSPARENT);
        }
        self.pre_shader.clear(TRANSPARENT);
        self.output.clear(TRANSPARENT);
    }

    /// Reallocate every buffer at a new size. Layer order is kept.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        for layer in &mut self.layers {
            layer.raster.resize(self.width, self.height);
        }
        self.pre_shader.resize(self.width, self.height);
        self.output.resize(self.width, self.height);
        log::debug!("Frame buffers reallocated at {}x{}", self.width, self.height);
    }

    /// Flatten the warped layers, in order, into the pre-shader buffer.
    pub fn compose_pre_shader(&mut self) {
        self.pre_shader.clear(TRANSPARENT);
        for layer in self.layers.iter().filter(|l| !l.warp_exempt) {
            layer.flatten_onto(&mut self.pre_shader);
        }
    }

    /// The warp pass reads the pre-shader buffer and writes the output.
    pub fn shader_io(&mut self) -> (&Raster, &mut Raster) {
        (&self.pre_shader, &mut self.output)
    }

    /// The unwarped path: output becomes a copy of the pre-shader buffer.
    pub fn copy_unwarped(&mut self) {
        self.output
            .as_bytes_mut()
            .copy_from_slice(self.pre_shader.as_bytes());
    }

    /// Flatten the exempt layers, in order, onto the output.
    pub fn compose_exempt(&mut self) {
        for layer in self.layers.iter().filter(|l| l.warp_exempt) {
            layer.flatten_onto(&mut self.output);
        }
    }

    pub fn pre_shader(&self) -> &Raster {
        &self.pre_shader
    }

    pub fn output(&self) -> &Raster {
        &self.output
    }
}
