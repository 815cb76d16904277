//! Background sky: a deterministic star catalog, its baked cubemap, and the
//! layer that draws either of them under the current velocity.

pub mod background;
pub mod starfield;

pub use background::BackgroundLayer;
pub use starfield::{StarfieldCubemap, StarfieldGenerator, blackbody_to_rgb, brightest};
