//! Special-relativistic view transform: velocity state, aberration, Doppler shift,
//! beaming, and the per-frame shader parameter set derived from them.
//!
//! Directions are unit vectors pointing from the observer toward a source
//! ("look directions"). With that convention the Doppler factor for a source
//! seen along `n` while moving along `b` is `D = gamma * (1 + beta * n.dot(b))`,
//! so sources ahead are blue-shifted and brightened.

mod doppler;
mod params;
mod star;
mod transform;
mod velocity;
mod view;

pub use doppler::{BLUE_SHIFT_TINT, RED_SHIFT_TINT, TINT_OCTAVES, doppler_tint};
pub use params::ShaderParameters;
pub use star::StarSample;
pub use transform::{
    ApparentSource, ModeShading, RelativisticTransform, TransformLimits, TransformSettings,
    aberrate,
};
pub use velocity::{DEFAULT_BOOST_DIRECTION, VelocityIssue, VelocityState, lorentz_gamma};
pub use view::{CompensationCurve, ViewMode, ViewState};
