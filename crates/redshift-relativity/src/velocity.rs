//! Frame-latched velocity of the observer.

use std::fmt;

use glam::Vec3;

/// Boost direction reported while at rest. Matches the camera's default forward.
pub const DEFAULT_BOOST_DIRECTION: Vec3 = Vec3::NEG_Z;

/// Lorentz factor `1 / sqrt(1 - beta^2)`.
///
/// Callers keep `|beta| < 1`; [`VelocityState`] guarantees that for its own fields.
pub fn lorentz_gamma(beta: f32) -> f32 {
    1.0 / (1.0 - beta * beta).sqrt()
}

/// Why a requested velocity was not taken as given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityIssue {
    /// A component of the request was NaN or infinite. Treated as rest.
    NonFinite,
    /// Negative speed. Treated as rest.
    NegativeSpeed(f32),
    /// Nonzero speed with a zero-length direction. Treated as rest.
    ZeroDirection,
    /// Speed at or above the ceiling; clamped to it.
    Clamped { requested: f32, ceiling: f32 },
}

impl fmt::Display for VelocityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => write!(f, "non-finite velocity, treating as rest"),
            Self::NegativeSpeed(beta) => {
                write!(f, "negative speed {beta}, treating as rest")
            }
            Self::ZeroDirection => {
                write!(f, "nonzero speed with zero-length direction, treating as rest")
            }
            Self::Clamped { requested, ceiling } => {
                write!(f, "speed {requested} clamped to ceiling {ceiling}")
            }
        }
    }
}

/// Boost direction, speed fraction and Lorentz factor for one frame.
///
/// Fields are private so gamma can never drift from beta: every constructor
/// derives it. The state is replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityState {
    boost_direction: Vec3,
    beta: f32,
    gamma: f32,
}

impl Default for VelocityState {
    fn default() -> Self {
        Self::at_rest()
    }
}

impl VelocityState {
    /// No motion: beta 0, gamma exactly 1.
    pub const fn at_rest() -> Self {
        Self {
            boost_direction: DEFAULT_BOOST_DIRECTION,
            beta: 0.0,
            gamma: 1.0,
        }
    }

    /// Build from a boost vector whose length is the speed fraction.
    ///
    /// Returns the accepted state and, when the input was altered, the reason.
    pub fn from_boost(boost: Vec3, ceiling: f32) -> (Self, Option<VelocityIssue>) {
        if !boost.is_finite() {
            return (Self::at_rest(), Some(VelocityIssue::NonFinite));
        }
        let speed = boost.length();
        if speed == 0.0 {
            return (Self::at_rest(), None);
        }
        Self::from_speed(boost / speed, speed, ceiling)
    }

    /// Build from a direction (any nonzero length) and a speed fraction.
    pub fn from_speed(direction: Vec3, beta: f32, ceiling: f32) -> (Self, Option<VelocityIssue>) {
        if !direction.is_finite() || !beta.is_finite() {
            return (Self::at_rest(), Some(VelocityIssue::NonFinite));
        }
        if beta < 0.0 {
            return (Self::at_rest(), Some(VelocityIssue::NegativeSpeed(beta)));
        }
        if beta == 0.0 {
            let boost_direction = direction.try_normalize().unwrap_or(DEFAULT_BOOST_DIRECTION);
            return (
                Self {
                    boost_direction,
                    ..Self::at_rest()
                },
                None,
            );
        }
        let Some(boost_direction) = direction.try_normalize() else {
            return (Self::at_rest(), Some(VelocityIssue::ZeroDirection));
        };

        let ceiling = sanitize_ceiling(ceiling);
        let (beta, issue) = if beta >= ceiling {
            (
                ceiling,
                Some(VelocityIssue::Clamped {
                    requested: beta,
                    ceiling,
                }),
            )
        } else {
            (beta, None)
        };

        (
            Self {
                boost_direction,
                beta,
                gamma: lorentz_gamma(beta),
            },
            issue,
        )
    }

    /// Unit boost direction in the world frame.
    pub fn boost_direction(&self) -> Vec3 {
        self.boost_direction
    }

    /// Speed as a fraction of c, in `[0, ceiling]`.
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Lorentz factor derived from [`beta`](Self::beta).
    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Boost vector (`direction * beta`).
    pub fn boost(&self) -> Vec3 {
        self.boost_direction * self.beta
    }

    pub fn is_at_rest(&self) -> bool {
        self.beta == 0.0
    }
}

/// A ceiling must sit in `[0, 1)` for gamma to stay finite.
fn sanitize_ceiling(ceiling: f32) -> f32 {
    const HARD_LIMIT: f32 = 0.999_999;
    if ceiling.is_finite() {
        ceiling.clamp(0.0, HARD_LIMIT)
    } else {
        log::debug!("non-finite beta ceiling {ceiling}, using {HARD_LIMIT}");
        HARD_LIMIT
    }
}
