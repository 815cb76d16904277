//! Doppler factor to color tint.

/// Tint applied at full strength for a strong blue shift (D >= 4).
pub const BLUE_SHIFT_TINT: [f32; 3] = [0.55, 0.7, 1.0];

/// Tint applied at full strength for a strong red shift (D <= 1/4).
pub const RED_SHIFT_TINT: [f32; 3] = [1.0, 0.45, 0.2];

/// Octaves of Doppler factor over which the tint ramps to full strength.
pub const TINT_OCTAVES: f32 = 2.0;

/// Multiplicative RGB tint for Doppler factor `d`.
///
/// `d == 1` is exactly white. The ramp is linear in `log2(d)` and saturates at
/// [`TINT_OCTAVES`]; `strength` in `[0, 1]` scales how far toward the shift
/// color it goes.
pub fn doppler_tint(d: f32, strength: f32) -> [f32; 3] {
    if !(d.is_finite() && d > 0.0) {
        return [1.0; 3];
    }
    let s = (d.log2() / TINT_OCTAVES).clamp(-1.0, 1.0) * strength.clamp(0.0, 1.0);
    let (target, t) = if s >= 0.0 {
        (BLUE_SHIFT_TINT, s)
    } else {
        (RED_SHIFT_TINT, -s)
    };
    [
        1.0 + (target[0] - 1.0) * t,
        1.0 + (target[1] - 1.0) * t,
        1.0 + (target[2] - 1.0) * t,
    ]
}
