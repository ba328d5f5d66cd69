use crate::settings::FisheyeSettings;

/// Radial lens remap of a normalized frame position.
///
/// `p' = c + d * (1 + k * |d|^2)` with `d = p - c` and `k = strength`.
/// Positive strength pushes points away from the center (barrel); the remap
/// is the identity when disabled or at zero strength.
pub fn remap(fisheye: &FisheyeSettings, u: f64, v: f64) -> (f64, f64) {
    if !fisheye.enabled || fisheye.strength == 0.0 {
        return (u, v);
    }
    let (du, dv) = (u - fisheye.center_x, v - fisheye.center_y);
    let scale = 1.0 + fisheye.strength * (du * du + dv * dv);
    (fisheye.center_x + du * scale, fisheye.center_y + dv * scale)
}
