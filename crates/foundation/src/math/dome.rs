use serde::{Deserialize, Serialize};

use crate::error::{DomeError, DomeResult};

/// Fold any finite angle in degrees into `[0, 360)`.
#[inline]
pub fn normalize_azimuth(deg: f64) -> f64 {
    let a = deg.rem_euclid(360.0);
    // rem_euclid can round tiny negative inputs up to exactly 360.
    if a >= 360.0 { 0.0 } else { a }
}

/// Direction (and normalized depth) relative to the dome's physical center.
///
/// Invariants, enforced by the constructors:
/// - `azimuth` in `[0, 360)` degrees, normalized modulo 360
/// - `elevation` in `[-90, 90]` degrees, clamped
/// - `distance` in `[0, 1]`, clamped (1 is the dome surface)
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomeCoordinate {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

impl DomeCoordinate {
    /// Normalizing constructor. Non-finite components propagate as NaN; use
    /// [`DomeCoordinate::try_new`] at trust boundaries.
    pub fn new(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            azimuth: normalize_azimuth(azimuth),
            elevation: elevation.clamp(-90.0, 90.0),
            distance: distance.clamp(0.0, 1.0),
        }
    }

    /// A direction on the dome surface.
    pub fn on_surface(azimuth: f64, elevation: f64) -> Self {
        Self::new(azimuth, elevation, 1.0)
    }

    pub fn try_new(azimuth: f64, elevation: f64, distance: f64) -> DomeResult<Self> {
        if !(azimuth.is_finite() && elevation.is_finite() && distance.is_finite()) {
            return Err(DomeError::InvalidCoordinates(format!(
                "non-finite dome coordinate ({azimuth}, {elevation}, {distance})"
            )));
        }
        Ok(Self::new(azimuth, elevation, distance))
    }

    /// True when every component already satisfies the type's invariants.
    pub fn is_normalized(&self) -> bool {
        self.azimuth.is_finite()
            && (0.0..360.0).contains(&self.azimuth)
            && (-90.0..=90.0).contains(&self.elevation)
            && (0.0..=1.0).contains(&self.distance)
    }

    /// Checks the invariants without repairing them.
    pub fn validate(&self) -> DomeResult<()> {
        if self.is_normalized() {
            Ok(())
        } else {
            Err(DomeError::InvalidCoordinates(format!(
                "dome coordinate out of range: azimuth={} elevation={} distance={}",
                self.azimuth, self.elevation, self.distance
            )))
        }
    }

    pub fn is_pole(&self) -> bool {
        self.elevation.abs() >= 90.0
    }
}

impl Default for DomeCoordinate {
    fn default() -> Self {
        Self::on_surface(0.0, 0.0)
    }
}
