//! Geographic <-> dome-spherical conversion.
//!
//! The dome is treated as the celestial sphere of the map: the prime meridian
//! sits at azimuth 0, east is positive azimuth and latitude maps directly onto
//! elevation. Geographic points land on the dome surface (`distance = 1`).
//!
//! At the poles the azimuth is undefined; both directions use 0 there.

use super::dome::{DomeCoordinate, normalize_azimuth};
use crate::error::{DomeError, DomeResult};

pub fn geographic_to_dome(lat: f64, lng: f64) -> DomeResult<DomeCoordinate> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(DomeError::InvalidCoordinates(format!(
            "non-finite geographic position ({lat}, {lng})"
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(DomeError::InvalidCoordinates(format!(
            "latitude {lat} outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(DomeError::InvalidCoordinates(format!(
            "longitude {lng} outside [-180, 180]"
        )));
    }

    let azimuth = if lat.abs() >= 90.0 {
        0.0
    } else {
        normalize_azimuth(lng)
    };
    Ok(DomeCoordinate::new(azimuth, lat, 1.0))
}

/// Returns `(lat, lng)` with `lng` in `[-180, 180)`.
pub fn dome_to_geographic(coord: &DomeCoordinate) -> DomeResult<(f64, f64)> {
    coord.validate()?;

    let lat = coord.elevation;
    if coord.is_pole() {
        return Ok((lat, 0.0));
    }
    let lng = if coord.azimuth >= 180.0 {
        coord.azimuth - 360.0
    } else {
        coord.azimuth
    };
    Ok((lat, lng))
}

/// Signed shortest rotation from `from` to `to`, in `[-180, 180)` degrees.
#[inline]
pub fn azimuth_delta(from: f64, to: f64) -> f64 {
    (to - from + 180.0).rem_euclid(360.0) - 180.0
}

/// Great-circle angle between two dome directions, in degrees.
pub fn angular_distance(a: &DomeCoordinate, b: &DomeCoordinate) -> f64 {
    let (lat1, lat2) = (a.elevation.to_radians(), b.elevation.to_radians());
    let dlon = azimuth_delta(a.azimuth, b.azimuth).to_radians();

    // Vincenty form stays well conditioned for both tiny and antipodal angles.
    let y = ((lat2.cos() * dlon.sin()).powi(2)
        + (lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos()).powi(2))
    .sqrt();
    let x = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * dlon.cos();
    y.atan2(x).to_degrees()
}
