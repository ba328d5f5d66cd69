use foundation::error::{DomeError, DomeResult};
use foundation::math::DomeCoordinate;

/// Rejects coordinates that are not already normalized; nothing is repaired
/// on the wire.
pub fn dome_coordinate_to_json(coord: &DomeCoordinate) -> DomeResult<String> {
    coord.validate()?;
    serde_json::to_string(coord).map_err(|e| DomeError::InvalidCoordinates(e.to_string()))
}

pub fn dome_coordinate_from_json(json: &str) -> DomeResult<DomeCoordinate> {
    let coord: DomeCoordinate = serde_json::from_str(json)
        .map_err(|e| DomeError::InvalidCoordinates(format!("dome coordinate json: {e}")))?;
    coord.validate()?;
    Ok(coord)
}
