use foundation::error::{DomeError, DomeResult};
use projection::settings::ProjectionSettings;
use projection::validate::validate;

/// Parses and validates a settings document.
///
/// `blendRegion` defaults to the whole footprint and `fisheye` to disabled
/// when omitted; any other missing or unknown field is an error.
pub fn settings_from_json(json: &str) -> DomeResult<ProjectionSettings> {
    let settings: ProjectionSettings = serde_json::from_str(json)
        .map_err(|e| DomeError::InvalidMetadata(format!("projection settings json: {e}")))?;
    validate(&settings)?;
    Ok(settings)
}

pub fn settings_to_json(settings: &ProjectionSettings) -> DomeResult<String> {
    validate(settings)?;
    serde_json::to_string_pretty(settings)
        .map_err(|e| DomeError::InvalidMetadata(e.to_string()))
}
