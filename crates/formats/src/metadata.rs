use foundation::error::{DomeError, DomeResult};
use projection::frame::EquirectangularMetadata;

pub fn metadata_to_json(meta: &EquirectangularMetadata) -> DomeResult<String> {
    meta.validate()?;
    serde_json::to_string(meta).map_err(|e| DomeError::InvalidMetadata(e.to_string()))
}

pub fn metadata_from_json(json: &str) -> DomeResult<EquirectangularMetadata> {
    let meta: EquirectangularMetadata = serde_json::from_str(json)
        .map_err(|e| DomeError::InvalidMetadata(format!("frame metadata json: {e}")))?;
    meta.validate()?;
    Ok(meta)
}
