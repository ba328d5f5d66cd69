use std::collections::BTreeSet;

use foundation::error::{DomeError, DomeResult};

use crate::layout::RingLayout;
use crate::settings::{BlendRegion, ProjectionSettings};

fn invalid(msg: impl Into<String>) -> DomeError {
    DomeError::InvalidMetadata(msg.into())
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// Checks every numeric range, id and ring-coverage rule of a settings value.
///
/// Pure: nothing is applied. Bad channel positions report
/// `InvalidCoordinates`, everything else `InvalidMetadata`.
pub fn validate(settings: &ProjectionSettings) -> DomeResult<()> {
    if !(settings.dome_radius.is_finite() && settings.dome_radius > 0.0) {
        return Err(invalid(format!(
            "dome radius must be positive, got {}",
            settings.dome_radius
        )));
    }
    if !unit_interval(settings.blend_overlap) {
        return Err(invalid(format!(
            "blend overlap {} outside [0, 1]",
            settings.blend_overlap
        )));
    }
    let fisheye = &settings.fisheye;
    if !unit_interval(fisheye.strength) {
        return Err(invalid(format!(
            "fisheye strength {} outside [0, 1]",
            fisheye.strength
        )));
    }
    if !(unit_interval(fisheye.center_x) && unit_interval(fisheye.center_y)) {
        return Err(invalid(format!(
            "fisheye center ({}, {}) outside the unit square",
            fisheye.center_x, fisheye.center_y
        )));
    }
    if settings.channels.is_empty() {
        return Err(invalid("projection settings contain no channels"));
    }

    let mut seen = BTreeSet::new();
    for ch in &settings.channels {
        if ch.id.is_empty() {
            return Err(invalid("channel id must not be empty"));
        }
        if !seen.insert(ch.id.as_str()) {
            return Err(invalid(format!("duplicate channel id '{}'", ch.id)));
        }
        if ch.resolution.width == 0 || ch.resolution.height == 0 {
            return Err(invalid(format!(
                "channel '{}' has empty resolution {}x{}",
                ch.id, ch.resolution.width, ch.resolution.height
            )));
        }
        ch.position.validate().map_err(|e| {
            DomeError::InvalidCoordinates(format!("channel '{}': {e}", ch.id))
        })?;
        validate_blend_region(&ch.id, &ch.blend_region)?;
    }

    RingLayout::compute(settings).map(|_| ())
}

fn validate_blend_region(id: &str, r: &BlendRegion) -> DomeResult<()> {
    let bounded = [r.left, r.right, r.top, r.bottom]
        .into_iter()
        .all(unit_interval);
    if !bounded {
        return Err(invalid(format!(
            "blend region of channel '{id}' leaves the unit square"
        )));
    }
    if r.left >= r.right || r.top >= r.bottom {
        return Err(invalid(format!(
            "blend region of channel '{id}' is empty or inverted"
        )));
    }
    Ok(())
}
