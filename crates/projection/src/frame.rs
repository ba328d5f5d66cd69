use foundation::error::{DomeError, DomeResult};
use foundation::math::DomeCoordinate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    Equirectangular,
    Cylindrical,
    Spherical,
}

impl ProjectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectionKind::Equirectangular => "equirectangular",
            ProjectionKind::Cylindrical => "cylindrical",
            ProjectionKind::Spherical => "spherical",
        }
    }
}

/// Metadata of one equirectangular frame produced by the render engine.
///
/// The frame covers azimuth `[0, field_of_view)` left to right and an
/// elevation band of `field_of_view / 2` centered on the horizon, top to
/// bottom. A full 360° frame is the usual 2:1 equirectangular panorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EquirectangularMetadata {
    pub width: u32,
    pub height: u32,
    pub field_of_view: f64,
    pub projection_kind: ProjectionKind,
    pub dome_optimized: bool,
}

impl EquirectangularMetadata {
    /// Full-sphere equirectangular frame.
    pub fn panorama(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            field_of_view: 360.0,
            projection_kind: ProjectionKind::Equirectangular,
            dome_optimized: true,
        }
    }

    pub fn validate(&self) -> DomeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DomeError::InvalidMetadata(format!(
                "frame size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view <= 360.0) {
            return Err(DomeError::InvalidMetadata(format!(
                "field of view {} outside (0, 360]",
                self.field_of_view
            )));
        }
        Ok(())
    }

    pub fn is_full_circle(&self) -> bool {
        self.field_of_view >= 360.0
    }

    /// Half of the vertical coverage, in degrees of elevation.
    pub fn half_vertical_fov(&self) -> f64 {
        (self.field_of_view / 4.0).min(90.0)
    }

    /// Horizontal frame coordinate of `azimuth`; 1.0 is the right edge.
    pub fn u_of_azimuth(&self, azimuth: f64) -> f64 {
        azimuth / self.field_of_view
    }

    /// Vertical frame coordinate of `elevation`; 0 is the top edge.
    ///
    /// Values outside `[0, 1]` lie above or below the frame.
    pub fn v_of_elevation(&self, elevation: f64) -> f64 {
        let half = self.half_vertical_fov();
        match self.projection_kind {
            ProjectionKind::Equirectangular | ProjectionKind::Spherical => {
                (half - elevation) / (2.0 * half)
            }
            ProjectionKind::Cylindrical => {
                let top = half.to_radians().sin();
                (top - elevation.clamp(-90.0, 90.0).to_radians().sin()) / (2.0 * top)
            }
        }
    }

    /// Normalized frame position of a dome direction.
    pub fn project(&self, coord: &DomeCoordinate) -> (f64, f64) {
        (
            self.u_of_azimuth(coord.azimuth),
            self.v_of_elevation(coord.elevation),
        )
    }

    /// Azimuth at the center of pixel column `x`.
    pub fn azimuth_of_column(&self, x: f64) -> f64 {
        (x + 0.5) / self.width as f64 * self.field_of_view
    }
}

/// Source rectangle inside a frame, in pixels.
///
/// For 360° frames `x + width` may exceed the frame width; sampling then
/// continues from column 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn wraps(&self, frame_width: u32) -> bool {
        self.x as u64 + self.width as u64 > frame_width as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
