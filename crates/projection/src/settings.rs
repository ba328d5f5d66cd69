use foundation::math::DomeCoordinate;
use serde::{Deserialize, Serialize};

/// Projector resolution in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Normalized sub-rectangle of a channel's footprint, `(0,0)` top-left.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlendRegion {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl BlendRegion {
    /// The whole footprint.
    pub fn full() -> Self {
        Self {
            left: 0.0,
            right: 1.0,
            top: 0.0,
            bottom: 1.0,
        }
    }

    pub fn contains(&self, u: f64, v: f64) -> bool {
        (self.left..=self.right).contains(&u) && (self.top..=self.bottom).contains(&v)
    }
}

impl Default for BlendRegion {
    fn default() -> Self {
        Self::full()
    }
}

/// One physical projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Center of the projector's footprint on the dome.
    pub position: DomeCoordinate,
    pub resolution: Resolution,
    #[serde(default)]
    pub blend_region: BlendRegion,
}

impl Channel {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        position: DomeCoordinate,
        resolution: Resolution,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            resolution,
            blend_region: BlendRegion::full(),
        }
    }

    /// Azimuth extent in degrees. `dome_radius` is in dome-surface pixels, so
    /// the footprint's arc length in pixels equals the resolution.
    pub fn horizontal_span_deg(&self, dome_radius: f64) -> f64 {
        (self.resolution.width as f64 / dome_radius).to_degrees()
    }

    /// Elevation extent in degrees.
    pub fn vertical_span_deg(&self, dome_radius: f64) -> f64 {
        (self.resolution.height as f64 / dome_radius).to_degrees()
    }

    /// `(bottom, top)` elevation of the footprint, clamped to the sphere.
    pub fn elevation_range(&self, dome_radius: f64) -> (f64, f64) {
        let half = self.vertical_span_deg(dome_radius) / 2.0;
        let center = self.position.elevation;
        ((center - half).max(-90.0), (center + half).min(90.0))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FisheyeSettings {
    pub enabled: bool,
    pub strength: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl Default for FisheyeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 0.0,
            center_x: 0.5,
            center_y: 0.5,
        }
    }
}

/// Complete projection configuration for the dome.
///
/// Treated as immutable once applied; the orchestrator swaps whole values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectionSettings {
    /// Dome radius in dome-surface pixels.
    pub dome_radius: f64,
    pub channels: Vec<Channel>,
    pub blend_overlap: f64,
    #[serde(default)]
    pub fisheye: FisheyeSettings,
}

impl ProjectionSettings {
    pub fn new(dome_radius: f64, blend_overlap: f64, channels: Vec<Channel>) -> Self {
        Self {
            dome_radius,
            channels,
            blend_overlap,
            fisheye: FisheyeSettings::default(),
        }
    }

    /// `count` equal channels evenly spaced around the horizon, each exactly
    /// covering `360 / count` degrees of azimuth.
    pub fn ring(count: usize, resolution: Resolution, blend_overlap: f64) -> Self {
        let count = count.max(1);
        let span_deg = 360.0 / count as f64;
        let dome_radius = resolution.width as f64 / span_deg.to_radians();
        let channels = (0..count)
            .map(|i| {
                let center = span_deg * (i as f64 + 0.5);
                Channel::new(
                    format!("ch{i}"),
                    format!("Projector {}", i + 1),
                    DomeCoordinate::on_surface(center, 0.0),
                    resolution,
                )
            })
            .collect();
        Self::new(dome_radius, blend_overlap, channels)
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn projector_count(&self) -> usize {
        self.channels.len()
    }
}
