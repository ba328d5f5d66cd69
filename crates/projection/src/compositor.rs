//! Per-channel source regions of an equirectangular frame.
//!
//! The compositor turns the ring layout into pixel rectangles the display
//! side crops from each produced frame, plus the blend weights it multiplies
//! them with. It never touches pixels itself.

use foundation::error::{DomeError, DomeResult};
use foundation::math::DomeCoordinate;
use serde::{Deserialize, Serialize};

use crate::fisheye;
use crate::frame::{EquirectangularMetadata, PixelRect};
use crate::layout::{Footprint, RingLayout, cross_fade};
use crate::settings::ProjectionSettings;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Allowed deviation of the summed blend weight from 1.0.
    pub weight_epsilon: f64,
    /// Number of frame columns sampled by the weight check.
    pub weight_samples: u32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            weight_epsilon: 1e-6,
            weight_samples: 1440,
        }
    }
}

/// Output of one channel for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRegion {
    pub channel_id: String,
    /// Crop rectangle in frame pixels; may wrap on 360° frames.
    pub source: PixelRect,
    /// First azimuth of the widened span, in `[0, 360)`.
    pub azimuth_start: f64,
    pub azimuth_width: f64,
    pub left_band: f64,
    pub right_band: f64,
    /// `(bottom, top)` elevation in degrees.
    pub elevation_range: (f64, f64),
}

impl ChannelRegion {
    /// Blend weight of this channel at `azimuth`, in `[0, 1]`.
    pub fn weight_at(&self, azimuth: f64) -> f64 {
        cross_fade(
            self.azimuth_start,
            self.azimuth_width,
            self.left_band,
            self.right_band,
            azimuth,
        )
    }

    /// Blend weight at the center of frame column `x`.
    pub fn weight_at_column(&self, x: u32, meta: &EquirectangularMetadata) -> f64 {
        self.weight_at(meta.azimuth_of_column(x as f64))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compositor {
    config: CompositorConfig,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Regions for every channel, in settings order.
    ///
    /// Every failure is a `Rendering` error: the caller keeps the previously
    /// committed output.
    pub fn compose(
        &self,
        settings: &ProjectionSettings,
        meta: &EquirectangularMetadata,
    ) -> DomeResult<Vec<ChannelRegion>> {
        meta.validate()
            .map_err(|e| DomeError::Rendering(format!("unusable frame: {e}")))?;
        let layout = RingLayout::compute(settings)
            .map_err(|e| DomeError::Rendering(format!("channel layout: {e}")))?;

        let regions = layout
            .footprints()
            .iter()
            .map(|fp| self.region_for(settings, meta, fp))
            .collect::<DomeResult<Vec<_>>>()?;

        self.check_weights(meta, &regions)?;
        tracing::debug!(
            channels = regions.len(),
            width = meta.width,
            height = meta.height,
            fov = meta.field_of_view,
            "composed channel regions"
        );
        Ok(regions)
    }

    fn region_for(
        &self,
        settings: &ProjectionSettings,
        meta: &EquirectangularMetadata,
        fp: &Footprint,
    ) -> DomeResult<ChannelRegion> {
        let channel = &settings.channels[fp.index];
        let (bottom, top) = channel.elevation_range(settings.dome_radius);

        let corner = |elevation: f64| {
            DomeCoordinate::try_new(fp.expanded_start, elevation, 1.0).map_err(|e| {
                DomeError::Rendering(format!("channel '{}' corner: {e}", channel.id))
            })
        };
        let left_top = corner(top)?;
        let left_bottom = corner(bottom)?;
        let (u_left, v_top) = meta.project(&left_top);
        let (_, v_bottom) = meta.project(&left_bottom);
        // The right edge stays unwrapped so the span is contiguous in u.
        let u_right = u_left + fp.expanded_width / meta.field_of_view;

        let corners = [
            (u_left, v_top),
            (u_right, v_top),
            (u_left, v_bottom),
            (u_right, v_bottom),
        ]
        .map(|(u, v)| fisheye::remap(&settings.fisheye, u, v));

        let u_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let u_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let v_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let v_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        let outside = || {
            DomeError::Rendering(format!(
                "channel '{}' lies outside the {}° frame",
                channel.id, meta.field_of_view
            ))
        };

        let frame_w = meta.width as f64;
        let frame_h = meta.height as f64;
        let y0 = (v_min * frame_h).floor().max(0.0);
        let y1 = (v_max * frame_h).ceil().min(frame_h);
        if y1 <= y0 {
            return Err(outside());
        }

        let (x, width) = if meta.is_full_circle() {
            if fp.expanded_width >= 360.0 {
                (0, meta.width)
            } else {
                let x0 = (u_min * frame_w).floor();
                let x1 = (u_max * frame_w).ceil();
                let width = (x1 - x0).min(frame_w) as u32;
                ((x0 as i64).rem_euclid(meta.width as i64) as u32, width)
            }
        } else {
            // Azimuths just below 360 may also show up left of column 0.
            let wrap = 360.0 / meta.field_of_view;
            let (lo, hi) = [(u_min, u_max), (u_min - wrap, u_max - wrap)]
                .into_iter()
                .map(|(a, b)| (a.max(0.0), b.min(1.0)))
                .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
                .ok_or_else(outside)?;
            if hi <= lo {
                return Err(outside());
            }
            let x0 = (lo * frame_w).floor();
            let x1 = (hi * frame_w).ceil().min(frame_w);
            (x0 as u32, (x1 - x0) as u32)
        };

        Ok(ChannelRegion {
            channel_id: channel.id.clone(),
            source: PixelRect {
                x,
                y: y0 as u32,
                width,
                height: (y1 - y0) as u32,
            },
            azimuth_start: fp.expanded_start,
            azimuth_width: fp.expanded_width,
            left_band: fp.left_band,
            right_band: fp.right_band,
            elevation_range: (bottom, top),
        })
    }

    fn check_weights(
        &self,
        meta: &EquirectangularMetadata,
        regions: &[ChannelRegion],
    ) -> DomeResult<()> {
        let samples = self.config.weight_samples.max(1);
        for k in 0..samples {
            let az = (k as f64 + 0.5) / samples as f64 * meta.field_of_view;
            let total: f64 = regions.iter().map(|r| r.weight_at(az)).sum();
            if (total - 1.0).abs() > self.config.weight_epsilon {
                return Err(DomeError::Rendering(format!(
                    "blend weights sum to {total:.6} at azimuth {az:.3}"
                )));
            }
        }
        Ok(())
    }
}
