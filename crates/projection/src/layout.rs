//! Azimuthal ring layout of the dome's channels.
//!
//! Channels are ordered by the azimuth of their centers; each channel's
//! neighbours are its predecessor and successor in that cyclic order. Every
//! channel's nominal span is widened by `blend_overlap * span` on both edges,
//! and the intersection of two neighbours' widened spans is their blend band.
//!
//! Inside a band the left channel fades 1 -> 0 and the right channel 0 -> 1,
//! so the weights of all channels sum to exactly one everywhere on the ring as
//! long as:
//! - neighbouring nominal spans leave no gap wider than
//!   `blend_overlap * min(span_a, span_b)` (the widened spans still meet), and
//! - a channel's two bands never meet (no azimuth is covered three times).

use foundation::error::{DomeError, DomeResult};
use foundation::math::{DomeCoordinate, normalize_azimuth};

use crate::settings::{Channel, ProjectionSettings};

const TOLERANCE_DEG: f64 = 1e-9;

/// Azimuthal footprint of one channel after blend expansion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Footprint {
    /// Index into `ProjectionSettings::channels`.
    pub index: usize,
    pub center: f64,
    /// Nominal span in degrees.
    pub span: f64,
    /// Start of the widened span, in `[0, 360)`.
    pub expanded_start: f64,
    pub expanded_width: f64,
    /// Width of the band shared with the counter-clockwise neighbour.
    pub left_band: f64,
    /// Width of the band shared with the clockwise neighbour.
    pub right_band: f64,
}

impl Footprint {
    /// Linear cross-fade weight of this channel at `azimuth`, in `[0, 1]`.
    pub fn weight_at(&self, azimuth: f64) -> f64 {
        cross_fade(
            self.expanded_start,
            self.expanded_width,
            self.left_band,
            self.right_band,
            azimuth,
        )
    }
}

/// Weight of a span starting at `start` (degrees, clockwise) that ramps up
/// over `left_band` and down over `right_band`.
pub(crate) fn cross_fade(
    start: f64,
    width: f64,
    left_band: f64,
    right_band: f64,
    azimuth: f64,
) -> f64 {
    if width >= 360.0 {
        return 1.0;
    }
    let offset = (azimuth - start).rem_euclid(360.0);
    if offset >= width {
        return 0.0;
    }
    if left_band > 0.0 && offset < left_band {
        return offset / left_band;
    }
    let to_end = width - offset;
    if right_band > 0.0 && to_end <= right_band {
        return to_end / right_band;
    }
    1.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingLayout {
    /// Same order as the settings' channels.
    footprints: Vec<Footprint>,
    /// Channel indices sorted by center azimuth.
    ring_order: Vec<usize>,
}

impl RingLayout {
    /// Fails with `InvalidMetadata` when the channels leave a gap or crowd a
    /// single azimuth with more than two channels.
    pub fn compute(settings: &ProjectionSettings) -> DomeResult<Self> {
        let overlap = settings.blend_overlap;
        let channels = &settings.channels;
        if channels.is_empty() {
            return Err(DomeError::InvalidMetadata(
                "projection settings contain no channels".to_string(),
            ));
        }

        let mut footprints: Vec<Footprint> = channels
            .iter()
            .enumerate()
            .map(|(index, ch)| {
                let span = ch.horizontal_span_deg(settings.dome_radius);
                Footprint {
                    index,
                    center: ch.position.azimuth,
                    span,
                    expanded_start: normalize_azimuth(ch.position.azimuth - span / 2.0),
                    expanded_width: span,
                    left_band: 0.0,
                    right_band: 0.0,
                }
            })
            .collect();

        if footprints.len() == 1 {
            let fp = &mut footprints[0];
            if fp.span + TOLERANCE_DEG < 360.0 {
                return Err(DomeError::InvalidMetadata(format!(
                    "channel '{}' covers {:.3} deg of azimuth; a lone channel must cover 360",
                    channels[0].id, fp.span
                )));
            }
            fp.expanded_start = normalize_azimuth(fp.center - 180.0);
            fp.expanded_width = 360.0;
            return Ok(Self {
                footprints,
                ring_order: vec![0],
            });
        }

        let mut ring_order: Vec<usize> = (0..footprints.len()).collect();
        ring_order.sort_by(|&a, &b| {
            footprints[a]
                .center
                .total_cmp(&footprints[b].center)
                .then_with(|| a.cmp(&b))
        });

        let n = ring_order.len();
        for k in 0..n {
            let (i, j) = (ring_order[k], ring_order[(k + 1) % n]);
            let (a, b) = (footprints[i], footprints[j]);
            let distance = normalize_azimuth(b.center - a.center);
            let gap = distance - a.span / 2.0 - b.span / 2.0;
            let allowed = overlap * a.span.min(b.span);
            if gap > allowed + TOLERANCE_DEG {
                return Err(DomeError::InvalidMetadata(format!(
                    "coverage gap of {gap:.3} deg between channels '{}' and '{}' exceeds the {allowed:.3} deg blend allowance",
                    channels[i].id, channels[j].id
                )));
            }
            let band = (overlap * (a.span + b.span) - gap).max(0.0);
            footprints[i].right_band = band;
            footprints[j].left_band = band;
        }

        for fp in &mut footprints {
            let grow = overlap * fp.span;
            fp.expanded_start = normalize_azimuth(fp.center - fp.span / 2.0 - grow);
            fp.expanded_width = fp.span + 2.0 * grow;

            let id = &channels[fp.index].id;
            if fp.expanded_width >= 360.0 {
                return Err(DomeError::InvalidMetadata(format!(
                    "channel '{id}' wraps the whole dome but shares it with other channels"
                )));
            }
            if fp.left_band + fp.right_band > fp.expanded_width + TOLERANCE_DEG {
                return Err(DomeError::InvalidMetadata(format!(
                    "blend bands of channel '{id}' meet; more than two channels overlap there"
                )));
            }
        }

        Ok(Self {
            footprints,
            ring_order,
        })
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    pub fn footprint(&self, index: usize) -> Option<&Footprint> {
        self.footprints.get(index)
    }

    /// Channel indices in clockwise azimuth order.
    pub fn ring_order(&self) -> &[usize] {
        &self.ring_order
    }

    /// Summed weight of all channels at `azimuth`.
    pub fn total_weight_at(&self, azimuth: f64) -> f64 {
        self.footprints.iter().map(|fp| fp.weight_at(azimuth)).sum()
    }
}

/// First channel whose blend-active region contains `coord`.
///
/// The blend region is a normalized rectangle over the channel's nominal
/// footprint: `u` runs with azimuth across the span, `v` from the top edge
/// down.
pub fn blend_region_hit<'a>(
    settings: &'a ProjectionSettings,
    coord: &DomeCoordinate,
) -> Option<&'a Channel> {
    settings.channels.iter().find(|ch| {
        let span = ch.horizontal_span_deg(settings.dome_radius);
        let vspan = ch.vertical_span_deg(settings.dome_radius);
        if span <= 0.0 || vspan <= 0.0 {
            return false;
        }
        let start = ch.position.azimuth - span / 2.0;
        let u = (coord.azimuth - start).rem_euclid(360.0) / span;
        let top = ch.position.elevation + vspan / 2.0;
        let v = (top - coord.elevation) / vspan;
        u <= 1.0 && ch.blend_region.contains(u, v)
    })
}

#[cfg(test)]
mod tests {
    use super::{RingLayout, blend_region_hit};
    use crate::settings::{BlendRegion, ProjectionSettings, Resolution};
    use foundation::error::ErrorKind;
    use foundation::math::DomeCoordinate;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn quad() -> ProjectionSettings {
        ProjectionSettings::ring(4, Resolution::new(1920, 1080), 0.05)
    }

    #[test]
    fn quadrants_get_symmetric_bands() {
        let layout = RingLayout::compute(&quad()).unwrap();
        for fp in layout.footprints() {
            assert_close(fp.left_band, 9.0, 1e-9);
            assert_close(fp.right_band, 9.0, 1e-9);
            assert_close(fp.expanded_width, 99.0, 1e-9);
        }
        assert_close(layout.footprints()[0].expanded_start, 355.5, 1e-9);
        assert_eq!(layout.ring_order(), &[0, 1, 2, 3]);
    }

    #[test]
    fn weights_cross_fade_inside_band() {
        let layout = RingLayout::compute(&quad()).unwrap();
        let fps = layout.footprints();
        // Band between ch0 and ch1 is [85.5, 94.5).
        assert_close(fps[0].weight_at(85.5), 1.0, 1e-9);
        assert_close(fps[1].weight_at(85.5), 0.0, 1e-9);
        assert_close(fps[0].weight_at(90.0), 0.5, 1e-9);
        assert_close(fps[1].weight_at(90.0), 0.5, 1e-9);
        assert_close(fps[0].weight_at(45.0), 1.0, 1e-12);
        assert_eq!(fps[2].weight_at(45.0), 0.0);
        // Wrapping band around north.
        assert_close(fps[3].weight_at(358.0), 0.5 + 2.0 / 9.0, 1e-9);
        assert_close(fps[0].weight_at(358.0), 0.5 - 2.0 / 9.0, 1e-9);
    }

    #[test]
    fn total_weight_is_one_around_the_ring() {
        let layout = RingLayout::compute(&quad()).unwrap();
        for step in 0..3600 {
            let az = step as f64 * 0.1 + 0.03;
            assert_close(layout.total_weight_at(az), 1.0, 1e-9);
        }
    }

    #[test]
    fn unsorted_channels_are_ordered_by_azimuth() {
        let mut s = quad();
        s.channels.swap(0, 2);
        let layout = RingLayout::compute(&s).unwrap();
        assert_eq!(layout.ring_order(), &[2, 1, 0, 3]);
    }

    #[test]
    fn three_quadrants_leave_a_gap() {
        let mut s = quad();
        s.channels.pop();
        let err = RingLayout::compute(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMetadata);
        assert!(err.to_string().contains("gap"), "{err}");
    }

    #[test]
    fn stacked_channels_are_rejected() {
        let mut s = quad();
        let extra = s.channels[0].clone();
        s.channels.push(extra);
        s.channels[4].id = "dup-position".into();
        assert!(RingLayout::compute(&s).is_err());
    }

    #[test]
    fn lone_channel_must_wrap_the_dome() {
        let full = ProjectionSettings::ring(1, Resolution::new(4096, 2048), 0.1);
        let layout = RingLayout::compute(&full).unwrap();
        assert_eq!(layout.total_weight_at(123.0), 1.0);

        let mut half = full.clone();
        half.dome_radius *= 2.0;
        assert!(RingLayout::compute(&half).is_err());
    }

    #[test]
    fn hard_seams_without_overlap() {
        let s = ProjectionSettings::ring(3, Resolution::new(1200, 800), 0.0);
        let layout = RingLayout::compute(&s).unwrap();
        for fp in layout.footprints() {
            assert!(fp.left_band < 1e-9, "band {}", fp.left_band);
        }
        assert_close(layout.total_weight_at(119.99), 1.0, 1e-12);
        assert_close(layout.total_weight_at(120.01), 1.0, 1e-12);
    }

    #[test]
    fn blend_region_hit_uses_channel_footprint() {
        let mut s = quad();
        s.channels[1].blend_region = BlendRegion {
            left: 0.5,
            right: 1.0,
            top: 0.0,
            bottom: 1.0,
        };
        let ch = blend_region_hit(&s, &DomeCoordinate::on_surface(10.0, 0.0)).unwrap();
        assert_eq!(ch.id, "ch0");

        // Left half of ch1 is outside its blend region, so nothing matches there.
        assert!(blend_region_hit(&s, &DomeCoordinate::on_surface(100.0, 0.0)).is_none());
        let ch = blend_region_hit(&s, &DomeCoordinate::on_surface(170.0, 0.0)).unwrap();
        assert_eq!(ch.id, "ch1");

        // Above every channel's vertical extent.
        assert!(blend_region_hit(&s, &DomeCoordinate::on_surface(10.0, 80.0)).is_none());
    }
}
