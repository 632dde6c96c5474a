//! Color segmentation of the most plausible foreground object.
//!
//! Thresholds saturated, mid-brightness pixels in HSV space, cleans the
//! result with morphological opening and closing, then keeps the largest
//! 8-connected component that passes the area (and, in the strict profile,
//! shape) constraints. No qualifying component yields an all-zero mask;
//! segmentation never fails.

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;

use crate::frame::{Frame, Mask};
use crate::hsv::rgb_to_hsv;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    /// Pixels must exceed this saturation to count as foreground.
    pub saturation_min: u8,
    /// Value band: darker pixels are shadow, brighter ones glare.
    pub value_min: u8,
    pub value_max: u8,
    /// Strict profile: also drop low-saturation mid-value "gray" pixels.
    pub reject_gray: bool,
    pub gray_saturation_max: u8,
    /// Smallest component area worth keeping.
    pub min_region_area: u64,
    /// Strict profile: reject whole-frame false positives.
    pub max_region_area: Option<u64>,
    pub max_aspect_ratio: Option<f32>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            saturation_min: 35,
            value_min: 20,
            value_max: 245,
            reject_gray: false,
            gray_saturation_max: 40,
            min_region_area: 1500,
            max_region_area: None,
            max_aspect_ratio: None,
        }
    }
}

impl SegmenterConfig {
    /// Stricter variant: lower saturation floor but gray exclusion plus
    /// shape and area caps on the selected component.
    pub fn strict() -> Self {
        Self {
            saturation_min: 30,
            reject_gray: true,
            max_region_area: Some(800_000),
            max_aspect_ratio: Some(6.0),
            ..Self::default()
        }
    }
}

pub struct RegionSegmenter {
    config: SegmenterConfig,
}

/// Per-component accumulator: pixel count and bounding extents.
#[derive(Debug, Clone, Copy)]
struct ComponentStats {
    area: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl ComponentStats {
    fn aspect_ratio(&self) -> f32 {
        let w = (self.max_x - self.min_x + 1) as f32;
        let h = (self.max_y - self.min_y + 1) as f32;
        w.max(h) / w.min(h)
    }
}

impl RegionSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment the frame into a binary foreground mask.
    pub fn segment(&self, frame: &Frame) -> Mask {
        let cfg = &self.config;
        let (width, height) = (frame.width(), frame.height());

        let mut base = Mask::new(width, height);
        for (x, y, pixel) in frame.as_rgb().enumerate_pixels() {
            let hsv = rgb_to_hsv(*pixel);
            let mut keep = hsv.s > cfg.saturation_min
                && hsv.v > cfg.value_min
                && hsv.v < cfg.value_max;
            if keep && cfg.reject_gray {
                // Mid-value pixels with little color are background clutter
                // (walls, counters) that sneak past the lower saturation floor.
                let grayish = hsv.s < cfg.gray_saturation_max && (60..=200).contains(&hsv.v);
                keep = !grayish;
            }
            if keep {
                base.put_pixel(x, y, Luma([255]));
            }
        }

        // 5x5 structuring element: open removes speckle, close fills pinholes.
        let cleaned = close(&open(&base, Norm::LInf, 2), Norm::LInf, 2);

        let labels = connected_components(&cleaned, Connectivity::Eight, Luma([0u8]));

        let mut stats: HashMap<u32, ComponentStats> = HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label.0[0];
            if id == 0 {
                continue;
            }
            stats
                .entry(id)
                .and_modify(|s| {
                    s.area += 1;
                    s.min_x = s.min_x.min(x);
                    s.min_y = s.min_y.min(y);
                    s.max_x = s.max_x.max(x);
                    s.max_y = s.max_y.max(y);
                })
                .or_insert(ComponentStats {
                    area: 1,
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                });
        }

        // Largest component first; first one satisfying every constraint wins.
        let mut candidates: Vec<(u32, ComponentStats)> = stats.into_iter().collect();
        candidates.sort_by(|a, b| b.1.area.cmp(&a.1.area).then(a.0.cmp(&b.0)));

        let selected = candidates.into_iter().find(|(_, s)| {
            if s.area < cfg.min_region_area {
                return false;
            }
            if let Some(max_area) = cfg.max_region_area {
                if s.area > max_area {
                    return false;
                }
            }
            if let Some(max_aspect) = cfg.max_aspect_ratio {
                if s.aspect_ratio() > max_aspect {
                    return false;
                }
            }
            true
        });

        let Some((chosen, _)) = selected else {
            return Mask::new(width, height);
        };

        let mut mask = Mask::new(width, height);
        for (x, y, label) in labels.enumerate_pixels() {
            if label.0[0] == chosen {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        // One more closing pass to smooth the selected component's outline.
        close(&mask, Norm::LInf, 2)
    }
}
