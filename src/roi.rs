//! Region-of-interest extraction from a segmentation mask.
//!
//! Finds the largest external contour, double-checks its area against the
//! minimum, then crops a padded upright bounding box out of the frame.
//! Circularity is computed as a diagnostic only; a low value is recorded but
//! never invalidates the ROI, so partially-framed or elongated fruit still
//! get classified.

use image::RgbImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;
use serde::Serialize;

use crate::frame::{Frame, Mask};

#[derive(Debug, Clone, PartialEq)]
pub struct RoiConfig {
    /// Minimum contour area for a usable region, in px².
    pub min_roi_area: f64,
    /// Padding added around the bounding rectangle before clipping.
    pub pad: u32,
    /// Circularity below this is flagged as a diagnostic.
    pub circularity_min: f64,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            min_roi_area: 1500.0,
            pad: 10,
            circularity_min: 0.02,
        }
    }
}

/// Axis-aligned box in frame coordinates. Present only when width and height
/// are both positive; "no valid region" is expressed as `Option::None`
/// upstream, never as a degenerate box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Orientation-independent aspect ratio, always >= 1.
    pub fn aspect_ratio(&self) -> f32 {
        let w = self.width as f32;
        let h = self.height as f32;
        w.max(h) / w.min(h)
    }
}

/// Cropped sub-raster of the frame believed to contain the object.
#[derive(Debug, Clone)]
pub struct Roi {
    pub image: RgbImage,
}

impl Roi {
    pub fn pixel_count(&self) -> u64 {
        self.image.width() as u64 * self.image.height() as u64
    }
}

#[derive(Debug, Clone)]
pub struct RoiExtraction {
    pub roi: Roi,
    pub bbox: BoundingBox,
    pub circularity: f64,
    pub diagnostics: Vec<String>,
}

pub struct RoiExtractor {
    config: RoiConfig,
}

impl RoiExtractor {
    pub fn new(config: RoiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoiConfig {
        &self.config
    }

    /// Extract the padded ROI and bounding box for the mask's largest
    /// external contour, or `None` when no usable region exists.
    pub fn extract(&self, frame: &Frame, mask: &Mask) -> Option<RoiExtraction> {
        let contours: Vec<Contour<u32>> = find_contours(mask);
        let largest = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .max_by(|a, b| {
                contour_area(&a.points)
                    .partial_cmp(&contour_area(&b.points))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;

        let area = contour_area(&largest.points);
        // Defensive double-check: the segmenter enforces a minimum component
        // area, but the contour's enclosed area can still fall short of it.
        if area < self.config.min_roi_area {
            return None;
        }

        let (min_x, min_y, max_x, max_y) = point_extents(&largest.points)?;

        let pad = self.config.pad;
        let x0 = min_x.saturating_sub(pad);
        let y0 = min_y.saturating_sub(pad);
        let x1 = (max_x + 1 + pad).min(frame.width());
        let y1 = (max_y + 1 + pad).min(frame.height());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        let bbox = BoundingBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        };

        let roi = Roi {
            image: image::imageops::crop_imm(frame.as_rgb(), x0, y0, bbox.width, bbox.height)
                .to_image(),
        };

        let perimeter = contour_perimeter(&largest.points);
        let circularity = circularity(area, perimeter);
        let mut diagnostics = Vec::new();
        if circularity < self.config.circularity_min {
            diagnostics.push(format!(
                "low circularity: {:.3} (min {:.3})",
                circularity, self.config.circularity_min
            ));
        }

        Some(RoiExtraction {
            roi,
            bbox,
            circularity,
            diagnostics,
        })
    }
}

fn point_extents(points: &[Point<u32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let mut min_x = first.x;
    let mut min_y = first.y;
    let mut max_x = first.x;
    let mut max_y = first.y;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((min_x, min_y, max_x, max_y))
}

/// Shoelace area of a closed pixel-border polygon.
pub fn contour_area(points: &[Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    (twice_area.abs() as f64) / 2.0
}

/// Closed-polygon perimeter: summed Euclidean edge lengths.
pub fn contour_perimeter(points: &[Point<u32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut perimeter = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let dx = a.x as f64 - b.x as f64;
        let dy = a.y as f64 - b.y as f64;
        perimeter += (dx * dx + dy * dy).sqrt();
    }
    perimeter
}

/// 4π·area/perimeter²: 1.0 for a perfect circle, lower for rough or
/// elongated shapes.
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
}
