//! Saving capture artifacts: the original frame, the ROI crop, the
//! segmentation mask and an annotated overlay. The output tree mirrors what
//! downstream consumers expect: `results/` for rasters, `masks/` for masks.

use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::frame::{mask_is_empty, Frame, Mask};
use crate::pipeline::CycleOutput;
use crate::roi::BoundingBox;
use crate::verdict::Label;

#[derive(Debug, Clone, Serialize)]
pub struct CapturePaths {
    pub original: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<PathBuf>,
    pub mask: PathBuf,
    pub annotated: PathBuf,
}

pub struct CaptureWriter {
    results_dir: PathBuf,
    masks_dir: PathBuf,
}

impl CaptureWriter {
    pub fn new(root: &Path) -> Result<Self> {
        let results_dir = root.join("results");
        let masks_dir = root.join("masks");
        fs::create_dir_all(&results_dir)?;
        fs::create_dir_all(&masks_dir)?;
        Ok(Self {
            results_dir,
            masks_dir,
        })
    }

    /// Persist everything one cycle produced, keyed by `stem`.
    pub fn save(&self, frame: &Frame, output: &CycleOutput, stem: &str) -> Result<CapturePaths> {
        let original = self.results_dir.join(format!("{stem}.png"));
        frame.as_rgb().save(&original)?;

        let roi = match &output.roi {
            Some(roi) => {
                let path = self.results_dir.join(format!("{stem}_roi.png"));
                roi.image.save(&path)?;
                Some(path)
            }
            None => None,
        };

        let mask = self.masks_dir.join(format!("{stem}_mask.png"));
        output.mask.save(&mask)?;

        let annotated = self.results_dir.join(format!("{stem}_annotated.png"));
        annotate(frame, &output.mask, output.result.bbox, output.result.label).save(&annotated)?;

        Ok(CapturePaths {
            original,
            roi,
            mask,
            annotated,
        })
    }
}

/// Overlay the mask as a translucent tint and draw the bounding box colored
/// by verdict: green fresh, red spoiled, yellow otherwise.
pub fn annotate(frame: &Frame, mask: &Mask, bbox: Option<BoundingBox>, label: Label) -> RgbImage {
    let mut canvas = frame.as_rgb().clone();

    if !mask_is_empty(mask) {
        for (x, y, p) in mask.enumerate_pixels() {
            if p.0[0] == 0 {
                continue;
            }
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in pixel.0.iter_mut() {
                // 25% toward white, like a translucent mask overlay.
                *channel = (*channel as u16 + (255 - *channel as u16) / 4) as u8;
            }
        }
    }

    if let Some(bbox) = bbox {
        let color = match label {
            Label::Fresh => Rgb([0, 255, 0]),
            Label::Spoiled => Rgb([255, 0, 0]),
            _ => Rgb([255, 255, 0]),
        };
        // Three concentric rectangles give a visible box thickness.
        for offset in 0..3i32 {
            let rect = Rect::at(bbox.x as i32 - offset, bbox.y as i32 - offset).of_size(
                bbox.width + (offset * 2) as u32,
                bbox.height + (offset * 2) as u32,
            );
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }

    canvas
}
