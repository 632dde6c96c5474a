//! RGB to HSV conversion and per-mask channel statistics.
//!
//! Hue is on the half-degree scale (0..180) and saturation/value on 0..255,
//! matching the scale all segmentation and species thresholds in this crate
//! are calibrated against.

use image::Rgb;

use crate::frame::{Frame, Mask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    /// Hue in [0, 180).
    pub h: u8,
    /// Saturation in [0, 255].
    pub s: u8,
    /// Value in [0, 255].
    pub v: u8,
}

pub fn rgb_to_hsv(pixel: Rgb<u8>) -> Hsv {
    let r = pixel.0[0] as f32;
    let g = pixel.0[1] as f32;
    let b = pixel.0[2] as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h_deg < 0.0 {
        h_deg += 360.0;
    }

    Hsv {
        h: (h_deg / 2.0).round().min(179.0) as u8,
        s: s.round().min(255.0) as u8,
        v: v.round() as u8,
    }
}

/// Aggregate HSV statistics over the foreground pixels of a mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskStats {
    pub area: u64,
    pub mean_hue: f32,
    pub mean_saturation: f32,
    pub mean_value: f32,
    /// Argmax of the 180-bin hue histogram over the mask.
    pub dominant_hue: u8,
}

/// Compute foreground HSV statistics. Returns `None` for an empty mask.
pub fn mask_stats(frame: &Frame, mask: &Mask) -> Option<MaskStats> {
    let mut area = 0u64;
    let mut hue_sum = 0f64;
    let mut sat_sum = 0f64;
    let mut val_sum = 0f64;
    let mut histogram = [0u64; 180];

    for (x, y, p) in mask.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        let hsv = rgb_to_hsv(*frame.as_rgb().get_pixel(x, y));
        area += 1;
        hue_sum += hsv.h as f64;
        sat_sum += hsv.s as f64;
        val_sum += hsv.v as f64;
        histogram[hsv.h as usize] += 1;
    }

    if area == 0 {
        return None;
    }

    let dominant_hue = histogram
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .map(|(bin, _)| bin as u8)
        .unwrap_or(0);

    Some(MaskStats {
        area,
        mean_hue: (hue_sum / area as f64) as f32,
        mean_saturation: (sat_sum / area as f64) as f32,
        mean_value: (val_sum / area as f64) as f32,
        dominant_hue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn primary_colors_convert() {
        let red = rgb_to_hsv(Rgb([255, 0, 0]));
        assert_eq!((red.h, red.s, red.v), (0, 255, 255));

        let green = rgb_to_hsv(Rgb([0, 255, 0]));
        assert_eq!((green.h, green.s, green.v), (60, 255, 255));

        let blue = rgb_to_hsv(Rgb([0, 0, 255]));
        assert_eq!((blue.h, blue.s, blue.v), (120, 255, 255));
    }

    #[test]
    fn gray_has_no_saturation() {
        let gray = rgb_to_hsv(Rgb([128, 128, 128]));
        assert_eq!(gray.s, 0);
        assert_eq!(gray.v, 128);
    }

    #[test]
    fn stats_cover_only_the_mask() {
        let mut img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        for y in 0..4 {
            for x in 0..4 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let frame = Frame::new(img).unwrap();

        let mut mask = Mask::new(8, 8);
        for y in 0..4 {
            for x in 0..4 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }

        let stats = mask_stats(&frame, &mask).unwrap();
        assert_eq!(stats.area, 16);
        assert_eq!(stats.dominant_hue, 0);
        assert!((stats.mean_saturation - 255.0).abs() < 1e-3);
        assert!((stats.mean_value - 255.0).abs() < 1e-3);
    }

    #[test]
    fn empty_mask_has_no_stats() {
        let frame = Frame::new(RgbImage::new(4, 4)).unwrap();
        let mask = Mask::new(4, 4);
        assert!(mask_stats(&frame, &mask).is_none());
    }
}
