//! Model-free spoilage scoring from ROI pixel statistics.
//!
//! The basic variant counts dark pixels and checks sharpness; the rich
//! variant adds bruise, oxidation and mold color ratios. Both are O(pixels)
//! with no external calls, so they run on every frame.

use image::{ImageBuffer, Luma};
use imageproc::filter::filter3x3;

use crate::hsv::rgb_to_hsv;
use crate::roi::Roi;
use crate::verdict::{ClassifierVerdict, Label};

const K_LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeuristicVariant {
    Basic,
    Rich,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicHeuristicConfig {
    /// Grayscale values at or below this count as dark.
    pub dark_value_max: f32,
    pub dark_weight: f64,
    /// Laplacian variance under this adds the blur bonus to the score.
    pub blur_threshold: f64,
    pub blur_bonus: f64,
    /// Spoiled iff score >= this.
    pub spoiled_min_score: f64,
}

impl Default for BasicHeuristicConfig {
    fn default() -> Self {
        Self {
            dark_value_max: 60.0,
            dark_weight: 4.0,
            blur_threshold: 50.0,
            blur_bonus: 0.3,
            spoiled_min_score: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RichHeuristicConfig {
    pub dark_weight: f64,
    pub brown_weight: f64,
    pub green_mold_weight: f64,
    pub white_mold_weight: f64,
    /// Per-ratio normalization floors; a raw ratio at or above its floor
    /// saturates that component.
    pub dark_ratio_min: f64,
    pub brown_ratio_min: f64,
    pub green_mold_ratio_min: f64,
    pub white_mold_ratio_min: f64,
    /// Sharpness under this attenuates the composite score.
    pub blur_threshold: f64,
    pub blur_attenuation: f64,
    pub spoiled_min_score: f64,
}

impl Default for RichHeuristicConfig {
    fn default() -> Self {
        Self {
            dark_weight: 0.45,
            brown_weight: 0.25,
            green_mold_weight: 0.20,
            white_mold_weight: 0.10,
            dark_ratio_min: 0.08,
            brown_ratio_min: 0.10,
            green_mold_ratio_min: 0.05,
            white_mold_ratio_min: 0.10,
            blur_threshold: 20.0,
            blur_attenuation: 0.8,
            spoiled_min_score: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    pub variant: HeuristicVariant,
    pub basic: BasicHeuristicConfig,
    pub rich: RichHeuristicConfig,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            variant: HeuristicVariant::Basic,
            basic: BasicHeuristicConfig::default(),
            rich: RichHeuristicConfig::default(),
        }
    }
}

pub struct HeuristicClassifier {
    config: HeuristicConfig,
}

impl HeuristicClassifier {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    pub fn classify(&self, roi: &Roi) -> ClassifierVerdict {
        match self.config.variant {
            HeuristicVariant::Basic => self.classify_basic(roi),
            HeuristicVariant::Rich => self.classify_rich(roi),
        }
    }

    /// Dark-pixel ratio plus a blur bonus.
    pub fn classify_basic(&self, roi: &Roi) -> ClassifierVerdict {
        if roi.pixel_count() == 0 {
            return ClassifierVerdict::new(Label::Unknown, 0.0);
        }
        let cfg = &self.config.basic;

        let gray = gray_f32(roi);
        let total = gray.len() as f64;
        let dark = gray
            .pixels()
            .filter(|p| p.0[0] <= cfg.dark_value_max)
            .count() as f64;
        let dark_ratio = dark / total;

        let sharpness = laplacian_variance(&gray);
        let blur_bonus = if sharpness < cfg.blur_threshold {
            cfg.blur_bonus
        } else {
            0.0
        };

        let score = (dark_ratio * cfg.dark_weight + blur_bonus).min(1.0);
        verdict_from_score(score, cfg.spoiled_min_score)
    }

    /// Weighted bruise/oxidation/mold color ratios, attenuated when blurry.
    pub fn classify_rich(&self, roi: &Roi) -> ClassifierVerdict {
        if roi.pixel_count() == 0 {
            return ClassifierVerdict::new(Label::Unknown, 0.0);
        }
        let cfg = &self.config.rich;

        let total = roi.pixel_count() as f64;
        let mut dark = 0u64;
        let mut brown = 0u64;
        let mut green_mold = 0u64;
        let mut white_mold = 0u64;

        for pixel in roi.image.pixels() {
            let hsv = rgb_to_hsv(*pixel);
            if hsv.v <= 60 && hsv.s <= 120 {
                dark += 1;
            }
            if (10..=25).contains(&hsv.h) && hsv.s >= 100 && hsv.v <= 120 {
                brown += 1;
            }
            if (80..=140).contains(&hsv.h) {
                green_mold += 1;
            }
            if hsv.s <= 40 && hsv.v >= 200 {
                white_mold += 1;
            }
        }

        let normalize = |count: u64, floor: f64| ((count as f64 / total) / floor).min(1.0);
        let mut score = cfg.dark_weight * normalize(dark, cfg.dark_ratio_min)
            + cfg.brown_weight * normalize(brown, cfg.brown_ratio_min)
            + cfg.green_mold_weight * normalize(green_mold, cfg.green_mold_ratio_min)
            + cfg.white_mold_weight * normalize(white_mold, cfg.white_mold_ratio_min);

        let sharpness = laplacian_variance(&gray_f32(roi));
        if sharpness < cfg.blur_threshold {
            score *= cfg.blur_attenuation;
        }
        let score = score.clamp(0.0, 1.0);
        verdict_from_score(score, cfg.spoiled_min_score)
    }
}

fn verdict_from_score(score: f64, spoiled_min: f64) -> ClassifierVerdict {
    if score >= spoiled_min {
        ClassifierVerdict::new(Label::Spoiled, score as f32)
    } else {
        ClassifierVerdict::new(Label::Fresh, (1.0 - score) as f32)
    }
}

fn gray_f32(roi: &Roi) -> GrayF32 {
    let (width, height) = roi.image.dimensions();
    let mut buf = Vec::with_capacity((width * height) as usize);
    for pixel in roi.image.pixels() {
        buf.push(
            0.299 * pixel.0[0] as f32 + 0.587 * pixel.0[1] as f32 + 0.114 * pixel.0[2] as f32,
        );
    }
    GrayF32::from_raw(width, height, buf).expect("buffer sized from dimensions")
}

/// Laplacian variance over the whole raster; low values mean a blurry crop.
pub fn laplacian_variance(gray: &GrayF32) -> f64 {
    let lap: GrayF32 = filter3x3(gray, &K_LAPLACIAN);
    let lap = lap.into_raw();
    let n = lap.len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = lap.iter().map(|&v| v as f64).sum::<f64>() / n;
    lap.iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}
