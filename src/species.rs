//! Fruit/non-fruit gate and rule-based type identification.
//!
//! Both operate on mask-level statistics, independent of spoilage. The gate
//! is two-tier: round fruit must satisfy the normal circularity/aspect
//! envelope, while elongated warm-hued objects ("banana-like") get a relaxed
//! circularity floor, since the two silhouette families have structurally
//! different valid shapes.

use imageproc::contours::{find_contours, BorderType, Contour};

use crate::frame::{Frame, Mask};
use crate::hsv::{mask_stats, MaskStats};
use crate::roi::{circularity, contour_area, contour_perimeter, BoundingBox};
use crate::verdict::{Species, TypeVerdict};

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    pub min_area: u64,
    pub max_area: u64,
    /// Normal-shape thresholds.
    pub circularity_min: f64,
    pub aspect_ratio_max: f32,
    pub saturation_min: f32,
    /// Banana-like relaxation: elongated warm-hued saturated objects only
    /// need to clear the relaxed circularity floor.
    pub banana_aspect_min: f32,
    pub banana_hue_range: (f32, f32),
    pub banana_saturation_min: f32,
    pub banana_circularity_min: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_area: 500,
            max_area: 1_000_000,
            circularity_min: 0.30,
            aspect_ratio_max: 3.0,
            saturation_min: 15.0,
            banana_aspect_min: 1.5,
            banana_hue_range: (15.0, 40.0),
            banana_saturation_min: 40.0,
            banana_circularity_min: 0.03,
        }
    }
}

/// Gate outcome with a human-readable reason when rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub accepted: bool,
    pub reason: String,
}

impl GateDecision {
    fn accept(reason: impl Into<String>) -> Self {
        Self {
            accepted: true,
            reason: reason.into(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

pub struct FruitGate {
    config: GateConfig,
}

impl FruitGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn evaluate(&self, frame: &Frame, mask: &Mask) -> GateDecision {
        let cfg = &self.config;

        let Some(stats) = mask_stats(frame, mask) else {
            return GateDecision::reject("empty mask");
        };
        if stats.area < cfg.min_area {
            return GateDecision::reject(format!(
                "region too small: {} px² (min {})",
                stats.area, cfg.min_area
            ));
        }
        if stats.area > cfg.max_area {
            return GateDecision::reject(format!(
                "region too large: {} px² (max {})",
                stats.area, cfg.max_area
            ));
        }

        let Some(shape) = mask_shape(mask) else {
            return GateDecision::reject("no contour");
        };
        if shape.perimeter <= 0.0 {
            return GateDecision::reject("zero perimeter");
        }

        let aspect = shape.bbox.aspect_ratio();
        let circ = circularity(shape.area, shape.perimeter);

        let banana_like = aspect > cfg.banana_aspect_min
            && stats.mean_hue >= cfg.banana_hue_range.0
            && stats.mean_hue <= cfg.banana_hue_range.1
            && stats.mean_saturation > cfg.banana_saturation_min;

        if banana_like {
            if circ < cfg.banana_circularity_min {
                return GateDecision::reject(format!(
                    "banana-like shape with circularity {:.3} below {:.3}",
                    circ, cfg.banana_circularity_min
                ));
            }
            return GateDecision::accept("banana-like shape");
        }

        if stats.mean_saturation <= cfg.saturation_min {
            return GateDecision::reject(format!(
                "low saturation: {:.1} (min {:.1})",
                stats.mean_saturation, cfg.saturation_min
            ));
        }
        if aspect > cfg.aspect_ratio_max {
            return GateDecision::reject(format!(
                "aspect ratio {:.2} over {:.2}",
                aspect, cfg.aspect_ratio_max
            ));
        }
        if circ < cfg.circularity_min {
            return GateDecision::reject(format!(
                "circularity {:.3} below {:.3}",
                circ, cfg.circularity_min
            ));
        }
        GateDecision::accept("round fruit shape")
    }
}

struct MaskShape {
    area: f64,
    perimeter: f64,
    bbox: BoundingBox,
}

fn mask_shape(mask: &Mask) -> Option<MaskShape> {
    let contours: Vec<Contour<u32>> = find_contours(mask);
    let largest = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by(|a, b| {
            contour_area(&a.points)
                .partial_cmp(&contour_area(&b.points))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for p in &largest.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if min_x > max_x || min_y > max_y {
        return None;
    }

    Some(MaskShape {
        area: contour_area(&largest.points),
        perimeter: contour_perimeter(&largest.points),
        bbox: BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        },
    })
}

/// One row of the identification table. Every populated field must match for
/// the rule to fire.
struct TypeRule {
    species: Species,
    confidence: f32,
    /// Inclusive dominant-hue bins; multiple ranges cover the red wrap.
    hue_ranges: &'static [(u8, u8)],
    min_aspect: Option<f32>,
    max_aspect: Option<f32>,
    min_saturation: Option<f32>,
    min_value: Option<f32>,
}

impl TypeRule {
    fn matches(&self, stats: &MaskStats, aspect: f32) -> bool {
        let hue_ok = self
            .hue_ranges
            .iter()
            .any(|(lo, hi)| (*lo..=*hi).contains(&stats.dominant_hue));
        hue_ok
            && self.min_aspect.map_or(true, |min| aspect > min)
            && self.max_aspect.map_or(true, |max| aspect <= max)
            && self
                .min_saturation
                .map_or(true, |min| stats.mean_saturation > min)
            && self.min_value.map_or(true, |min| stats.mean_value > min)
    }
}

// Declared order is load-bearing: ranges overlap by design and the first
// matching rule wins, so ambiguous regions resolve to the earlier entry.
const RULES: &[TypeRule] = &[
    TypeRule {
        species: Species::Apple,
        confidence: 0.85,
        hue_ranges: &[(0, 8), (165, 179)],
        min_aspect: None,
        max_aspect: Some(1.4),
        min_saturation: Some(60.0),
        min_value: None,
    },
    TypeRule {
        species: Species::GreenApple,
        confidence: 0.75,
        hue_ranges: &[(35, 85)],
        min_aspect: None,
        max_aspect: Some(1.4),
        min_saturation: Some(40.0),
        min_value: None,
    },
    TypeRule {
        species: Species::Banana,
        confidence: 0.85,
        hue_ranges: &[(15, 40)],
        min_aspect: Some(1.5),
        max_aspect: None,
        min_saturation: Some(40.0),
        min_value: None,
    },
    TypeRule {
        species: Species::Orange,
        confidence: 0.80,
        hue_ranges: &[(5, 22)],
        min_aspect: None,
        max_aspect: Some(1.4),
        min_saturation: Some(70.0),
        min_value: Some(90.0),
    },
    TypeRule {
        species: Species::Lemon,
        confidence: 0.70,
        hue_ranges: &[(22, 35)],
        min_aspect: None,
        max_aspect: Some(1.7),
        min_saturation: Some(60.0),
        min_value: None,
    },
    TypeRule {
        species: Species::Lime,
        confidence: 0.60,
        hue_ranges: &[(40, 80)],
        min_aspect: None,
        max_aspect: Some(1.5),
        min_saturation: Some(30.0),
        min_value: None,
    },
];

/// Deterministic hue/shape rule table. Not a learned model.
pub struct TypeIdentifier;

impl TypeIdentifier {
    pub fn new() -> Self {
        Self
    }

    pub fn identify(&self, frame: &Frame, mask: &Mask) -> TypeVerdict {
        let Some(stats) = mask_stats(frame, mask) else {
            return TypeVerdict::unknown();
        };
        let Some(shape) = mask_shape(mask) else {
            return TypeVerdict::unknown();
        };
        let aspect = shape.bbox.aspect_ratio();

        for rule in RULES {
            if rule.matches(&stats, aspect) {
                return TypeVerdict {
                    species: rule.species,
                    confidence: rule.confidence,
                };
            }
        }
        TypeVerdict::unknown()
    }
}

impl Default for TypeIdentifier {
    fn default() -> Self {
        Self::new()
    }
}
